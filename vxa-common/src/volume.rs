//! Volume conversions
//!
//! Public APIs express volume as a percentage in [0, 100]; the audio path
//! works with a normalized gain in [0, 1].

/// Convert a percentage to a normalized gain, clamping to [0, 100].
///
/// NaN is treated as silence.
pub fn percent_to_gain(percent: f32) -> f32 {
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0) / 100.0
}

/// Convert a normalized gain back to a percentage.
pub fn gain_to_percent(gain: f32) -> f32 {
    gain.clamp(0.0, 1.0) * 100.0
}
