//! Drift-corrected playback clock
//!
//! The sink reports the stream time it is currently playing at irregular
//! intervals (once per callback). Reading that value directly gives a position
//! that jumps in callback-sized steps. The clock instead runs a free stopwatch
//! from a set point and only steers it toward the reported time:
//!
//! - reports pass through a first-order low-pass filter (PT1)
//! - drift beyond `hard_reset_secs` snaps the clock to the filtered value
//! - drift beyond `nudge_band_secs` moves the set point by `nudge_step_secs`
//!   per report
//!
//! All operations take the current [`Instant`] so tests can drive time.

use crate::config::ClockConfig;
use std::time::Instant;
use vxa_common::Stopwatch;

/// First-order lag element: `value += ts * (k * input - value)`
/// with `ts = 1 / (t / dt + 1)` and `dt` the time since the last update.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    k: f32,
    time_constant: f32,
    value: f32,
    timer: Stopwatch,
}

impl LowPassFilter {
    pub fn new(k: f32, time_constant: f32) -> Self {
        Self {
            k,
            time_constant,
            value: 0.0,
            timer: Stopwatch::new(),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn update_at(&mut self, input: f32, now: Instant) -> f32 {
        let dt = self.timer.elapsed_secs_at(now);
        self.timer.reset_at(now);

        let ts = if dt > 0.0 {
            1.0 / (self.time_constant / dt + 1.0)
        } else {
            0.0
        };
        self.value += ts * (self.k * input - self.value);
        self.value
    }

    /// Reseed the output without changing the running state.
    pub fn set_at(&mut self, value: f32, now: Instant) {
        self.value = value;
        self.timer.reset_at(now);
    }

    pub fn pause_at(&mut self, now: Instant) {
        self.timer.stop_at(now);
    }

    pub fn resume_at(&mut self, now: Instant) {
        self.timer.start_at(now);
    }
}

/// Smoothed stream position driven by sink reports
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    tuning: ClockConfig,
    set_value: f32,
    stopwatch: Stopwatch,
    filter: LowPassFilter,
}

impl PlaybackClock {
    /// Create a paused clock at position 0.
    pub fn new(tuning: ClockConfig) -> Self {
        let filter = LowPassFilter::new(tuning.k, tuning.time_constant);
        Self {
            tuning,
            set_value: 0.0,
            stopwatch: Stopwatch::new(),
            filter,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stopwatch.is_running()
    }

    /// Current clock position in seconds
    pub fn position_at(&self, now: Instant) -> f32 {
        self.set_value + self.stopwatch.elapsed_secs_at(now)
    }

    /// Feed a reported stream time and return the corrected position.
    pub fn update_at(&mut self, reported: f32, now: Instant) -> f32 {
        let estimate = self.filter.update_at(reported, now);
        let current = self.position_at(now);
        let drift = estimate - current;

        if drift.abs() > self.tuning.hard_reset_secs {
            self.stopwatch.reset_at(now);
            self.set_value = estimate;
            return self.set_value;
        }

        if drift > self.tuning.nudge_band_secs {
            self.set_value += self.tuning.nudge_step_secs;
        } else if drift < -self.tuning.nudge_band_secs {
            self.set_value -= self.tuning.nudge_step_secs;
        }
        current
    }

    /// Jump to `seconds`, keeping the running/paused state.
    pub fn set_at(&mut self, seconds: f32, now: Instant) {
        self.filter.set_at(seconds, now);
        self.set_value = seconds;
        self.stopwatch.reset_at(now);
    }

    pub fn pause_at(&mut self, now: Instant) {
        self.stopwatch.stop_at(now);
        self.filter.pause_at(now);
    }

    pub fn resume_at(&mut self, now: Instant) {
        self.stopwatch.start_at(now);
        self.filter.resume_at(now);
    }
}
