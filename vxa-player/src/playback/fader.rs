//! Linear volume fades
//!
//! A fade interpolates the stream volume from its value at fade start to a
//! target over a fixed duration. When it completes, the volume lands exactly
//! on the target and the single queued [`PostFadeAction`] is handed back to
//! the registry for execution.

use std::time::Instant;

/// What to do with a stream once its fade completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostFadeAction {
    #[default]
    None,
    Pause,
    Stop,
    Close,
}

/// Result of advancing a fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeTick {
    /// Fade still running; volume to apply now
    Running(f32),
    /// Fade complete
    Done { volume: f32, action: PostFadeAction },
}

/// Active fade of one stream
#[derive(Debug, Clone)]
pub struct FadeEnvelope {
    start_volume: f32,
    target_volume: f32,
    duration: f32,
    started: Instant,
    action: PostFadeAction,
}

impl FadeEnvelope {
    /// Start a fade at `now`. Negative durations are treated as 0.
    pub fn new_at(
        start_volume: f32,
        target_volume: f32,
        seconds: f32,
        action: PostFadeAction,
        now: Instant,
    ) -> Self {
        Self {
            start_volume,
            target_volume,
            duration: seconds.max(0.0),
            started: now,
            action,
        }
    }

    pub fn tick_at(&self, now: Instant) -> FadeTick {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f32();
        if elapsed < self.duration {
            let progress = elapsed / self.duration;
            FadeTick::Running(self.start_volume + (self.target_volume - self.start_volume) * progress)
        } else {
            FadeTick::Done {
                volume: self.target_volume,
                action: self.action,
            }
        }
    }
}
