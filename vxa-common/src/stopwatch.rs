//! Pausable stopwatch
//!
//! Accumulates elapsed time across start/stop cycles. Every operation has an
//! `*_at` form taking the current [`Instant`] explicitly so that timing logic
//! built on top of it can be driven deterministically in tests; the plain
//! forms use `Instant::now()`.

use std::time::{Duration, Instant};

/// Stopwatch measuring elapsed time while running
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    /// Time accumulated by previous running periods
    accumulated: Duration,

    /// Start of the current running period (None = stopped)
    started_at: Option<Instant>,
}

impl Stopwatch {
    /// Create a stopped stopwatch with zero elapsed time
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stopwatch that is already running
    pub fn started_at(now: Instant) -> Self {
        Self {
            accumulated: Duration::ZERO,
            started_at: Some(now),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start (or keep) running. No effect if already running.
    pub fn start_at(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Stop running, keeping the elapsed time.
    pub fn stop_at(&mut self, now: Instant) {
        if let Some(start) = self.started_at.take() {
            self.accumulated += now.saturating_duration_since(start);
        }
    }

    /// Zero the elapsed time without changing the running state.
    pub fn reset_at(&mut self, now: Instant) {
        self.accumulated = Duration::ZERO;
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
    }

    /// Zero the elapsed time and start running.
    pub fn restart_at(&mut self, now: Instant) {
        self.accumulated = Duration::ZERO;
        self.started_at = Some(now);
    }

    /// Elapsed time as of `now`
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) => self.accumulated + now.saturating_duration_since(start),
            None => self.accumulated,
        }
    }

    /// Elapsed seconds as of `now`
    pub fn elapsed_secs_at(&self, now: Instant) -> f32 {
        self.elapsed_at(now).as_secs_f32()
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }
}
