//! Test helpers for vxa-player integration tests
//!
//! - `scripted`: deterministic decoder/backend and a sink the test drives by hand
//! - `audio_generator`: WAV fixtures written with hound

#![allow(dead_code)]

pub mod audio_generator;
pub mod scripted;

use std::time::{Duration, Instant};
use vxa_player::PlayerConfig;

pub use audio_generator::generate_sine_wav;
pub use scripted::{samples, Script, ScriptedBackend, SinkProbe};

/// Small buffers and short waits so tests run quickly
pub fn test_config() -> PlayerConfig {
    let mut config = PlayerConfig::default();
    config.buffer.capacity_bytes = 8000;
    config.buffer.low_water_bytes = 2000;
    config.buffer.worker_wait_ms = 5;
    config
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

pub const WAIT: Duration = Duration::from_secs(5);
