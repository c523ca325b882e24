//! Configuration for the playback core
//!
//! All settings have built-in defaults, so an empty (or absent) TOML file is
//! a valid configuration:
//!
//! ```toml
//! [buffer]
//! capacity_bytes = 50000
//! low_water_bytes = 10000
//! worker_wait_ms = 10
//!
//! [clock]
//! k = 1.0
//! time_constant = 0.02
//! hard_reset_secs = 0.05
//! nudge_band_secs = 0.01
//! nudge_step_secs = 0.000025
//!
//! [output]
//! extra_latency_ms = 0
//! push_block_bytes = 8192
//! null_period_ms = 10
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The drift-correction constants are empirical tuning values; they are kept
//! configurable rather than treated as fixed.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "VXA_CONFIG";

/// Complete player configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub buffer: BufferConfig,
    pub clock: ClockConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Ring buffer and decode worker settings
#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    /// Ring buffer capacity per stream in bytes
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,

    /// Worker refills while occupancy is below `capacity_bytes - low_water_bytes`
    #[serde(default = "default_low_water_bytes")]
    pub low_water_bytes: usize,

    /// Upper bound on a single worker wait, keeps termination responsive
    #[serde(default = "default_worker_wait_ms")]
    pub worker_wait_ms: u64,
}

/// Drift-corrected playback clock settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    /// Low-pass filter gain
    #[serde(default = "default_clock_k")]
    pub k: f32,

    /// Low-pass filter time constant in seconds
    #[serde(default = "default_time_constant")]
    pub time_constant: f32,

    /// Drift beyond which the clock hard-resets to the filtered estimate
    #[serde(default = "default_hard_reset_secs")]
    pub hard_reset_secs: f32,

    /// Drift beyond which the clock is nudged toward the estimate
    #[serde(default = "default_nudge_band_secs")]
    pub nudge_band_secs: f32,

    /// Size of one nudge
    #[serde(default = "default_nudge_step_secs")]
    pub nudge_step_secs: f32,
}

/// Output-side settings
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Latency added on top of what the sink reports
    #[serde(default)]
    pub extra_latency_ms: u32,

    /// Block size for push-model sinks
    #[serde(default = "default_push_block_bytes")]
    pub push_block_bytes: usize,

    /// Pull period of the null sink
    #[serde(default = "default_null_period_ms")]
    pub null_period_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_capacity_bytes() -> usize {
    50_000
}

fn default_low_water_bytes() -> usize {
    10_000
}

fn default_worker_wait_ms() -> u64 {
    10
}

fn default_clock_k() -> f32 {
    1.0
}

fn default_time_constant() -> f32 {
    0.02
}

fn default_hard_reset_secs() -> f32 {
    0.05
}

fn default_nudge_band_secs() -> f32 {
    0.01
}

fn default_nudge_step_secs() -> f32 {
    0.000_025
}

fn default_push_block_bytes() -> usize {
    8192
}

fn default_null_period_ms() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
            low_water_bytes: default_low_water_bytes(),
            worker_wait_ms: default_worker_wait_ms(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            k: default_clock_k(),
            time_constant: default_time_constant(),
            hard_reset_secs: default_hard_reset_secs(),
            nudge_band_secs: default_nudge_band_secs(),
            nudge_step_secs: default_nudge_step_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            extra_latency_ms: 0,
            push_block_bytes: default_push_block_bytes(),
            null_period_ms: default_null_period_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BufferConfig {
    pub fn worker_wait(&self) -> Duration {
        Duration::from_millis(self.worker_wait_ms)
    }

    /// Occupancy below which the worker decodes more data
    pub fn refill_threshold(&self) -> usize {
        self.capacity_bytes.saturating_sub(self.low_water_bytes)
    }
}

impl OutputConfig {
    pub fn extra_latency_secs(&self) -> f32 {
        self.extra_latency_ms as f32 / 1000.0
    }

    pub fn null_period(&self) -> Duration {
        Duration::from_millis(self.null_period_ms)
    }
}

impl PlayerConfig {
    /// Load configuration following CLI → environment → user file → defaults.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config: PlayerConfig = vxa_common::config::load_or_default(cli_path, CONFIG_ENV_VAR)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the playback core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer.capacity_bytes == 0 {
            return Err(Error::Config("buffer.capacity_bytes must be > 0".to_string()));
        }
        if self.buffer.low_water_bytes >= self.buffer.capacity_bytes {
            return Err(Error::Config(format!(
                "buffer.low_water_bytes ({}) must be below buffer.capacity_bytes ({})",
                self.buffer.low_water_bytes, self.buffer.capacity_bytes
            )));
        }
        if self.buffer.worker_wait_ms == 0 {
            return Err(Error::Config("buffer.worker_wait_ms must be > 0".to_string()));
        }
        if self.clock.time_constant < 0.0 || self.clock.hard_reset_secs <= 0.0 {
            return Err(Error::Config(
                "clock.time_constant must be >= 0 and clock.hard_reset_secs > 0".to_string(),
            ));
        }
        if self.clock.nudge_band_secs < 0.0 || self.clock.nudge_band_secs > self.clock.hard_reset_secs {
            return Err(Error::Config(
                "clock.nudge_band_secs must lie within [0, hard_reset_secs]".to_string(),
            ));
        }
        if self.output.push_block_bytes == 0 || self.output.null_period_ms == 0 {
            return Err(Error::Config(
                "output.push_block_bytes and output.null_period_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
