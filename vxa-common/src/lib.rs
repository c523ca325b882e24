//! # VXA Common Library
//!
//! Shared code for the vxa playback crates:
//! - Error type used by configuration loading
//! - Configuration file resolution and TOML loading
//! - Pausable stopwatch with injectable instants
//! - Volume percent/gain conversions

pub mod config;
pub mod error;
pub mod stopwatch;
pub mod volume;

pub use error::{Error, Result};
pub use stopwatch::Stopwatch;
