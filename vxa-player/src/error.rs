//! Error types for vxa-player
//!
//! Errors stay inside the playback core: the registry absorbs them (logging
//! and returning an invalid handle or a default value) so none of them reach
//! the host as a crash.

use crate::playback::ring_buffer::BufferFullError;
use thiserror::Error;

/// Main error type for vxa-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration values rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stream could not be opened (missing file, unsupported codec, device init)
    #[error("Failed to open stream: {0}")]
    Open(String),

    /// Mid-stream decode failure
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Write larger than the ring buffer's vacant space
    #[error(transparent)]
    Buffer(#[from] BufferFullError),

    /// Errors from the shared library (config file loading)
    #[error(transparent)]
    Common(#[from] vxa_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using vxa-player Error
pub type Result<T> = std::result::Result<T, Error>;
