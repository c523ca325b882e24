//! Common error types for vxa

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for vxa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the vxa crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML document could not be parsed into the requested type
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
