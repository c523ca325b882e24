//! Audio collaborators of the playback core
//!
//! Decoding and output are reached only through the [`Decoder`] and
//! [`PlaybackSink`] traits; this module also provides the bundled
//! implementations.

pub mod backend;
pub mod decoder;
#[cfg(feature = "cpal")]
pub mod device;
pub mod output;
pub mod types;

pub use backend::{AudioBackend, DefaultBackend, DefaultSink};
pub use decoder::{Decoder, SymphoniaDecoder};
#[cfg(feature = "cpal")]
pub use device::CpalSink;
pub use output::{NullSink, PlaybackSink, SinkMode};
pub use types::{DecodedChunk, FormatInfo};
