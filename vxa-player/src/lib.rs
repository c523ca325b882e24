//! vxa-player: streaming audio playback core
//!
//! Decodes audio files on background threads and feeds real-time output
//! callbacks through bounded per-stream ring buffers, with a smoothed
//! position clock, volume fades, seeking, looping and asynchronous teardown.
//!
//! ```no_run
//! use vxa_player::{PlayerConfig, StreamRegistry};
//!
//! let registry = StreamRegistry::with_config(PlayerConfig::default())?;
//! let handle = registry.load("song.ogg", false);
//! registry.play(handle, false);
//! registry.fade_and_stop(handle, 0.0, 2.0);
//! loop {
//!     registry.update();
//!     if !registry.is_playing(handle) {
//!         break;
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! # Ok::<(), vxa_player::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use audio::{AudioBackend, DecodedChunk, Decoder, DefaultBackend, FormatInfo, PlaybackSink, SinkMode};
pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use playback::{PcmReader, StreamHandle, StreamRegistry, StreamState, StreamStats};
