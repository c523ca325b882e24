//! Streaming playback core
//!
//! ```text
//! StreamRegistry ── handle ──> Stream
//!                               ├── decode worker ──> RingBuffer ──> PcmReader ──> PlaybackSink
//!                               ├── PlaybackClock  (fed by PcmReader)
//!                               └── FadeEnvelope   (ticked by StreamRegistry::update)
//! ```

pub mod clock;
mod decoder_worker;
pub mod fader;
mod handle;
pub mod registry;
pub mod ring_buffer;
pub mod state;
pub mod stream;
mod teardown;

pub use clock::{LowPassFilter, PlaybackClock};
pub use fader::{FadeEnvelope, FadeTick, PostFadeAction};
pub use handle::StreamHandle;
pub use registry::StreamRegistry;
pub use ring_buffer::{BufferFullError, RingBuffer};
pub use state::StreamState;
pub use stream::{PcmReader, StreamStats};
