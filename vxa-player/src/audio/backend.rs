//! Backend selection
//!
//! An [`AudioBackend`] names the decoder/sink pair the registry instantiates
//! for every stream. The playback core is generic over it; tests plug in
//! scripted implementations.

use crate::audio::decoder::{Decoder, SymphoniaDecoder};
use crate::audio::output::PlaybackSink;
use crate::audio::types::FormatInfo;
use crate::config::OutputConfig;
use crate::error::Result;

#[cfg(feature = "cpal")]
use crate::audio::device::CpalSink;
#[cfg(not(feature = "cpal"))]
use crate::audio::output::NullSink;

/// Factory for per-stream decoders and sinks
pub trait AudioBackend: Send + Sync + 'static {
    type Decoder: Decoder + 'static;
    type Sink: PlaybackSink + 'static;

    fn create_decoder(&self) -> Result<Self::Decoder>;

    /// Open an output for PCM in `format`.
    fn open_sink(&self, format: FormatInfo) -> Result<Self::Sink>;
}

/// Sink used by [`DefaultBackend`]
#[cfg(feature = "cpal")]
pub type DefaultSink = CpalSink;
#[cfg(not(feature = "cpal"))]
pub type DefaultSink = NullSink;

/// Symphonia decoding with the default output
#[derive(Debug, Clone, Default)]
pub struct DefaultBackend {
    /// Pacing of the null sink; a device sink paces itself
    #[cfg(not(feature = "cpal"))]
    output: OutputConfig,
}

impl DefaultBackend {
    #[cfg(not(feature = "cpal"))]
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            output: output.clone(),
        }
    }

    #[cfg(feature = "cpal")]
    pub fn new(_output: &OutputConfig) -> Self {
        Self {}
    }
}

impl AudioBackend for DefaultBackend {
    type Decoder = SymphoniaDecoder;
    type Sink = DefaultSink;

    fn create_decoder(&self) -> Result<SymphoniaDecoder> {
        Ok(SymphoniaDecoder::new())
    }

    #[cfg(feature = "cpal")]
    fn open_sink(&self, format: FormatInfo) -> Result<DefaultSink> {
        CpalSink::open(format)
    }

    #[cfg(not(feature = "cpal"))]
    fn open_sink(&self, format: FormatInfo) -> Result<DefaultSink> {
        Ok(NullSink::new(format, self.output.null_period()))
    }
}

#[cfg(all(test, not(feature = "cpal")))]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_paced_by_configured_period() {
        let mut output = OutputConfig::default();
        output.null_period_ms = 25;
        let backend = DefaultBackend::new(&output);

        let sink = backend.open_sink(FormatInfo::new(8000, 1)).unwrap();
        assert!((sink.latency() - 0.025).abs() < 1e-6);
    }

    #[test]
    fn test_default_backend_uses_default_period() {
        let sink = DefaultBackend::default()
            .open_sink(FormatInfo::new(44100, 2))
            .unwrap();
        assert!((sink.latency() - OutputConfig::default().null_period().as_secs_f32()).abs() < 1e-6);
    }
}
