//! Scripted decoder and hand-driven sink
//!
//! The decoder produces `total_chunks` chunks of constant samples; every
//! sample of chunk `i` has the value `(i + 1) * 100`, so tests can tell
//! which chunk a pulled block came from.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vxa_player::audio::types::samples_to_bytes;
use vxa_player::{
    AudioBackend, DecodedChunk, Decoder, Error, FormatInfo, PcmReader, PlaybackSink, Result,
    SinkMode,
};

/// Value of every sample in chunk `index`
pub fn chunk_value(index: usize) -> i16 {
    ((index + 1) * 100) as i16
}

/// Decode little-endian PCM bytes into samples
pub fn samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Script {
    pub format: FormatInfo,
    pub chunk_frames: usize,
    pub total_chunks: usize,
    /// Chunk index at which `decode` fails
    pub fail_at: Option<usize>,
    pub sink_mode: SinkMode,
    /// Time `close` blocks, standing in for a slow device shutdown
    pub close_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            // 8 kHz mono: 16000 bytes per second
            format: FormatInfo::new(8000, 1),
            // 50 ms, 800 bytes
            chunk_frames: 400,
            total_chunks: 40,
            fail_at: None,
            sink_mode: SinkMode::Pull,
            close_delay: Duration::ZERO,
        }
    }
}

impl Script {
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_frames * self.format.bytes_per_frame()
    }

    pub fn chunk_secs(&self) -> f32 {
        self.chunk_frames as f32 / self.format.sample_rate as f32
    }

    pub fn length(&self) -> f32 {
        self.total_chunks as f32 * self.chunk_secs()
    }
}

pub struct ScriptedDecoder {
    script: Script,
    next: usize,
}

impl Decoder for ScriptedDecoder {
    fn open(&mut self, path: &Path, _prescan: bool) -> Result<()> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("missing") {
            return Err(Error::Open(format!("No such file: {}", path.display())));
        }
        Ok(())
    }

    fn decode(&mut self) -> Result<Option<DecodedChunk>> {
        if self.script.fail_at == Some(self.next) {
            return Err(Error::Decode(format!("scripted failure at chunk {}", self.next)));
        }
        if self.next >= self.script.total_chunks {
            return Ok(None);
        }
        let samples = vec![chunk_value(self.next); self.script.chunk_frames * self.script.format.channels as usize];
        self.next += 1;
        let timecode = self.next as f32 * self.script.chunk_secs();
        Ok(Some(DecodedChunk::new(samples_to_bytes(&samples), timecode)))
    }

    fn set_position(&mut self, seconds: f32) -> Result<()> {
        self.next = (seconds / self.script.chunk_secs()).round() as usize;
        Ok(())
    }

    fn length(&self) -> f32 {
        self.script.length()
    }

    fn format_info(&self) -> FormatInfo {
        self.script.format
    }
}

#[derive(Default)]
pub struct ProbeState {
    pub reader: Option<PcmReader>,
    pub playing: bool,
    pub closed: bool,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub pushed: Vec<u8>,
}

/// Test-side view of a [`ProbeSink`]
#[derive(Clone, Default)]
pub struct SinkProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl SinkProbe {
    /// Run the sink callback once for `bytes` bytes.
    pub fn pull(&self, bytes: usize) -> (Vec<u8>, usize) {
        let reader = self
            .inner
            .lock()
            .reader
            .clone()
            .expect("sink not attached");
        let mut out = vec![0u8; bytes];
        let read = reader.fill(&mut out);
        (out, read)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn play_calls(&self) -> usize {
        self.inner.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.inner.lock().pause_calls
    }

    pub fn pushed(&self) -> Vec<u8> {
        self.inner.lock().pushed.clone()
    }
}

/// Sink without a device: pull mode waits for the test to call
/// [`SinkProbe::pull`], push mode records what it receives.
pub struct ProbeSink {
    mode: SinkMode,
    close_delay: Duration,
    probe: SinkProbe,
}

impl PlaybackSink for ProbeSink {
    fn mode(&self) -> SinkMode {
        self.mode
    }

    fn attach(&mut self, reader: PcmReader) -> Result<()> {
        self.probe.inner.lock().reader = Some(reader);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.probe.inner.lock();
        state.playing = true;
        state.play_calls += 1;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut state = self.probe.inner.lock();
        state.playing = false;
        state.pause_calls += 1;
        Ok(())
    }

    fn writable_bytes(&mut self) -> usize {
        match self.mode {
            SinkMode::Push => 1600,
            SinkMode::Pull => 0,
        }
    }

    fn push(&mut self, pcm: &[u8]) -> Result<()> {
        self.probe.inner.lock().pushed.extend_from_slice(pcm);
        Ok(())
    }

    fn close(&mut self) {
        if !self.close_delay.is_zero() {
            std::thread::sleep(self.close_delay);
        }
        let mut state = self.probe.inner.lock();
        state.playing = false;
        state.closed = true;
        state.reader = None;
    }
}

pub struct ScriptedBackend {
    script: Script,
    probes: Mutex<Vec<SinkProbe>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Probe of the most recently opened sink
    pub fn last_probe(&self) -> SinkProbe {
        self.probes.lock().last().cloned().expect("no sink opened")
    }

    pub fn sinks_opened(&self) -> usize {
        self.probes.lock().len()
    }
}

impl AudioBackend for ScriptedBackend {
    type Decoder = ScriptedDecoder;
    type Sink = ProbeSink;

    fn create_decoder(&self) -> Result<ScriptedDecoder> {
        Ok(ScriptedDecoder {
            script: self.script.clone(),
            next: 0,
        })
    }

    fn open_sink(&self, _format: FormatInfo) -> Result<ProbeSink> {
        let probe = SinkProbe::default();
        self.probes.lock().push(probe.clone());
        Ok(ProbeSink {
            mode: self.script.sink_mode,
            close_delay: self.script.close_delay,
            probe,
        })
    }
}
