//! Playback sinks
//!
//! A [`PlaybackSink`] moves PCM from a stream to an output device. Two shapes
//! are supported:
//!
//! - **Pull** (callback devices): the sink keeps the [`PcmReader`] handed to
//!   [`PlaybackSink::attach`] and calls [`PcmReader::fill`] from its own
//!   real-time thread whenever the device wants data.
//! - **Push** (queue devices): the registry's `update()` asks the sink how
//!   much it can take ([`PlaybackSink::writable_bytes`]) and hands it PCM
//!   with [`PlaybackSink::push`].
//!
//! [`NullSink`] is a pull sink with no device behind it: its thread consumes
//! data at real-time pace, which gives headless playback with a working
//! clock.

use crate::audio::types::FormatInfo;
use crate::error::{Error, Result};
use crate::playback::PcmReader;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// How a sink obtains its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Pull,
    Push,
}

/// Output device for one stream
pub trait PlaybackSink: Send {
    fn mode(&self) -> SinkMode {
        SinkMode::Pull
    }

    /// Connect the stream's data source. Called once, before `play`.
    fn attach(&mut self, reader: PcmReader) -> Result<()>;

    /// Start (or resume) consuming data.
    fn play(&mut self) -> Result<()>;

    /// Stop consuming data, keeping the device open.
    fn pause(&mut self) -> Result<()>;

    /// Seconds between data leaving the stream and being heard
    fn latency(&self) -> f32 {
        0.0
    }

    /// Push sinks: bytes the device queue accepts right now
    fn writable_bytes(&mut self) -> usize {
        0
    }

    /// Push sinks: queue PCM for output
    fn push(&mut self, _pcm: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Release the device. Must not be called from the device's own thread.
    fn close(&mut self);
}

#[derive(Debug, Default)]
struct NullControl {
    playing: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct NullShared {
    control: Mutex<NullControl>,
    wake: Condvar,
}

/// Pull sink that discards audio at real-time pace
pub struct NullSink {
    format: FormatInfo,
    period: Duration,
    shared: Arc<NullShared>,
    thread: Option<JoinHandle<()>>,
}

impl NullSink {
    pub fn new(format: FormatInfo, period: Duration) -> Self {
        Self {
            format,
            period: period.max(Duration::from_millis(1)),
            shared: Arc::new(NullShared::default()),
            thread: None,
        }
    }

    /// Bytes consumed per period, a whole number of frames
    fn period_bytes(&self) -> usize {
        let bytes = (self.format.bytes_per_second() * self.period.as_secs_f32()) as usize;
        self.format.align_to_frame(bytes).max(self.format.bytes_per_frame())
    }

    fn set_playing(&self, playing: bool) {
        self.shared.control.lock().playing = playing;
        self.shared.wake.notify_all();
    }
}

fn run_null_device(shared: Arc<NullShared>, reader: PcmReader, period: Duration, period_bytes: usize) {
    let mut block = vec![0u8; period_bytes];
    loop {
        {
            let mut control = shared.control.lock();
            while !control.playing && !control.closed {
                shared.wake.wait(&mut control);
            }
            if control.closed {
                break;
            }
        }

        reader.fill(&mut block);

        let mut control = shared.control.lock();
        if control.closed {
            break;
        }
        shared.wake.wait_for(&mut control, period);
    }
    debug!("Null sink thread exiting");
}

impl PlaybackSink for NullSink {
    fn attach(&mut self, reader: PcmReader) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::AudioOutput("Null sink already attached".to_string()));
        }
        let shared = Arc::clone(&self.shared);
        let period = self.period;
        let period_bytes = self.period_bytes();

        let handle = std::thread::Builder::new()
            .name("vxa-null-sink".to_string())
            .spawn(move || run_null_device(shared, reader, period, period_bytes))
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn null sink thread: {}", e)))?;
        self.thread = Some(handle);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.set_playing(true);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.set_playing(false);
        Ok(())
    }

    fn latency(&self) -> f32 {
        self.period.as_secs_f32()
    }

    fn close(&mut self) {
        self.shared.control.lock().closed = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Null sink thread panicked");
            }
        }
    }
}

impl Drop for NullSink {
    fn drop(&mut self) {
        self.close();
    }
}
