//! One open stream
//!
//! Three threads touch a stream:
//!
//! ```text
//! control (registry calls) ──┐
//!                            ├──> StreamShared { Mutex<StreamData>, Condvar }
//! decode worker ─────────────┤
//! sink callback (PcmReader) ─┘
//! ```
//!
//! All mutable per-stream state lives in [`StreamData`] under one mutex. The
//! sink sits in its own mutex; when both are needed the sink lock is taken
//! first, and sink methods are never called with the data lock held (a sink
//! may wait for its callback, which takes the data lock).

use crate::audio::output::{PlaybackSink, SinkMode};
use crate::audio::types::{apply_gain, FormatInfo};
use crate::config::{ClockConfig, PlayerConfig};
use crate::playback::clock::PlaybackClock;
use crate::playback::fader::{FadeEnvelope, FadeTick, PostFadeAction};
use crate::playback::handle::StreamHandle;
use crate::playback::ring_buffer::RingBuffer;
use crate::playback::state::StreamState;
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Underruns between two trace lines
const UNDERRUN_LOG_INTERVAL: u64 = 100;

/// Command for the decode worker, taken atomically on its next iteration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) enum PendingCommand {
    #[default]
    None,
    Seek(f32),
    Loop,
}

/// Per-stream copy of the settings the worker and fill path need
#[derive(Debug, Clone)]
pub(crate) struct StreamTuning {
    pub capacity_bytes: usize,
    pub refill_threshold: usize,
    pub worker_wait: Duration,
    pub extra_latency: f32,
    pub push_block_bytes: usize,
    pub clock: ClockConfig,
}

impl StreamTuning {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            capacity_bytes: config.buffer.capacity_bytes,
            refill_threshold: config.buffer.refill_threshold(),
            worker_wait: config.buffer.worker_wait(),
            extra_latency: config.output.extra_latency_secs(),
            push_block_bytes: config.output.push_block_bytes,
            clock: config.clock.clone(),
        }
    }
}

/// Mutable stream state, guarded by `StreamShared::data`
#[derive(Debug)]
pub(crate) struct StreamData {
    pub state: StreamState,
    /// State to return to when the current seek completes
    pub resume_state: StreamState,
    pub buffer: RingBuffer,
    /// Fade-driven volume in [0, 1]
    pub volume: f32,
    /// Volume ceiling in [0, 1]
    pub max_volume: f32,
    pub looping: bool,
    /// Stream time at the end of the last byte written to `buffer`
    pub last_timecode: f32,
    pub no_more_data: bool,
    pub terminated: bool,
    pub pending: PendingCommand,
    /// Bumped by every seek; decoded data from an older generation is dropped
    pub seek_generation: u64,
    pub fade: Option<FadeEnvelope>,
    pub clock: PlaybackClock,
    pub sink_latency: f32,
    pub underruns: u64,
    pub bytes_decoded: u64,
    pub loop_count: u64,
}

impl StreamData {
    fn gain(&self) -> f32 {
        self.volume * self.max_volume
    }

    /// Playback reached the end of the data: Playing → Finished.
    pub fn check_finished(&mut self, now: Instant) -> bool {
        if self.state == StreamState::Playing && self.no_more_data && self.buffer.is_empty() {
            self.state = StreamState::Finished;
            self.clock.pause_at(now);
            return true;
        }
        false
    }

    /// State as seen by callers: a seek in progress reports the state it
    /// will return to.
    fn effective_state(&self) -> StreamState {
        match self.state {
            StreamState::Seeking => self.resume_state,
            state => state,
        }
    }
}

/// State shared by the control thread, decode worker and sink
pub(crate) struct StreamShared {
    pub data: Mutex<StreamData>,
    /// Wakes the decode worker
    pub wake: Condvar,
    pub format: FormatInfo,
    /// Duration in seconds (0 if unknown)
    pub length: f32,
    pub tuning: StreamTuning,
}

impl StreamShared {
    pub fn new(format: FormatInfo, length: f32, tuning: StreamTuning, max_volume: f32) -> Self {
        let data = StreamData {
            state: StreamState::Opening,
            resume_state: StreamState::Paused,
            buffer: RingBuffer::new(tuning.capacity_bytes),
            volume: 1.0,
            max_volume,
            looping: false,
            last_timecode: 0.0,
            no_more_data: false,
            terminated: false,
            pending: PendingCommand::None,
            seek_generation: 0,
            fade: None,
            clock: PlaybackClock::new(tuning.clock.clone()),
            sink_latency: 0.0,
            underruns: 0,
            bytes_decoded: 0,
            loop_count: 0,
        };
        Self {
            data: Mutex::new(data),
            wake: Condvar::new(),
            format,
            length: length.max(0.0),
            tuning,
        }
    }

    /// Copy gain-adjusted PCM out of the ring buffer and feed the clock.
    ///
    /// Data is taken only when the whole request can be served, or when the
    /// decoder is done and a final partial block remains. With `pad` the
    /// unfilled part of `out` is zeroed and counted as an underrun.
    pub fn take_pcm(&self, out: &mut [u8], now: Instant, pad: bool) -> usize {
        let mut data = self.data.lock();
        if data.state != StreamState::Playing {
            if pad {
                out.fill(0);
            }
            return 0;
        }

        let request = out.len();
        let available = data.buffer.bytes_not_read();
        let read = if (data.no_more_data && available > 0) || available >= request {
            data.buffer.read(out)
        } else {
            0
        };

        if read < request && pad {
            out[read..].fill(0);
            if !data.no_more_data {
                data.underruns += 1;
                if data.underruns % UNDERRUN_LOG_INTERVAL == 1 {
                    trace!(
                        "Buffer underrun: {} of {} bytes available ({} underruns)",
                        available,
                        request,
                        data.underruns
                    );
                }
            }
        }
        let gain = data.gain();
        apply_gain(&mut out[..read], gain);

        if read > 0 || pad {
            let bps = self.format.bytes_per_second();
            let latency = request as f32 / bps + data.sink_latency + self.tuning.extra_latency;
            let reported = data.last_timecode - data.buffer.bytes_not_read() as f32 / bps - latency;
            if !data.clock.is_running() {
                data.clock.resume_at(now);
            }
            data.clock.update_at(reported, now);
        }

        data.check_finished(now);
        drop(data);
        self.wake.notify_one();
        read
    }
}

/// Data source handed to a pull sink
///
/// Cheap to clone; every clone reads from the same stream.
#[derive(Clone)]
pub struct PcmReader {
    shared: Arc<StreamShared>,
}

impl PcmReader {
    pub(crate) fn new(shared: Arc<StreamShared>) -> Self {
        Self { shared }
    }

    pub fn format(&self) -> FormatInfo {
        self.shared.format
    }

    /// Fill `out` with the next PCM bytes, padding with silence when not
    /// enough data is buffered. Returns the number of real audio bytes.
    ///
    /// Meant for real-time callbacks: holds the stream lock only for a copy.
    pub fn fill(&self, out: &mut [u8]) -> usize {
        self.fill_at(out, Instant::now())
    }

    pub fn fill_at(&self, out: &mut [u8], now: Instant) -> usize {
        self.shared.take_pcm(out, now, true)
    }
}

impl std::fmt::Debug for PcmReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmReader")
            .field("format", &self.shared.format)
            .finish()
    }
}

/// Snapshot of a stream's buffer and counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStats {
    pub state: StreamState,
    pub capacity: usize,
    pub occupancy: usize,
    pub underruns: u64,
    pub bytes_decoded: u64,
    pub loop_count: u64,
}

/// Registry entry for one open stream
pub(crate) struct Stream {
    handle: StreamHandle,
    path: PathBuf,
    shared: Arc<StreamShared>,
    sink: Mutex<Option<Box<dyn PlaybackSink>>>,
    sink_mode: SinkMode,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Stream {
    pub fn new(
        handle: StreamHandle,
        path: PathBuf,
        shared: Arc<StreamShared>,
        sink: Box<dyn PlaybackSink>,
        worker: JoinHandle<()>,
    ) -> Self {
        let sink_mode = sink.mode();
        Self {
            handle,
            path,
            shared,
            sink: Mutex::new(Some(sink)),
            sink_mode,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn length(&self) -> f32 {
        self.shared.length
    }

    pub fn state(&self) -> StreamState {
        self.shared.data.lock().state
    }

    pub fn effective_state(&self) -> StreamState {
        self.shared.data.lock().effective_state()
    }

    /// Opening → Paused once decoder, worker and sink are in place.
    pub fn mark_ready(&self) {
        let mut data = self.shared.data.lock();
        if data.state == StreamState::Opening {
            data.state = StreamState::Paused;
        }
    }

    fn refresh_latency(&self, sink: &dyn PlaybackSink) {
        let latency = sink.latency();
        self.shared.data.lock().sink_latency = latency;
    }

    pub fn play_at(&self, looping: bool, now: Instant) {
        let mut sink = self.sink.lock();
        {
            let mut data = self.shared.data.lock();
            match data.state {
                StreamState::Paused => {
                    data.state = StreamState::Playing;
                    data.clock.resume_at(now);
                }
                StreamState::Seeking => data.resume_state = StreamState::Playing,
                StreamState::Playing => {}
                _ => return,
            }
            data.looping = looping;
        }
        self.shared.wake.notify_all();

        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.play() {
                warn!("Failed to start output for stream {}: {}", self.handle, e);
            }
            self.refresh_latency(&**sink);
        }
    }

    pub fn pause_at(&self, now: Instant) {
        let mut sink = self.sink.lock();
        {
            let mut data = self.shared.data.lock();
            match data.state {
                StreamState::Playing => {
                    data.state = StreamState::Paused;
                    data.clock.pause_at(now);
                }
                StreamState::Seeking => data.resume_state = StreamState::Paused,
                _ => return,
            }
        }

        if let Some(sink) = sink.as_mut() {
            if let Err(e) = sink.pause() {
                warn!("Failed to pause output for stream {}: {}", self.handle, e);
            }
        }
    }

    /// Discard buffered audio and reposition to `seconds` (clamped to the
    /// stream length). The position reads `seconds` immediately; the worker
    /// completes the reposition asynchronously.
    pub fn set_position_at(&self, seconds: f32, now: Instant) {
        let mut sink = self.sink.lock();
        let was_finished;
        {
            let mut data = self.shared.data.lock();
            if !data.state.accepts_commands() {
                return;
            }

            let seconds = if seconds.is_nan() { 0.0 } else { seconds };
            let upper = if self.shared.length > 0.0 {
                self.shared.length
            } else {
                f32::MAX
            };
            let target = seconds.clamp(0.0, upper);

            was_finished = data.state == StreamState::Finished;
            data.resume_state = match data.state {
                StreamState::Seeking => data.resume_state,
                StreamState::Finished => StreamState::Paused,
                state => state,
            };
            data.state = StreamState::Seeking;
            data.buffer.reset();
            data.clock.set_at(target, now);
            data.clock.pause_at(now);
            data.last_timecode = target;
            data.seek_generation += 1;
            data.pending = PendingCommand::Seek(target);
            debug!("Stream {} seeking to {:.3}s", self.handle, target);
        }
        self.shared.wake.notify_all();

        if was_finished {
            if let Some(sink) = sink.as_mut() {
                if let Err(e) = sink.pause() {
                    warn!("Failed to pause output for stream {}: {}", self.handle, e);
                }
            }
        }
    }

    /// Pause and rewind to the start.
    pub fn stop_at(&self, now: Instant) {
        self.pause_at(now);
        self.set_position_at(0.0, now);
    }

    /// Set the volume directly, cancelling any fade.
    pub fn set_volume(&self, gain: f32) {
        let mut data = self.shared.data.lock();
        if !data.state.accepts_commands() {
            return;
        }
        data.fade = None;
        data.volume = gain;
    }

    pub fn volume(&self) -> f32 {
        self.shared.data.lock().volume
    }

    pub fn set_max_volume(&self, gain: f32) {
        let mut data = self.shared.data.lock();
        if data.state.accepts_commands() {
            data.max_volume = gain;
        }
    }

    pub fn fade_at(&self, target: f32, seconds: f32, action: PostFadeAction, now: Instant) {
        let mut data = self.shared.data.lock();
        if !data.state.accepts_commands() {
            return;
        }
        let start = data.volume;
        data.fade = Some(FadeEnvelope::new_at(start, target, seconds, action, now));
    }

    pub fn cancel_fade(&self) {
        self.shared.data.lock().fade = None;
    }

    pub fn is_fading(&self) -> bool {
        self.shared.data.lock().fade.is_some()
    }

    /// Advance the fade; returns the action to run if it just completed.
    pub fn tick_fade_at(&self, now: Instant) -> PostFadeAction {
        let mut data = self.shared.data.lock();
        if !data.state.accepts_commands() {
            return PostFadeAction::None;
        }
        let tick = match data.fade.as_ref() {
            Some(fade) => fade.tick_at(now),
            None => return PostFadeAction::None,
        };
        match tick {
            FadeTick::Running(volume) => {
                data.volume = volume;
                PostFadeAction::None
            }
            FadeTick::Done { volume, action } => {
                data.volume = volume;
                data.fade = None;
                action
            }
        }
    }

    /// Clock position clamped to `[0, length]`. A clock running past the
    /// end is stopped there.
    pub fn position_at(&self, now: Instant) -> f32 {
        let mut data = self.shared.data.lock();
        let mut position = data.clock.position_at(now);
        if self.shared.length > 0.0 && position > self.shared.length {
            data.clock.pause_at(now);
            position = self.shared.length;
        }
        position.max(0.0)
    }

    pub fn stats(&self) -> StreamStats {
        let data = self.shared.data.lock();
        StreamStats {
            state: data.state,
            capacity: data.buffer.capacity(),
            occupancy: data.buffer.bytes_not_read(),
            underruns: data.underruns,
            bytes_decoded: data.bytes_decoded,
            loop_count: data.loop_count,
        }
    }

    /// Move PCM into a push-mode sink.
    pub fn pump_at(&self, now: Instant) {
        if self.sink_mode != SinkMode::Push {
            return;
        }
        let mut guard = self.sink.lock();
        let Some(sink) = guard.as_mut() else {
            return;
        };

        let writable = sink.writable_bytes().min(self.shared.tuning.push_block_bytes);
        let writable = self.shared.format.align_to_frame(writable);
        if writable == 0 {
            return;
        }
        self.refresh_latency(&**sink);

        let mut block = vec![0u8; writable];
        let read = self.shared.take_pcm(&mut block, now, false);
        if read > 0 {
            if let Err(e) = sink.push(&block[..read]) {
                warn!("Failed to push audio for stream {}: {}", self.handle, e);
            }
        }
    }

    /// Enter Closing. Returns false if the stream was already closing.
    pub fn begin_close(&self) -> bool {
        {
            let mut data = self.shared.data.lock();
            if data.state.is_closing() {
                return false;
            }
            data.state = StreamState::Closing;
            data.terminated = true;
            data.fade = None;
        }
        self.shared.wake.notify_all();
        true
    }

    /// Stop the sink, join the worker and mark the stream Closed.
    ///
    /// Runs on the teardown thread; may block on device shutdown.
    pub fn teardown(&self) {
        if let Some(mut sink) = self.sink.lock().take() {
            sink.close();
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("Decode worker for stream {} panicked", self.handle);
            }
        }

        let mut data = self.shared.data.lock();
        data.buffer.reset();
        data.state = StreamState::Closed;
    }
}
