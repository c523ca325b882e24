//! Stream registry: the public control surface
//!
//! Hosts address streams by [`StreamHandle`]. Every operation takes the
//! registry lock only to resolve the handle to its stream and then works
//! under that stream's own lock, so a slow stream never stalls the others.
//!
//! Errors never escape: a failed load yields [`StreamHandle::INVALID`],
//! operations on unknown or closed handles are no-ops, and queries on them
//! return `0.0` / `false`.
//!
//! Volumes are percentages in `[0, 100]` at this boundary.

use crate::audio::backend::{AudioBackend, DefaultBackend};
use crate::audio::decoder::Decoder;
use crate::audio::output::PlaybackSink;
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playback::decoder_worker;
use crate::playback::fader::PostFadeAction;
use crate::playback::handle::{HandleTable, StreamHandle};
use crate::playback::state::StreamState;
use crate::playback::stream::{PcmReader, Stream, StreamShared, StreamStats, StreamTuning};
use crate::playback::teardown::{StreamTable, TeardownQueue};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use vxa_common::volume::{gain_to_percent, percent_to_gain};

/// Owner of all open streams
pub struct StreamRegistry<B: AudioBackend = DefaultBackend> {
    backend: B,
    tuning: StreamTuning,
    table: StreamTable,
    /// Volume ceiling for new streams, in [0, 1]
    global_volume: Mutex<f32>,
    active_workers: Arc<AtomicUsize>,
    teardown: TeardownQueue,
}

impl StreamRegistry<DefaultBackend> {
    /// Registry on the default backend (symphonia decoding, default output).
    pub fn with_config(config: PlayerConfig) -> Result<Self> {
        let backend = DefaultBackend::new(&config.output);
        Self::new(backend, config)
    }
}

impl<B: AudioBackend> StreamRegistry<B> {
    pub fn new(backend: B, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let table: StreamTable = Arc::new(Mutex::new(HandleTable::new()));
        let teardown = TeardownQueue::start(Arc::clone(&table))?;

        Ok(Self {
            backend,
            tuning: StreamTuning::from_config(&config),
            table,
            global_volume: Mutex::new(1.0),
            active_workers: Arc::new(AtomicUsize::new(0)),
            teardown,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn stream(&self, handle: StreamHandle) -> Option<Arc<Stream>> {
        if !handle.is_valid() {
            return None;
        }
        self.table.lock().get(handle)
    }

    /// Open `path` and start its decode worker. The stream starts Paused.
    ///
    /// Returns [`StreamHandle::INVALID`] if the stream cannot be opened; the
    /// reason is logged.
    pub fn load(&self, path: impl AsRef<Path>, prescan: bool) -> StreamHandle {
        let path = path.as_ref();
        match self.try_load(path, prescan) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                StreamHandle::INVALID
            }
        }
    }

    /// Like [`load`](Self::load), reporting the failure.
    pub fn try_load(&self, path: impl AsRef<Path>, prescan: bool) -> Result<StreamHandle> {
        let path = path.as_ref();
        let handle = self.table.lock().reserve();

        match self.open_stream(handle, path, prescan) {
            Ok(stream) => {
                stream.mark_ready();
                self.table.lock().occupy(handle, stream);
                Ok(handle)
            }
            Err(e) => {
                self.table.lock().release(handle);
                Err(e)
            }
        }
    }

    fn open_stream(&self, handle: StreamHandle, path: &Path, prescan: bool) -> Result<Arc<Stream>> {
        let mut decoder = self.backend.create_decoder()?;
        decoder.open(path, prescan)?;

        let format = decoder.format_info();
        if !format.is_valid() {
            return Err(Error::Open(format!(
                "Unusable format: {} Hz, {} channels",
                format.sample_rate, format.channels
            )));
        }
        let length = decoder.length();

        let mut sink = self.backend.open_sink(format)?;
        let max_volume = *self.global_volume.lock();
        let shared = Arc::new(StreamShared::new(format, length, self.tuning.clone(), max_volume));

        sink.attach(PcmReader::new(Arc::clone(&shared)))?;
        shared.data.lock().sink_latency = sink.latency();

        let worker = match decoder_worker::spawn(
            handle,
            Arc::clone(&shared),
            decoder,
            Arc::clone(&self.active_workers),
        ) {
            Ok(worker) => worker,
            Err(e) => {
                sink.close();
                return Err(e);
            }
        };

        info!(
            "Loaded stream {} ({}): {:.2}s, {} Hz, {} channels",
            handle,
            path.display(),
            length,
            format.sample_rate,
            format.channels
        );
        Ok(Arc::new(Stream::new(
            handle,
            path.to_path_buf(),
            shared,
            Box::new(sink),
            worker,
        )))
    }

    /// Begin asynchronous teardown. Returns immediately; repeated closes are
    /// ignored.
    pub fn close(&self, handle: StreamHandle) {
        let Some(stream) = self.stream(handle) else {
            return;
        };
        if stream.begin_close() {
            debug!("Closing stream {}", handle);
            self.teardown.submit(stream);
        }
    }

    pub fn close_all(&self) {
        let streams = self.table.lock().values();
        for stream in streams {
            self.close(stream.handle());
        }
    }

    /// Close every stream and wait until all teardowns have completed.
    pub fn shutdown(&self) {
        self.close_all();
        self.teardown.wait_idle();
    }

    pub fn play(&self, handle: StreamHandle, looping: bool) {
        if let Some(stream) = self.stream(handle) {
            stream.play_at(looping, Instant::now());
        }
    }

    pub fn pause(&self, handle: StreamHandle) {
        if let Some(stream) = self.stream(handle) {
            stream.pause_at(Instant::now());
        }
    }

    /// Pause and rewind to the start.
    pub fn stop(&self, handle: StreamHandle) {
        if let Some(stream) = self.stream(handle) {
            stream.stop_at(Instant::now());
        }
    }

    /// Jump to `seconds`, discarding buffered audio.
    pub fn set_position(&self, handle: StreamHandle, seconds: f32) {
        if let Some(stream) = self.stream(handle) {
            stream.set_position_at(seconds, Instant::now());
        }
    }

    fn start_fade(&self, handle: StreamHandle, target_percent: f32, seconds: f32, action: PostFadeAction) {
        if let Some(stream) = self.stream(handle) {
            stream.fade_at(percent_to_gain(target_percent), seconds, action, Instant::now());
        }
    }

    /// Fade the volume to `target_percent` over `seconds`.
    pub fn fade(&self, handle: StreamHandle, target_percent: f32, seconds: f32) {
        self.start_fade(handle, target_percent, seconds, PostFadeAction::None);
    }

    pub fn fade_and_pause(&self, handle: StreamHandle, target_percent: f32, seconds: f32) {
        self.start_fade(handle, target_percent, seconds, PostFadeAction::Pause);
    }

    pub fn fade_and_stop(&self, handle: StreamHandle, target_percent: f32, seconds: f32) {
        self.start_fade(handle, target_percent, seconds, PostFadeAction::Stop);
    }

    pub fn fade_and_close(&self, handle: StreamHandle, target_percent: f32, seconds: f32) {
        self.start_fade(handle, target_percent, seconds, PostFadeAction::Close);
    }

    /// Drop an active fade, leaving the volume where it is.
    pub fn cancel_fade(&self, handle: StreamHandle) {
        if let Some(stream) = self.stream(handle) {
            stream.cancel_fade();
        }
    }

    pub fn is_fading(&self, handle: StreamHandle) -> bool {
        self.stream(handle).map_or(false, |stream| stream.is_fading())
    }

    /// Set the volume immediately, cancelling any fade.
    pub fn set_volume(&self, handle: StreamHandle, percent: f32) {
        if let Some(stream) = self.stream(handle) {
            stream.set_volume(percent_to_gain(percent));
        }
    }

    /// Current (fade-driven) volume in percent
    pub fn volume(&self, handle: StreamHandle) -> f32 {
        self.stream(handle)
            .map_or(0.0, |stream| gain_to_percent(stream.volume()))
    }

    pub fn set_max_volume(&self, handle: StreamHandle, percent: f32) {
        if let Some(stream) = self.stream(handle) {
            stream.set_max_volume(percent_to_gain(percent));
        }
    }

    /// Set the volume ceiling of new streams and of every stream that is
    /// not fading.
    pub fn set_global_volume(&self, percent: f32) {
        let gain = percent_to_gain(percent);
        *self.global_volume.lock() = gain;

        let streams = self.table.lock().values();
        for stream in streams {
            if !stream.is_fading() {
                stream.set_max_volume(gain);
            }
        }
    }

    pub fn global_volume(&self) -> f32 {
        gain_to_percent(*self.global_volume.lock())
    }

    /// Duration in seconds (0 if unknown)
    pub fn length(&self, handle: StreamHandle) -> f32 {
        self.stream(handle).map_or(0.0, |stream| stream.length())
    }

    /// Smoothed playback position in seconds
    pub fn position(&self, handle: StreamHandle) -> f32 {
        self.position_at(handle, Instant::now())
    }

    pub fn position_at(&self, handle: StreamHandle, now: Instant) -> f32 {
        self.stream(handle).map_or(0.0, |stream| stream.position_at(now))
    }

    pub fn is_playing(&self, handle: StreamHandle) -> bool {
        self.stream(handle)
            .map_or(false, |stream| stream.effective_state() == StreamState::Playing)
    }

    pub fn is_paused(&self, handle: StreamHandle) -> bool {
        self.stream(handle)
            .map_or(false, |stream| stream.effective_state() == StreamState::Paused)
    }

    pub fn is_finished(&self, handle: StreamHandle) -> bool {
        self.stream(handle)
            .map_or(false, |stream| stream.state() == StreamState::Finished)
    }

    /// Lifecycle state; `None` once the handle has been released
    pub fn state(&self, handle: StreamHandle) -> Option<StreamState> {
        self.stream(handle).map(|stream| stream.state())
    }

    pub fn stream_stats(&self, handle: StreamHandle) -> Option<StreamStats> {
        self.stream(handle).map(|stream| stream.stats())
    }

    /// Streams that are open and not closing
    pub fn stream_count(&self) -> usize {
        let streams = self.table.lock().values();
        streams
            .iter()
            .filter(|stream| !stream.state().is_closing())
            .count()
    }

    /// Decode worker threads currently alive
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Advance fades and run their post-fade actions, and feed push-mode
    /// sinks. Call periodically from the control thread.
    pub fn update(&self) {
        self.update_at(Instant::now());
    }

    pub fn update_at(&self, now: Instant) {
        let streams = self.table.lock().values();
        for stream in streams {
            match stream.tick_fade_at(now) {
                PostFadeAction::None => {}
                PostFadeAction::Pause => stream.pause_at(now),
                PostFadeAction::Stop => stream.stop_at(now),
                PostFadeAction::Close => self.close(stream.handle()),
            }
            stream.pump_at(now);
        }
    }
}

impl<B: AudioBackend> Drop for StreamRegistry<B> {
    fn drop(&mut self) {
        self.shutdown();
        self.teardown.stop();
    }
}
