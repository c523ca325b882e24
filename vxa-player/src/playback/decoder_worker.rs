//! Background decode worker
//!
//! One thread per stream keeps the ring buffer topped up:
//!
//! 1. wait on the stream's condition variable (bounded by `worker_wait`)
//!    unless there is work already
//! 2. take the pending command, if any (`Seek` repositions the decoder and
//!    resets the buffer and timing, `Loop` does the same at 0)
//! 3. while Playing and below the refill threshold, decode one chunk
//!    **without holding the stream lock** and append it
//!
//! A chunk that does not fit is written in parts; the remainder is carried
//! into the next iteration. Chunks decoded across a concurrent seek are
//! recognised by the seek generation and dropped.

use crate::audio::decoder::Decoder;
use crate::audio::types::DecodedChunk;
use crate::error::Result;
use crate::playback::handle::StreamHandle;
use crate::playback::state::StreamState;
use crate::playback::stream::{PendingCommand, StreamData, StreamShared};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, warn};

/// Keeps the registry's live-worker count in step with worker threads.
struct WorkerGuard {
    active: Arc<AtomicUsize>,
}

impl WorkerGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Start the decode worker thread for one stream.
pub(crate) fn spawn<D: Decoder + 'static>(
    handle: StreamHandle,
    shared: Arc<StreamShared>,
    decoder: D,
    active: Arc<AtomicUsize>,
) -> Result<JoinHandle<()>> {
    let guard = WorkerGuard::new(active);
    let thread = std::thread::Builder::new()
        .name(format!("vxa-decode-{}", handle.index()))
        .spawn(move || {
            let _guard = guard;
            DecodeWorker::new(handle, decoder).run(&shared);
        })?;
    Ok(thread)
}

/// Decoded bytes not yet written to the ring buffer
struct Carry {
    pcm: Vec<u8>,
    offset: usize,
    timecode: f32,
    generation: u64,
}

enum Step {
    Exit,
    Idle,
    Seek { target: f32, generation: u64 },
    Rewind { generation: u64 },
    Decode { generation: u64 },
}

struct DecodeWorker<D> {
    handle: StreamHandle,
    decoder: D,
    carry: Option<Carry>,
    /// Guards against spinning on a looped stream that yields no audio
    bytes_since_rewind: u64,
}

impl<D: Decoder> DecodeWorker<D> {
    fn new(handle: StreamHandle, decoder: D) -> Self {
        Self {
            handle,
            decoder,
            carry: None,
            bytes_since_rewind: 0,
        }
    }

    fn run(mut self, shared: &StreamShared) {
        debug!("Decode worker started for stream {}", self.handle);
        loop {
            match self.next_step(shared) {
                Step::Exit => break,
                Step::Idle => {}
                Step::Seek { target, generation } => self.seek(shared, target, generation),
                Step::Rewind { generation } => self.rewind(shared, generation),
                Step::Decode { generation } => self.decode(shared, generation),
            }
        }
        debug!("Decode worker exiting for stream {}", self.handle);
    }

    fn wants_data(shared: &StreamShared, data: &StreamData) -> bool {
        data.state == StreamState::Playing
            && !data.no_more_data
            && data.pending == PendingCommand::None
            && data.buffer.bytes_not_read() < shared.tuning.refill_threshold
    }

    fn has_work(&self, shared: &StreamShared, data: &StreamData) -> bool {
        if data.pending != PendingCommand::None {
            return true;
        }
        match &self.carry {
            Some(carry) => carry.generation != data.seek_generation || data.buffer.vacant() > 0,
            None => Self::wants_data(shared, data),
        }
    }

    fn next_step(&mut self, shared: &StreamShared) -> Step {
        let mut data = shared.data.lock();
        if data.terminated {
            return Step::Exit;
        }
        if !self.has_work(shared, &data) {
            shared.wake.wait_for(&mut data, shared.tuning.worker_wait);
            if data.terminated {
                return Step::Exit;
            }
        }

        match mem::take(&mut data.pending) {
            PendingCommand::Seek(target) => {
                self.carry = None;
                return Step::Seek {
                    target,
                    generation: data.seek_generation,
                };
            }
            PendingCommand::Loop => {
                self.carry = None;
                return Step::Rewind {
                    generation: data.seek_generation,
                };
            }
            PendingCommand::None => {}
        }

        self.flush_carry(shared, &mut data);
        data.check_finished(Instant::now());

        if self.carry.is_none() && Self::wants_data(shared, &data) {
            Step::Decode {
                generation: data.seek_generation,
            }
        } else {
            Step::Idle
        }
    }

    /// Write as much of the carried chunk as fits.
    fn flush_carry(&mut self, shared: &StreamShared, data: &mut StreamData) {
        let Some(carry) = self.carry.as_mut() else {
            return;
        };
        if carry.generation != data.seek_generation {
            self.carry = None;
            return;
        }

        let remaining = carry.pcm.len() - carry.offset;
        let count = remaining.min(data.buffer.vacant());
        if count > 0 {
            if let Err(e) = data.buffer.write(&carry.pcm[carry.offset..carry.offset + count]) {
                warn!("Dropping decoded audio for stream {}: {}", self.handle, e);
                self.carry = None;
                return;
            }
            carry.offset += count;
        }

        let left = carry.pcm.len() - carry.offset;
        data.last_timecode = carry.timecode - shared.format.bytes_to_secs(left);
        if left == 0 {
            self.carry = None;
        }
    }

    fn decode(&mut self, shared: &StreamShared, generation: u64) {
        let result = self.decoder.decode();

        let mut data = shared.data.lock();
        if data.terminated || data.seek_generation != generation {
            return;
        }

        match result {
            Ok(Some(DecodedChunk { pcm, timecode })) => {
                let len = pcm.len() as u64;
                data.bytes_decoded += len;
                self.bytes_since_rewind += len;
                self.carry = Some(Carry {
                    pcm,
                    offset: 0,
                    timecode,
                    generation,
                });
                self.flush_carry(shared, &mut data);
            }
            Ok(None) => {
                if data.looping && self.bytes_since_rewind > 0 {
                    data.pending = PendingCommand::Loop;
                } else {
                    debug!("Stream {} reached end of data", self.handle);
                    data.no_more_data = true;
                }
            }
            Err(e) => {
                warn!("Decode failed for stream {}, ending playback: {}", self.handle, e);
                data.no_more_data = true;
            }
        }
        data.check_finished(Instant::now());
    }

    /// Start the next pass: a seek to 0 that also counts the loop.
    fn rewind(&mut self, shared: &StreamShared, generation: u64) {
        let result = self.decoder.set_position(0.0);
        self.bytes_since_rewind = 0;

        let now = Instant::now();
        let mut data = shared.data.lock();
        if data.terminated || data.seek_generation != generation {
            return;
        }

        Self::reposition(&mut data, 0.0, now);
        match result {
            Ok(()) => {
                data.loop_count += 1;
                debug!("Stream {} looped ({} times)", self.handle, data.loop_count);
            }
            Err(e) => {
                warn!("Rewind failed for stream {}, ending playback: {}", self.handle, e);
                data.no_more_data = true;
            }
        }
    }

    /// Drop buffered audio and move all stream timing to `target`.
    fn reposition(data: &mut StreamData, target: f32, now: Instant) {
        data.buffer.reset();
        data.last_timecode = target;
        data.clock.set_at(target, now);
    }

    fn seek(&mut self, shared: &StreamShared, target: f32, generation: u64) {
        let result = self.decoder.set_position(target);
        self.bytes_since_rewind = 0;

        let now = Instant::now();
        let mut data = shared.data.lock();
        // A newer seek supersedes this one
        if data.terminated || data.seek_generation != generation {
            return;
        }

        Self::reposition(&mut data, target, now);
        data.no_more_data = match result {
            Ok(()) => false,
            Err(e) => {
                warn!("Seek failed for stream {}, ending playback: {}", self.handle, e);
                true
            }
        };

        if data.state == StreamState::Seeking {
            data.state = data.resume_state;
            if data.state == StreamState::Playing {
                data.clock.resume_at(now);
            }
        }
        debug!("Stream {} positioned at {:.3}s", self.handle, target);
    }
}
