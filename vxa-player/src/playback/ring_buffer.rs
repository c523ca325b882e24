//! Byte ring buffer between decode worker and playback callback
//!
//! Fixed-capacity FIFO of PCM bytes backed by `ringbuf`'s heap ring. One
//! instance belongs to exactly one stream and lives inside that stream's
//! mutex: it is not synchronized on its own, which keeps `bytes_not_read`
//! consistent with the other timing fields read under the same lock.
//!
//! ```text
//! DecodeWorker ── write() ──> RingBuffer ── read() ──> PcmReader::fill (sink callback)
//! ```

use ringbuf::{traits::*, HeapRb};
use thiserror::Error;
use tracing::debug;

/// Error returned when a write does not fit into the vacant space
///
/// Nothing is written in that case; callers check `vacant()` first.
#[derive(Debug, Error)]
#[error("Buffer full: cannot write {requested} bytes (capacity: {capacity}, occupied: {occupied})")]
pub struct BufferFullError {
    pub requested: usize,
    pub capacity: usize,
    pub occupied: usize,
}

/// Fixed-capacity circular byte buffer
pub struct RingBuffer {
    buffer: HeapRb<u8>,
    capacity: usize,
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("bytes_not_read", &self.bytes_not_read())
            .finish()
    }
}

impl RingBuffer {
    /// Create an empty ring buffer holding at most `capacity` bytes
    ///
    /// A zero capacity is bumped to one byte (`HeapRb` requires a non-zero size).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating ring buffer with capacity: {} bytes", capacity);
        Self {
            buffer: HeapRb::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written but not yet read, always within `[0, capacity]`
    pub fn bytes_not_read(&self) -> usize {
        self.buffer.occupied_len()
    }

    /// Space available for writing
    pub fn vacant(&self) -> usize {
        self.buffer.vacant_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append `data` in full, or nothing if it does not fit.
    pub fn write(&mut self, data: &[u8]) -> Result<(), BufferFullError> {
        if data.len() > self.vacant() {
            return Err(BufferFullError {
                requested: data.len(),
                capacity: self.capacity,
                occupied: self.bytes_not_read(),
            });
        }
        let written = self.buffer.push_slice(data);
        debug_assert_eq!(written, data.len());
        Ok(())
    }

    /// Move up to `out.len()` bytes into `out`, returning the count.
    ///
    /// Reading an empty buffer is a no-op returning 0; `out` is left as is.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.buffer.pop_slice(out)
    }

    /// Discard all buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
