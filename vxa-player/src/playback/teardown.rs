//! Asynchronous stream teardown
//!
//! Closing a device can block (driver shutdown, joining the callback thread),
//! so `close` only marks a stream Closing and queues it here. A single
//! teardown thread stops the sink, joins the decode worker and finally
//! releases the handle.

use crate::error::Result;
use crate::playback::handle::HandleTable;
use crate::playback::stream::Stream;
use parking_lot::{Condvar, Mutex};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) type StreamTable = Arc<Mutex<HandleTable<Arc<Stream>>>>;

/// Number of queued or running teardowns
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn end(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

pub(crate) struct TeardownQueue {
    table: StreamTable,
    sender: Mutex<Option<mpsc::Sender<Arc<Stream>>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<InFlight>,
}

fn finish(table: &StreamTable, stream: &Stream) {
    stream.teardown();
    table.lock().release(stream.handle());
    info!("Closed stream {} ({})", stream.handle(), stream.path().display());
}

impl TeardownQueue {
    pub fn start(table: StreamTable) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Arc<Stream>>();
        let in_flight = Arc::new(InFlight::default());

        let thread_table = Arc::clone(&table);
        let thread_in_flight = Arc::clone(&in_flight);
        let thread = std::thread::Builder::new()
            .name("vxa-teardown".to_string())
            .spawn(move || {
                for stream in receiver {
                    finish(&thread_table, &stream);
                    thread_in_flight.end();
                }
                debug!("Teardown thread exiting");
            })?;

        Ok(Self {
            table,
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
            in_flight,
        })
    }

    /// Queue a stream (already marked Closing) for teardown.
    pub fn submit(&self, stream: Arc<Stream>) {
        self.in_flight.begin();
        let rejected = match self.sender.lock().as_ref() {
            Some(sender) => sender.send(stream).err().map(|e| e.0),
            None => Some(stream),
        };

        // Queue gone: tear down on the caller's thread
        if let Some(stream) = rejected {
            warn!("Teardown thread unavailable, closing stream {} inline", stream.handle());
            finish(&self.table, &stream);
            self.in_flight.end();
        }
    }

    /// Block until every submitted teardown has completed.
    pub fn wait_idle(&self) {
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            self.in_flight.idle.wait(&mut count);
        }
    }

    /// Drain the queue and stop the teardown thread.
    pub fn stop(&self) {
        drop(self.sender.lock().take());
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Teardown thread panicked");
            }
        }
    }
}
