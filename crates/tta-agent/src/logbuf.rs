//! In-memory capture of the agent's own log output
//!
//! Keeps the first megabyte of logs so `/logs` can serve them even when the
//! host's log streaming isn't working yet. Later output is dropped; at that
//! point the regular log pipeline is assumed to be up.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Capacity of the capture buffer
pub const LOG_BUFFER_LIMIT: usize = 1 << 20;

/// Bounded, shareable log sink.
///
/// Clones share the same buffer. Writes past the limit are discarded but
/// still reported as fully written, so a logger never sees an error.
#[derive(Clone)]
pub struct LogBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
    limit: usize,
}

impl LogBuffer {
    /// Create a buffer capped at `LOG_BUFFER_LIMIT`
    pub fn new() -> Self {
        Self::with_limit(LOG_BUFFER_LIMIT)
    }

    /// Create a buffer with a custom cap
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::new())),
            limit,
        }
    }

    /// Copy of everything captured so far
    pub fn contents(&self) -> Vec<u8> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been captured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.limit.saturating_sub(buf.len());
        let take = room.min(data.len());
        buf.extend_from_slice(&data[..take]);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
