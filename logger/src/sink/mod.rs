//! Output destinations for formatted lines.
//!
//! Every sink takes `&self` and guards its own state, so one sink can be
//! shared by several handlers behind an `Arc`.

mod file;
mod queue;
mod stream;

pub use file::{RotatingFileSink, TimedRotatingFileSink};
pub use queue::{AsyncDispatchQueue, LineDropped, DEFAULT_QUEUE_SIZE};
pub use stream::{OutputStream, StreamSink};

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// A destination for formatted log lines.
pub trait Sink: Send + Sync {
    /// Writes one line. The sink appends the line terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying flush fails.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Releases the sink's resources. Later writes may fail or be dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    fn close(&self) -> io::Result<()> {
        self.flush()
    }
}

/// Writes one line, reporting a panic inside the sink as an error.
pub(crate) fn write_guarded(sink: &dyn Sink, line: &str) -> io::Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.write_line(line)))
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "sink panicked")))
}

/// Flushes a sink, reporting a panic inside the sink as an error.
pub(crate) fn flush_guarded(sink: &dyn Sink) -> io::Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.flush()))
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "sink panicked")))
}

/// Collects lines in memory.
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to a handler.
///
/// # Example
///
/// ```
/// use jsonlog::sink::{InMemorySink, Sink};
///
/// let sink = InMemorySink::new();
/// sink.write_line("hello").unwrap();
/// assert_eq!(sink.lines(), vec!["hello".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl InMemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the collected lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the collected lines parsed as JSON, skipping non-JSON lines.
    #[must_use]
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Returns the number of collected lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards the collected lines.
    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Sink for InMemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}
