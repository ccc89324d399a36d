//! Bounded queue with a single background writer.

use super::{flush_guarded, write_guarded, Sink};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::io;
use thiserror::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Default queue capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 10_000;

/// How long the worker waits for a line before checking the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long [`AsyncDispatchQueue::close`] waits for the worker.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Error returned by the queue's [`Sink::write_line`] when a line is dropped.
///
/// It is wrapped in an [`io::Error`] of kind [`io::ErrorKind::WouldBlock`];
/// use [`LineDropped::is_drop`] to recognise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Dispatch queue is full or closed")]
pub struct LineDropped;

impl LineDropped {
    /// Returns true if `err` reports a line dropped by a dispatch queue.
    #[must_use]
    pub fn is_drop(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::WouldBlock
            && err.get_ref().is_some_and(|inner| inner.is::<LineDropped>())
    }
}

impl From<LineDropped> for io::Error {
    fn from(dropped: LineDropped) -> Self {
        io::Error::new(io::ErrorKind::WouldBlock, dropped)
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Decouples callers from a slow sink.
///
/// [`submit`](Self::submit) never blocks: when the queue is full the line is
/// dropped and counted. Through the [`Sink`] trait a drop surfaces as a
/// [`LineDropped`] error. One worker thread forwards queued lines to the
/// inner sink in submission order and swallows its errors and panics.
///
/// # Example
///
/// ```
/// use jsonlog::sink::{AsyncDispatchQueue, InMemorySink};
/// use std::sync::Arc;
///
/// let memory = InMemorySink::new();
/// let queue = AsyncDispatchQueue::new(Arc::new(memory.clone()), 16).unwrap();
/// assert!(queue.submit("hello".to_string()));
/// queue.close();
/// assert_eq!(memory.lines(), vec!["hello".to_string()]);
/// ```
pub struct AsyncDispatchQueue {
    sender: Sender<String>,
    inner: Arc<dyn Sink>,
    stop: Arc<AtomicBool>,
    closed: AtomicBool,
    dropped: AtomicU64,
    write_errors: Arc<AtomicU64>,
    capacity: usize,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for AsyncDispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDispatchQueue")
            .field("capacity", &self.capacity)
            .field("queued", &self.sender.len())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

impl AsyncDispatchQueue {
    /// Wraps `inner` and starts the worker thread.
    ///
    /// A capacity of zero is raised to one.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new(inner: Arc<dyn Sink>, capacity: usize) -> io::Result<Self> {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<String>(capacity);
        let (done_tx, done_rx) = bounded::<()>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let write_errors = Arc::new(AtomicU64::new(0));

        let handle = {
            let inner = Arc::clone(&inner);
            let stop = Arc::clone(&stop);
            let write_errors = Arc::clone(&write_errors);
            std::thread::Builder::new()
                .name("jsonlog-dispatch".to_string())
                .spawn(move || {
                    drain(&receiver, inner.as_ref(), &stop, &write_errors);
                    let _ = done_tx.send(());
                })?
        };

        tracing::debug!(target: "jsonlog::sink", capacity, "Dispatch worker started");

        Ok(Self {
            sender,
            inner,
            stop,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            write_errors,
            capacity,
            worker: Mutex::new(Some(Worker {
                handle,
                done: done_rx,
            })),
        })
    }

    /// Enqueues a line without blocking.
    ///
    /// Returns false if the line was dropped because the queue is full or
    /// closed.
    pub fn submit(&self, line: String) -> bool {
        if self.stop.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.sender.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Returns the number of lines dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of inner sink writes that failed.
    #[must_use]
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of lines waiting to be written.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    /// Returns the queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stops the worker, waiting up to one second, then closes the inner sink.
    ///
    /// Lines still queued when the wait times out are lost. Calling `close`
    /// more than once has no further effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop.store(true, Ordering::Release);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            match worker.done.recv_timeout(CLOSE_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = worker.handle.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        target: "jsonlog::sink",
                        queued = self.sender.len(),
                        "Dispatch worker did not stop in time"
                    );
                }
            }
        }

        if let Err(err) = self.inner.close() {
            tracing::warn!(target: "jsonlog::sink", error = %err, "Failed to close sink");
        }
    }
}

fn drain(receiver: &Receiver<String>, sink: &dyn Sink, stop: &AtomicBool, write_errors: &AtomicU64) {
    loop {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                if let Err(err) = write_guarded(sink, &line) {
                    write_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "jsonlog::sink", error = %err, "Dropped log line");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let _ = flush_guarded(sink);
}

impl Sink for AsyncDispatchQueue {
    fn write_line(&self, line: &str) -> io::Result<()> {
        if self.submit(line.to_string()) {
            Ok(())
        } else {
            Err(LineDropped.into())
        }
    }

    fn close(&self) -> io::Result<()> {
        AsyncDispatchQueue::close(self);
        Ok(())
    }
}

impl Drop for AsyncDispatchQueue {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemorySink;
    use std::time::Instant;

    /// A sink that blocks every write until released.
    struct GatedSink {
        gate: Receiver<()>,
        inner: InMemorySink,
    }

    impl Sink for GatedSink {
        fn write_line(&self, line: &str) -> io::Result<()> {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            self.inner.write_line(line)
        }
    }

    struct FailingSink;

    /// Panics on the first write, then behaves.
    struct PanicOnceSink {
        panicked: AtomicBool,
        inner: InMemorySink,
    }

    impl Sink for PanicOnceSink {
        fn write_line(&self, line: &str) -> io::Result<()> {
            assert!(self.panicked.swap(true, Ordering::SeqCst), "sink blew up");
            self.inner.write_line(line)
        }
    }

    impl Sink for FailingSink {
        fn write_line(&self, _line: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_preserves_submission_order() {
        let memory = InMemorySink::new();
        let queue = AsyncDispatchQueue::new(Arc::new(memory.clone()), 100).unwrap();
        for i in 0..50 {
            assert!(queue.submit(format!("line-{i}")));
        }
        queue.close();

        let expected: Vec<String> = (0..50).map(|i| format!("line-{i}")).collect();
        assert_eq!(memory.lines(), expected);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_overflow_drops_without_blocking() {
        let (release, gate) = crossbeam_channel::unbounded();
        let memory = InMemorySink::new();
        let sink = GatedSink {
            gate,
            inner: memory.clone(),
        };
        let queue = AsyncDispatchQueue::new(Arc::new(sink), 4).unwrap();

        let started = Instant::now();
        let accepted = (0..1000).filter(|i| queue.submit(format!("{i}"))).count();
        assert!(started.elapsed() < Duration::from_millis(500));

        // At most the queue plus the one line held by the worker.
        assert!(accepted <= 5, "accepted {accepted}");
        assert_eq!(queue.dropped(), (1000 - accepted) as u64);

        for _ in 0..accepted {
            release.send(()).unwrap();
        }
        queue.close();
        assert_eq!(memory.len(), accepted);
    }

    #[test]
    fn test_sink_errors_are_swallowed() {
        let queue = AsyncDispatchQueue::new(Arc::new(FailingSink), 8).unwrap();
        assert!(queue.submit("a".to_string()));
        assert!(queue.submit("b".to_string()));
        queue.close();
        assert_eq!(queue.write_errors(), 2);
    }

    #[test]
    fn test_worker_survives_panicking_sink() {
        let memory = InMemorySink::new();
        let sink = PanicOnceSink {
            panicked: AtomicBool::new(false),
            inner: memory.clone(),
        };
        let queue = AsyncDispatchQueue::new(Arc::new(sink), 16).unwrap();
        assert!(queue.submit("boom".to_string()));
        for i in 0..5 {
            assert!(queue.submit(format!("after-{i}")));
        }
        queue.close();

        let expected: Vec<String> = (0..5).map(|i| format!("after-{i}")).collect();
        assert_eq!(memory.lines(), expected);
        assert_eq!(queue.write_errors(), 1);
    }

    #[test]
    fn test_sink_write_reports_dropped_line() {
        let queue = AsyncDispatchQueue::new(Arc::new(InMemorySink::new()), 8).unwrap();
        assert!(Sink::write_line(&queue, "kept").is_ok());
        queue.close();

        let err = Sink::write_line(&queue, "late").unwrap_err();
        assert!(LineDropped::is_drop(&err));
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert!(!LineDropped::is_drop(&io::Error::new(io::ErrorKind::WouldBlock, "other")));
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_submit_after_close_is_dropped() {
        let memory = InMemorySink::new();
        let queue = AsyncDispatchQueue::new(Arc::new(memory.clone()), 8).unwrap();
        queue.close();
        assert!(!queue.submit("late".to_string()));
        assert_eq!(queue.dropped(), 1);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_close_is_bounded_with_stuck_sink() {
        let (_release, gate) = crossbeam_channel::unbounded::<()>();
        let sink = GatedSink {
            gate,
            inner: InMemorySink::new(),
        };
        let queue = AsyncDispatchQueue::new(Arc::new(sink), 8).unwrap();
        queue.submit("stuck".to_string());

        let started = Instant::now();
        queue.close();
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
