//! The per-sink pipeline.
//!
//! A [`Handler`] stamps the correlation id on an event, then runs it through
//! validation, rate limiting, formatting and metrics before writing it to
//! its sink. Every stage that can refuse an event reports why through
//! [`HandleOutcome`]; nothing is returned as an error to the caller.

use crate::sink::{write_guarded, LineDropped, Sink};
use jsonlog_shared::correlation;
use jsonlog_shared::format::Formatter;
use jsonlog_shared::metrics::MetricsCollector;
use jsonlog_shared::models::LogEvent;
use jsonlog_shared::rate_limit::{Admission, RateLimiter};
use jsonlog_shared::schema::{LogValidator, ValidationError};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What happened to one event in one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Formatted and handed to the sink.
    Emitted,
    /// Rejected by the schema.
    Rejected(ValidationError),
    /// Turned away by the rate limiter.
    RateLimited(Admission),
    /// The sink failed or panicked; the event is lost.
    WriteFailed,
    /// The sink's dispatch queue was full or closed; the event is lost.
    Dropped,
}

impl HandleOutcome {
    /// Returns true if the event reached the sink.
    #[must_use]
    pub fn is_emitted(&self) -> bool {
        matches!(self, Self::Emitted)
    }
}

/// Counters for one handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStats {
    /// Events written to the sink.
    pub emitted: u64,
    /// Events rejected by the schema.
    pub rejected: u64,
    /// Events turned away by the rate limiter.
    pub rate_limited: u64,
    /// Events lost to sink failures.
    pub write_errors: u64,
    /// Events dropped by a full or closed dispatch queue.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    emitted: AtomicU64,
    rejected: AtomicU64,
    rate_limited: AtomicU64,
    write_errors: AtomicU64,
    dropped: AtomicU64,
}

/// Admission filters, formatter, metrics and sink for one destination.
///
/// # Example
///
/// ```
/// use jsonlog::handler::Handler;
/// use jsonlog::sink::InMemorySink;
/// use jsonlog_shared::format::{FormatterConfig, StructuredFormatter};
/// use jsonlog_shared::models::{LogEvent, LogLevel};
/// use jsonlog_shared::schema::{LogSchema, LogValidator};
/// use std::sync::Arc;
///
/// let memory = InMemorySink::new();
/// let handler = Handler::new(
///     Arc::new(StructuredFormatter::new(FormatterConfig::default()).unwrap()),
///     Arc::new(memory.clone()),
/// )
/// .with_validator(LogValidator::new(LogSchema::new().require("user_id")));
///
/// assert!(handler.handle(&LogEvent::new(LogLevel::Info, "ok").with_attribute("user_id", "u1")).is_emitted());
/// assert!(!handler.handle(&LogEvent::new(LogLevel::Info, "anonymous")).is_emitted());
/// assert_eq!(memory.len(), 1);
/// ```
pub struct Handler {
    formatter: Arc<dyn Formatter>,
    sink: Arc<dyn Sink>,
    validator: Option<LogValidator>,
    limiter: Option<RateLimiter>,
    metrics: Option<Arc<MetricsCollector>>,
    inject_correlation: bool,
    counters: Counters,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("validator", &self.validator)
            .field("limiter", &self.limiter)
            .field("metrics", &self.metrics.is_some())
            .field("inject_correlation", &self.inject_correlation)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// Creates a handler with no admission filters.
    #[must_use]
    pub fn new(formatter: Arc<dyn Formatter>, sink: Arc<dyn Sink>) -> Self {
        Self {
            formatter,
            sink,
            validator: None,
            limiter: None,
            metrics: None,
            inject_correlation: false,
            counters: Counters::default(),
        }
    }

    /// Rejects events that do not satisfy the validator's schema.
    #[must_use]
    pub fn with_validator(mut self, validator: LogValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Admits events through a rate limiter owned by this handler.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Records emitted events in a collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Stamps the current correlation id on events that carry none.
    #[must_use]
    pub fn with_correlation(mut self, enabled: bool) -> Self {
        self.inject_correlation = enabled;
        self
    }

    /// Returns the metrics collector, if any.
    #[must_use]
    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Returns the sink.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Runs one event through the pipeline.
    ///
    /// The correlation id is stamped before validation, so a schema may
    /// require `correlation_id`. A panicking sink counts as a write failure.
    pub fn handle(&self, event: &LogEvent) -> HandleOutcome {
        let started = Instant::now();
        let event = self.annotate(event);

        if let Some(validator) = &self.validator {
            if let Err(reason) = validator.check(&event) {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return HandleOutcome::Rejected(reason);
            }
        }

        if let Some(limiter) = &self.limiter {
            let admission = limiter.admit();
            if !admission.is_admitted() {
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                return HandleOutcome::RateLimited(admission);
            }
        }

        let line = self.formatter.format(&event);

        if let Some(metrics) = &self.metrics {
            metrics.record(&event, started.elapsed());
        }

        match write_guarded(self.sink.as_ref(), &line) {
            Ok(()) => {
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                HandleOutcome::Emitted
            }
            Err(err) if LineDropped::is_drop(&err) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                HandleOutcome::Dropped
            }
            Err(err) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "jsonlog::handler", error = %err, "Failed to write log line");
                HandleOutcome::WriteFailed
            }
        }
    }

    fn annotate<'a>(&self, event: &'a LogEvent) -> Cow<'a, LogEvent> {
        if !self.inject_correlation || event.correlation_id.is_some() {
            return Cow::Borrowed(event);
        }
        match correlation::current() {
            Some(id) => Cow::Owned(event.clone().with_correlation_id(id)),
            None => Cow::Borrowed(event),
        }
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Flushes and closes the sink.
    pub fn close(&self) {
        if let Err(err) = self.sink.close() {
            tracing::warn!(target: "jsonlog::handler", error = %err, "Failed to close sink");
        }
    }
}
