//! Logging metrics collection and periodic reporting.
//!
//! [`MetricsCollector`] counts emitted events by level, tracks processing
//! latency and counts errors per call site. [`MetricsReporter`] snapshots a
//! collector on a fixed interval from a background thread.

use crate::clock::{self, Clock};
use crate::config::MetricsConfig;
use crate::models::{LogEvent, LogLevel};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Latency summary for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Mean processing time in seconds.
    pub avg: f64,
    /// Fastest processing time in seconds.
    pub min: f64,
    /// Slowest processing time in seconds.
    pub max: f64,
    /// Number of samples.
    pub count: usize,
}

impl LatencyStats {
    fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Precision loss is irrelevant at realistic sample counts.
        #[allow(clippy::cast_precision_loss)]
        let avg = sum / samples.len() as f64;
        Some(Self {
            avg,
            min,
            max,
            count: samples.len(),
        })
    }
}

/// A point-in-time copy of the collected metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Seconds since the collector was created.
    pub uptime_seconds: f64,
    /// Event counts keyed by level name, plus `total`.
    pub counts: BTreeMap<String, u64>,
    /// Error counts keyed by `module:function`.
    pub errors: BTreeMap<String, u64>,
    /// Latency statistics keyed by level name.
    pub performance: BTreeMap<String, LatencyStats>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Returns the count for a level.
    #[must_use]
    pub fn count(&self, level: LogLevel) -> u64 {
        self.counts.get(level.as_str()).copied().unwrap_or(0)
    }

    /// Returns the total event count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.get("total").copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    counts: HashMap<LogLevel, u64>,
    total: u64,
    errors: HashMap<String, u64>,
    performance: HashMap<LogLevel, Vec<f64>>,
}

/// Thread-safe metrics collector.
///
/// # Example
///
/// ```
/// use jsonlog_shared::config::MetricsConfig;
/// use jsonlog_shared::metrics::MetricsCollector;
/// use jsonlog_shared::models::{LogEvent, LogLevel};
/// use std::time::Duration;
///
/// let metrics = MetricsCollector::new(MetricsConfig::default());
/// metrics.record(&LogEvent::new(LogLevel::Info, "hello"), Duration::from_micros(40));
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.count(LogLevel::Info), 1);
/// assert_eq!(snapshot.total(), 1);
/// ```
pub struct MetricsCollector {
    config: MetricsConfig,
    clock: Arc<dyn Clock>,
    started: Instant,
    state: Mutex<MetricsState>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetricsCollector {
    /// Creates a collector driven by the system clock.
    #[must_use]
    pub fn new(config: MetricsConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    /// Creates a collector driven by the given clock.
    #[must_use]
    pub fn with_clock(config: MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            started: clock.now(),
            config,
            clock,
            state: Mutex::new(MetricsState::default()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Records one emitted event and how long it took to process.
    pub fn record(&self, event: &LogEvent, processing_time: Duration) {
        if !self.config.enabled {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if self.config.track_counts {
            *state.counts.entry(event.level).or_insert(0) += 1;
            state.total += 1;
        }

        if self.config.track_performance && !processing_time.is_zero() {
            state
                .performance
                .entry(event.level)
                .or_default()
                .push(processing_time.as_secs_f64());
        }

        if self.config.track_errors && event.level.is_error() {
            *state.errors.entry(event.call_site.key()).or_insert(0) += 1;
        }
    }

    /// Returns a copy of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mut counts: BTreeMap<String, u64> = state
            .counts
            .iter()
            .map(|(level, count)| (level.as_str().to_string(), *count))
            .collect();
        if state.total > 0 {
            counts.insert("total".to_string(), state.total);
        }

        let performance = state
            .performance
            .iter()
            .filter_map(|(level, samples)| {
                LatencyStats::from_samples(samples).map(|s| (level.as_str().to_string(), s))
            })
            .collect();

        MetricsSnapshot {
            uptime_seconds: self.clock.now().duration_since(self.started).as_secs_f64(),
            counts,
            errors: state
                .errors
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            performance,
            timestamp: Utc::now(),
        }
    }
}

/// Handle to a background thread that periodically snapshots a collector.
///
/// Dropping the handle stops the thread.
pub struct MetricsReporter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MetricsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsReporter")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl MetricsReporter {
    /// Starts reporting every `interval`, handing each snapshot to `emit`.
    ///
    /// `emit` must not feed back into `collector`, or every report would be
    /// counted by the next one.
    ///
    /// # Errors
    ///
    /// Returns an error if the reporter thread cannot be spawned.
    pub fn spawn<F>(
        collector: Arc<MetricsCollector>,
        interval: Duration,
        emit: F,
    ) -> std::io::Result<Self>
    where
        F: Fn(MetricsSnapshot) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("jsonlog-metrics".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => emit(collector.snapshot()),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        tracing::debug!(
            target: "jsonlog::metrics",
            interval_secs = interval.as_secs(),
            "Metrics reporter started"
        );

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the reporter, waiting at most `timeout` for the thread to exit.
    ///
    /// Returns true if the thread exited in time.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(target: "jsonlog::metrics", "Metrics reporter did not stop in time");
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let _ = handle.join();
        true
    }
}

impl Drop for MetricsReporter {
    fn drop(&mut self) {
        self.stop(Duration::from_secs(1));
    }
}
