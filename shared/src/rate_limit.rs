//! Burst-then-sample admission control.
//!
//! A [`RateLimiter`] lets an initial burst of events through unconditionally,
//! then admits events with probability `sample_rate` while fewer than
//! `max_logs_per_window` admissions fall inside the sliding window.
//!
//! One limiter guards one sink. Sharing an instance couples the quotas of
//! the streams that share it.

use crate::clock::{self, Clock};
use crate::config::SamplingConfig;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Why the limiter turned an event away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted from the burst allowance.
    Burst,
    /// Admitted by the sampling draw.
    Sampled,
    /// The window already holds `max_logs_per_window` admissions.
    WindowFull,
    /// The sampling draw failed.
    SampledOut,
}

impl Admission {
    /// Returns true if the event was admitted.
    #[must_use]
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Burst | Self::Sampled)
    }
}

#[derive(Debug)]
struct LimiterState {
    timestamps: VecDeque<Instant>,
    burst_count: u32,
    last_cleanup: Instant,
}

/// Sliding-window rate limiter with a burst allowance.
///
/// # Example
///
/// ```
/// use jsonlog_shared::config::SamplingConfig;
/// use jsonlog_shared::rate_limit::RateLimiter;
///
/// let limiter = RateLimiter::new(SamplingConfig::new(0.0, 3, 60, 100).unwrap());
/// assert!(limiter.should_admit());
/// assert!(limiter.should_admit());
/// assert!(limiter.should_admit());
/// assert!(!limiter.should_admit());
/// ```
pub struct RateLimiter {
    config: SamplingConfig,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter driven by the system clock.
    #[must_use]
    pub fn new(config: SamplingConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    /// Creates a limiter driven by the given clock.
    #[must_use]
    pub fn with_clock(config: SamplingConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            window: config.time_window(),
            config,
            clock,
            state: Mutex::new(LimiterState {
                timestamps: VecDeque::new(),
                burst_count: 0,
                last_cleanup: now,
            }),
        }
    }

    /// Returns the sampling configuration.
    #[must_use]
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Decides whether one candidate event may pass.
    #[must_use]
    pub fn should_admit(&self) -> bool {
        self.admit().is_admitted()
    }

    /// Decides whether one candidate event may pass, reporting why.
    ///
    /// The whole decision runs under one lock, so concurrent callers observe
    /// a consistent burst counter and window.
    pub fn admit(&self) -> Admission {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let window_start = now.checked_sub(self.window);

        if now.duration_since(state.last_cleanup) >= self.window {
            if let Some(start) = window_start {
                while state.timestamps.front().is_some_and(|ts| *ts <= start) {
                    state.timestamps.pop_front();
                }
            }
            if state.timestamps.is_empty() {
                state.burst_count = 0;
            }
            state.last_cleanup = now;
        }

        if state.burst_count < self.config.burst_limit {
            state.burst_count += 1;
            state.timestamps.push_back(now);
            return Admission::Burst;
        }

        let recent = match window_start {
            Some(start) => state.timestamps.iter().filter(|ts| **ts > start).count(),
            None => state.timestamps.len(),
        };
        if recent >= self.config.max_logs_per_window as usize {
            return Admission::WindowFull;
        }

        if rand::thread_rng().gen::<f64>() < self.config.sample_rate {
            state.timestamps.push_back(now);
            Admission::Sampled
        } else {
            Admission::SampledOut
        }
    }

    /// Returns the number of admissions currently recorded.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .timestamps
            .len()
    }
}
