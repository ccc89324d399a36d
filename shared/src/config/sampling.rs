//! Sampling configuration for rate-limited sinks.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError, ValidationErrors};

/// Parameters of the burst-then-sample rate limiter.
///
/// # Example
///
/// ```
/// use jsonlog_shared::config::SamplingConfig;
///
/// let config = SamplingConfig::new(0.5, 10, 60, 1000).unwrap();
/// assert_eq!(config.time_window().as_secs(), 60);
///
/// assert!(SamplingConfig::new(1.5, 10, 60, 1000).is_err());
/// assert!(SamplingConfig::new(0.5, 10, 0, 1000).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SamplingConfig {
    /// Probability in `[0, 1]` of admitting an event once the burst is spent.
    #[validate(range(min = 0.0, max = 1.0, message = "Sample rate must be within [0, 1]"))]
    pub sample_rate: f64,

    /// Number of events admitted unconditionally before sampling applies.
    pub burst_limit: u32,

    /// Length of the sliding window in seconds.
    #[validate(range(min = 1, message = "Time window must be at least one second"))]
    pub time_window_secs: u64,

    /// Maximum number of sampled admissions inside one window.
    pub max_logs_per_window: u32,
}

impl SamplingConfig {
    /// Creates a validated sampling configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is outside `[0, 1]` or the window is zero.
    pub fn new(
        sample_rate: f64,
        burst_limit: u32,
        time_window_secs: u64,
        max_logs_per_window: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            sample_rate,
            burst_limit,
            time_window_secs,
            max_logs_per_window,
        };
        config.validate_config()?;
        Ok(config)
    }

    /// Returns the window as a `Duration`.
    #[must_use]
    pub fn time_window(&self) -> Duration {
        Duration::from_secs(self.time_window_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is out of range.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        // NaN slips through range comparisons.
        if self.sample_rate.is_nan() {
            let mut errors = ValidationErrors::new();
            errors.add("sample_rate", ValidationError::new("nan"));
            return Err(ConfigError::Invalid(errors));
        }
        Ok(())
    }
}

impl Default for SamplingConfig {
    /// Returns the default sampling configuration:
    /// - rate 1.0
    /// - burst of 100
    /// - 60 second window
    /// - 1000 events per window
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            burst_limit: 100,
            time_window_secs: 60,
            max_logs_per_window: 1000,
        }
    }
}
