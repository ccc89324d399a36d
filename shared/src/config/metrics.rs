//! Metrics collection configuration.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Controls what the metrics collector tracks and how often it reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MetricsConfig {
    /// Master switch; a disabled collector records nothing and never reports.
    pub enabled: bool,
    /// Track per-level processing latency.
    pub track_performance: bool,
    /// Track total and per-level event counts.
    pub track_counts: bool,
    /// Track error counts per call site.
    pub track_errors: bool,
    /// Seconds between periodic reports.
    #[validate(range(min = 1, message = "Metrics interval must be at least one second"))]
    pub metrics_interval_secs: u64,
}

impl MetricsConfig {
    /// Returns the report interval as a `Duration`.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the report interval is zero.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_performance: true,
            track_counts: true,
            track_errors: true,
            metrics_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_metrics_config_rejects_zero_interval() {
        let config = MetricsConfig {
            metrics_interval_secs: 0,
            ..MetricsConfig::default()
        };
        assert!(config.validate_config().is_err());
    }
}
