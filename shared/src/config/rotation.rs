//! File rotation configuration.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Canonical interval names accepted by time-based rotation.
pub const ROTATION_INTERVALS: [&str; 5] = ["minute", "hour", "daily", "midnight", "never"];

/// Maps an interval name or its short alias to its canonical name.
///
/// Matching ignores ASCII case. `m`, `h` and `d` are accepted for `minute`,
/// `hour` and `daily`. Rollover always happens on a single calendar unit:
/// there is no interval multiplier, and second-based (`s`) and weekday
/// (`w0`..`w6`) rotation are not supported.
///
/// ```
/// use jsonlog_shared::config::canonical_interval;
///
/// assert_eq!(canonical_interval("H"), Some("hour"));
/// assert_eq!(canonical_interval("Midnight"), Some("midnight"));
/// assert_eq!(canonical_interval("W0"), None);
/// ```
#[must_use]
pub fn canonical_interval(when: &str) -> Option<&'static str> {
    let lowered = when.to_ascii_lowercase();
    let name = match lowered.as_str() {
        "m" => "minute",
        "h" => "hour",
        "d" => "daily",
        other => other,
    };
    ROTATION_INTERVALS.iter().copied().find(|known| *known == name)
}

/// How a log file is rolled over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum RotationKind {
    /// Roll over when the file would exceed `max_bytes`.
    Size,
    /// Roll over on a calendar boundary. See [`canonical_interval`] for the
    /// accepted names.
    Time {
        /// Interval name.
        when: String,
    },
}

/// Rotation thresholds and retention for file sinks.
///
/// # Example
///
/// ```
/// use jsonlog_shared::config::{RotationConfig, RotationKind};
///
/// let config = RotationConfig::default();
/// assert_eq!(config.max_bytes, 10 * 1024 * 1024);
/// assert_eq!(config.kind, RotationKind::Size);
/// assert!(config.validate_config().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RotationConfig {
    /// Size threshold in bytes for size-based rotation. Zero disables rollover.
    pub max_bytes: u64,
    /// Number of rotated files to retain.
    #[validate(range(max = 1000, message = "Backup count cannot exceed 1000"))]
    pub backup_count: u32,
    /// Rotation strategy.
    pub kind: RotationKind,
    /// Output encoding. Only `utf-8` is supported.
    pub encoding: String,
}

impl RotationConfig {
    /// Creates a size-based rotation configuration.
    #[must_use]
    pub fn size(max_bytes: u64, backup_count: u32) -> Self {
        Self {
            max_bytes,
            backup_count,
            ..Self::default()
        }
    }

    /// Creates a time-based rotation configuration.
    #[must_use]
    pub fn time(when: impl Into<String>, backup_count: u32) -> Self {
        Self {
            backup_count,
            kind: RotationKind::Time { when: when.into() },
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the backup count is out of range
    /// - the time interval name is unknown
    /// - the encoding is not UTF-8
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if let RotationKind::Time { when } = &self.kind {
            if canonical_interval(when).is_none() {
                return Err(ConfigError::InvalidRotationInterval(when.clone()));
            }
        }
        let encoding = self.encoding.to_ascii_lowercase().replace('_', "-");
        if encoding != "utf-8" && encoding != "utf8" {
            return Err(ConfigError::UnsupportedEncoding(self.encoding.clone()));
        }
        Ok(())
    }
}

impl Default for RotationConfig {
    /// Returns 10 MiB size-based rotation keeping five backups.
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            backup_count: 5,
            kind: RotationKind::Size,
            encoding: "utf-8".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_time_config() {
        let config = RotationConfig::time("midnight", 7);
        assert_eq!(
            config.kind,
            RotationKind::Time {
                when: "midnight".to_string()
            }
        );
        assert_eq!(config.backup_count, 7);
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_rotation_rejects_unknown_interval() {
        let config = RotationConfig::time("fortnight", 2);
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::InvalidRotationInterval(_))
        ));
    }

    #[test]
    fn test_rotation_accepts_short_aliases() {
        let aliases = [
            ("M", "minute"),
            ("h", "hour"),
            ("D", "daily"),
            ("MIDNIGHT", "midnight"),
        ];
        for (alias, canonical) in aliases {
            assert_eq!(canonical_interval(alias), Some(canonical));
            assert!(RotationConfig::time(alias, 1).validate_config().is_ok());
        }
        for unsupported in ["S", "W0", "w6", "2h"] {
            assert!(matches!(
                RotationConfig::time(unsupported, 1).validate_config(),
                Err(ConfigError::InvalidRotationInterval(name)) if name == unsupported
            ));
        }
    }

    #[test]
    fn test_rotation_rejects_non_utf8_encoding() {
        let config = RotationConfig {
            encoding: "latin-1".to_string(),
            ..RotationConfig::default()
        };
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_rotation_kind_serialization() {
        let json = serde_json::to_string(&RotationKind::Time {
            when: "hour".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"time","when":"hour"}"#);
    }
}
