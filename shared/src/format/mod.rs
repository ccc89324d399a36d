//! Event formatters.
//!
//! - [`StructuredFormatter`]: one JSON object per line, for production
//! - [`DevFormatter`]: templated human-readable lines, for development

use crate::config::ConfigError;
use crate::models::LogEvent;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;

pub mod dev;
pub mod json;
pub mod serialize;

pub use dev::{validate_template, DevFormatter, DEFAULT_DEV_TEMPLATE};
pub use json::{FormatterConfig, StructuredFormatter, DEFAULT_CUSTOM_FIELDS, RESERVED_KEYS};
pub use serialize::{SerializeError, SerializerFn, SerializerRegistry};

/// Turns an event into one output line.
///
/// Implementations never fail: unrepresentable values degrade to strings.
pub trait Formatter: Send + Sync {
    /// Formats one event, without a trailing newline.
    fn format(&self, event: &LogEvent) -> String;
}

/// Checks a strftime pattern.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeFormat`] if chrono cannot parse it.
pub fn validate_time_format(pattern: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimeFormat(pattern.to_string()));
    }
    Ok(())
}

/// Formats a timestamp with an optional strftime pattern.
///
/// Without a pattern, or if formatting fails, RFC 3339 with milliseconds is
/// used.
#[must_use]
pub fn format_time(timestamp: DateTime<Utc>, pattern: Option<&str>) -> String {
    let iso = || timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    let Some(pattern) = pattern else {
        return iso();
    };

    let mut out = String::new();
    match write!(out, "{}", timestamp.format_with_items(StrftimeItems::new(pattern))) {
        Ok(()) => out,
        Err(_) => iso(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_time_format() {
        assert!(validate_time_format("%Y-%m-%d %H:%M:%S%.3f").is_ok());
        assert!(validate_time_format("%Q").is_err());
    }

    #[test]
    fn test_format_time_falls_back_to_iso() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(format_time(at, None), "2024-06-01T00:00:00.000Z");
        assert_eq!(format_time(at, Some("%Q")), "2024-06-01T00:00:00.000Z");
        assert_eq!(format_time(at, Some("%d.%m.%Y")), "01.06.2024");
    }
}
