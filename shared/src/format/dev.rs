//! Human-readable formatting for local development.

use super::json::module_name;
use super::{format_time, validate_time_format, Formatter};
use crate::config::ConfigError;
use crate::models::LogEvent;

/// Default development template.
pub const DEFAULT_DEV_TEMPLATE: &str = "{time} [{level}] {name}: {message}";

/// Time pattern used when none is configured.
pub const DEFAULT_DEV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PLACEHOLDERS: [&str; 4] = ["time", "level", "name", "message"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Time,
    Level,
    Name,
    Message,
}

/// Formats events with a `{placeholder}` template.
///
/// Supported placeholders are `{time}`, `{level}`, `{name}` and `{message}`.
/// Exception text follows on the next lines.
///
/// # Example
///
/// ```
/// use jsonlog_shared::format::{DevFormatter, Formatter};
/// use jsonlog_shared::models::{LogEvent, LogLevel};
///
/// let formatter = DevFormatter::new("[{level}] {name}: {message}", None).unwrap();
/// let event = LogEvent::new(LogLevel::Warning, "disk at {}%")
///     .with_arg(91)
///     .with_logger_name("agent");
/// assert_eq!(formatter.format(&event), "[WARNING] agent: disk at 91%");
/// ```
#[derive(Debug, Clone)]
pub struct DevFormatter {
    pieces: Vec<Piece>,
    time_format: String,
}

impl Default for DevFormatter {
    fn default() -> Self {
        Self {
            pieces: parse_template(DEFAULT_DEV_TEMPLATE).unwrap_or_default(),
            time_format: DEFAULT_DEV_TIME_FORMAT.to_string(),
        }
    }
}

impl DevFormatter {
    /// Creates a formatter from a template and optional strftime pattern.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or unterminated placeholders and for
    /// invalid time patterns.
    pub fn new(template: &str, time_format: Option<&str>) -> Result<Self, ConfigError> {
        let time_format = time_format.unwrap_or(DEFAULT_DEV_TIME_FORMAT);
        validate_time_format(time_format)?;
        Ok(Self {
            pieces: parse_template(template)?,
            time_format: time_format.to_string(),
        })
    }
}

impl Formatter for DevFormatter {
    fn format(&self, event: &LogEvent) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Time => out.push_str(&format_time(event.timestamp, Some(&self.time_format))),
                Piece::Level => out.push_str(event.level.as_str()),
                Piece::Name => out.push_str(&module_name(event)),
                Piece::Message => out.push_str(&event.rendered_message()),
            }
        }
        if let Some(exception) = &event.exception {
            out.push('\n');
            out.push_str(&exception.render());
        }
        out
    }
}

/// Checks that a template only uses known placeholders.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTemplate`] on the first bad placeholder.
pub fn validate_template(template: &str) -> Result<(), ConfigError> {
    parse_template(template).map(|_| ())
}

fn parse_template(template: &str) -> Result<Vec<Piece>, ConfigError> {
    let mut pieces = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            pieces.push(Piece::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| ConfigError::InvalidTemplate(format!("unterminated placeholder in `{template}`")))?;
        pieces.push(match &after[..close] {
            "time" => Piece::Time,
            "level" => Piece::Level,
            "name" => Piece::Name,
            "message" => Piece::Message,
            other => {
                return Err(ConfigError::InvalidTemplate(format!(
                    "unknown placeholder `{{{other}}}`, expected one of {PLACEHOLDERS:?}"
                )))
            }
        });
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest.to_string()));
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExceptionInfo, LogLevel};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_default_template() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();
        let event = LogEvent::new(LogLevel::Info, "ready")
            .with_logger_name("api")
            .with_timestamp(at);
        assert_eq!(
            DevFormatter::default().format(&event),
            "2024-03-09 08:07:06 [INFO] api: ready"
        );
    }

    #[test]
    fn test_exception_on_following_line() {
        let formatter = DevFormatter::new("{level} {message}", None).unwrap();
        let event = LogEvent::new(LogLevel::Error, "boom")
            .with_exception(ExceptionInfo::new("IoError", "closed").with_trace("Caused by: eof"));
        assert_eq!(
            formatter.format(&event),
            "ERROR boom\nIoError: closed\nCaused by: eof"
        );
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        assert!(matches!(
            DevFormatter::new("{time} {thread}", None),
            Err(ConfigError::InvalidTemplate(_))
        ));
        assert!(validate_template("{message").is_err());
        assert!(validate_template("plain text").is_ok());
    }
}
