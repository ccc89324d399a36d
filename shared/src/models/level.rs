//! Log severity levels.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Log severity level.
///
/// Levels are totally ordered: `Debug < Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Detailed diagnostic information.
    Debug,
    /// Informational messages.
    Info,
    /// Something unexpected that the application recovered from.
    Warning,
    /// An operation failed.
    Error,
    /// The application may not be able to continue.
    Critical,
}

/// Error returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl LogLevel {
    /// All levels in ascending order of severity.
    pub const ALL: [LogLevel; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Returns the canonical upper-case name of the level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Returns true for `Error` and `Critical`.
    #[must_use]
    pub fn is_error(self) -> bool {
        self >= Self::Error
    }

    /// Parses a level name, falling back to `Info` for unknown names.
    ///
    /// # Example
    ///
    /// ```
    /// use jsonlog_shared::models::LogLevel;
    ///
    /// assert_eq!(LogLevel::parse_or_info("warn"), LogLevel::Warning);
    /// assert_eq!(LogLevel::parse_or_info("verbose"), LogLevel::Info);
    /// ```
    #[must_use]
    pub fn parse_or_info(name: &str) -> Self {
        name.parse().unwrap_or(Self::Info)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
