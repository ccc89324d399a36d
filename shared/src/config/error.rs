//! Configuration errors.

use thiserror::Error;

/// Errors raised when a configuration record violates its invariants.
///
/// These indicate programming errors and are reported at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed declarative validation.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    /// The time format pattern is not a valid strftime pattern.
    #[error("Invalid time format pattern: {0}")]
    InvalidTimeFormat(String),

    /// The development template references an unknown placeholder.
    #[error("Invalid development template: {0}")]
    InvalidTemplate(String),

    /// A custom field or rename target is a key the formatter always writes.
    #[error("Field collides with reserved key: {0}")]
    ReservedKey(String),

    /// Time-based rotation uses an unsupported interval name.
    #[error("Unsupported rotation interval: {0}")]
    InvalidRotationInterval(String),

    /// Only UTF-8 output encoding is supported.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}
