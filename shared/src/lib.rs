//! jsonlog Shared Library
//!
//! This crate contains the log event model and the pieces of the logging
//! pipeline that do not touch a sink: validation, sampling, metrics,
//! correlation ids and formatting.
//!
//! # Modules
//!
//! - [`models`] - Log events, levels and attribute values
//! - [`config`] - Sampling, metrics and rotation configuration
//! - [`schema`] - Declarative event validation
//! - [`rate_limit`] - Burst-then-sample admission control
//! - [`metrics`] - Per-level counters, latency and error-site tracking
//! - [`correlation`] - Execution-context-local correlation ids
//! - [`format`] - JSON and development formatters
//! - [`clock`] - Monotonic clock abstraction
//!
//! # Example
//!
//! ```
//! use jsonlog_shared::format::{Formatter, FormatterConfig, StructuredFormatter};
//! use jsonlog_shared::models::{LogEvent, LogLevel};
//! use jsonlog_shared::schema::{is_valid, LogSchema};
//!
//! let schema = LogSchema::new().require("user_id");
//! let event = LogEvent::new(LogLevel::Info, "User logged in")
//!     .with_logger_name("auth")
//!     .with_attribute("user_id", "12345");
//!
//! assert!(is_valid(&event, &schema));
//!
//! let formatter = StructuredFormatter::new(FormatterConfig::default()).unwrap();
//! assert!(formatter.format(&event).contains(r#""user_id":"12345""#));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod correlation;
pub mod format;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod schema;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use uuid;
pub use validator;
