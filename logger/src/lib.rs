//! jsonlog
//!
//! Structured JSON logging with schema validation, sampling, metrics,
//! correlation ids, file rotation and non-blocking dispatch.
//!
//! # Architecture
//!
//! A [`LoggerRegistry`] owns a tree of named [`Logger`]s. Each logger holds
//! [`Handler`] chains built from a [`LoggerConfig`]:
//! - correlation id stamping
//! - validation against an optional schema
//! - burst-then-sample rate limiting
//! - JSON or development formatting
//! - metrics collection with periodic reports
//! - a stream, rotating file or background dispatch queue sink
//!
//! Libraries instrumented with `tracing` are routed into the same loggers by
//! [`LoggerRegistry::install_tracing_bridge`].
//!
//! # Example
//!
//! ```
//! use jsonlog::{FormatChoice, LoggerConfig, LoggerRegistry};
//! use jsonlog::jsonlog_shared::models::{LogEvent, LogLevel};
//! use jsonlog::sink::InMemorySink;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let registry = LoggerRegistry::with_env(HashMap::new());
//! let sink = InMemorySink::new();
//! let config = LoggerConfig::default().with_format(FormatChoice::Json);
//!
//! let logger = registry
//!     .attach_with_sink("payments", &config, Arc::new(sink.clone()))
//!     .unwrap();
//! logger.log(LogEvent::new(LogLevel::Info, "Charge accepted").with_attribute("user_id", "42"));
//!
//! let line = &sink.json_lines()[0];
//! assert_eq!(line["module"], "payments");
//! assert_eq!(line["user_id"], "42");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod components;
pub mod config;
mod error;
pub mod handler;
mod logger;
mod registry;
pub mod sink;

pub use bridge::StructuredLayer;
pub use components::{ComponentConfig, ComponentGroup, ComponentSettings};
pub use config::{Environment, FormatChoice, LoggerConfig, ProcessEnv};
pub use error::SetupError;
pub use handler::{HandleOutcome, Handler, HandlerStats};
pub use logger::{LevelFilter, Logger, ROOT_LOGGER};
pub use registry::{LoggerRegistry, METRICS_LOGGER};

/// Re-export of the pipeline building blocks.
pub use jsonlog_shared;
