//! Configuration module for jsonlog.
//!
//! This module contains the construction-time configuration records for
//! sampling, metrics and file rotation.

pub mod error;
pub mod metrics;
pub mod rotation;
pub mod sampling;

pub use error::ConfigError;
pub use metrics::MetricsConfig;
pub use rotation::{canonical_interval, RotationConfig, RotationKind, ROTATION_INTERVALS};
pub use sampling::SamplingConfig;
