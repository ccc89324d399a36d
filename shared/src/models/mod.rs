//! Data models for jsonlog.
//!
//! This module contains the log event, its severity levels and attribute values.

pub mod event;
pub mod level;
pub mod value;

pub use event::{CallSite, ExceptionInfo, LogEvent, CORRELATION_ID_KEY};
pub use level::{LogLevel, ParseLevelError};
pub use value::{FieldType, FieldValue};
