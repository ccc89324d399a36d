//! Log event model.
//!
//! Defines the `LogEvent` structure produced at each call site and consumed by
//! the formatting pipeline.

use super::{FieldValue, LogLevel};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Source location of the code that emitted an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Module path of the caller.
    pub module: String,
    /// Function name of the caller, or its line number when the function is
    /// not known.
    pub function: String,
}

impl CallSite {
    /// Creates a call site from a module path and function name.
    #[must_use]
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
        }
    }

    /// Captures the source file and line of the caller.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self::new(location.file(), location.line().to_string())
    }

    /// Returns the `module:function` key used for error-site counting.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.module, self.function)
    }
}

/// A captured error together with its rendered trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Type name of the error.
    pub type_name: String,
    /// The error's display message.
    pub message: String,
    /// Rendered cause chain and/or backtrace.
    pub trace: Option<String>,
}

impl ExceptionInfo {
    /// Creates exception info from explicit parts.
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            trace: None,
        }
    }

    /// Attaches a rendered trace.
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Captures an error and its `source()` chain.
    ///
    /// # Example
    ///
    /// ```
    /// use jsonlog_shared::models::ExceptionInfo;
    ///
    /// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    /// let info = ExceptionInfo::from_error(&err);
    /// assert_eq!(info.message, "disk full");
    /// ```
    #[must_use]
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut chain = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(chain, "Caused by: {cause}");
            source = cause.source();
        }

        Self {
            type_name: short_type_name(std::any::type_name::<E>()).to_string(),
            message: err.to_string(),
            trace: if chain.is_empty() {
                None
            } else {
                Some(chain.trim_end().to_string())
            },
        }
    }

    /// Renders the exception as a single string.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.trace {
            Some(trace) => format!("{}: {}\n{}", self.type_name, self.message, trace),
            None => format!("{}: {}", self.type_name, self.message),
        }
    }
}

/// Last path segment of a type name, without generic parameters.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().filter(|name| !name.is_empty()).unwrap_or("Error")
}

/// A single log event.
///
/// Events are built once at the call site and are not mutated by the
/// pipeline; annotation (correlation id, logger name) produces a new value.
///
/// # Example
///
/// ```
/// use jsonlog_shared::models::{LogEvent, LogLevel};
///
/// let event = LogEvent::new(LogLevel::Info, "User {} logged in")
///     .with_arg("ada")
///     .with_attribute("user_id", "u1");
///
/// assert_eq!(event.rendered_message(), "User ada logged in");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Name of the logger the event was emitted on.
    pub logger_name: String,
    /// Message with `{}` placeholders.
    pub message_template: String,
    /// Positional arguments substituted into the template.
    pub args: Vec<FieldValue>,
    /// Named attributes.
    pub attributes: BTreeMap<String, FieldValue>,
    /// Captured error, if any.
    pub exception: Option<ExceptionInfo>,
    /// Correlation id of the logical flow that emitted the event.
    pub correlation_id: Option<String>,
    /// Source location.
    pub call_site: CallSite,
}

impl LogEvent {
    /// Creates a new event with the current timestamp.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger_name: String::new(),
            message_template: message.into(),
            args: Vec::new(),
            attributes: BTreeMap::new(),
            exception: None,
            correlation_id: None,
            call_site: CallSite::default(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<FieldValue>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds a named attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds several named attributes.
    #[must_use]
    pub fn with_attributes<K, V, I>(mut self, attributes: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.attributes
            .extend(attributes.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the logger name.
    #[must_use]
    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }

    /// Attaches exception info.
    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns an attribute by name.
    ///
    /// The correlation id is visible here as `correlation_id` so that schemas
    /// and formatters can treat it like any other attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value.clone());
        }
        if name == CORRELATION_ID_KEY {
            return self.correlation_id.clone().map(FieldValue::Str);
        }
        None
    }

    /// Returns true if the event carries the named attribute.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
            || (name == CORRELATION_ID_KEY && self.correlation_id.is_some())
    }

    /// Iterates over all attributes, including the correlation id.
    pub fn all_attributes(&self) -> impl Iterator<Item = (String, FieldValue)> + '_ {
        let correlation = if self.attributes.contains_key(CORRELATION_ID_KEY) {
            None
        } else {
            self.correlation_id
                .clone()
                .map(|id| (CORRELATION_ID_KEY.to_string(), FieldValue::Str(id)))
        };
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(correlation)
    }

    /// Resolves `{}` placeholders in the template with the positional args.
    ///
    /// Surplus placeholders are kept verbatim and surplus args are ignored.
    #[must_use]
    pub fn rendered_message(&self) -> String {
        if self.args.is_empty() {
            return self.message_template.clone();
        }

        let mut out = String::with_capacity(self.message_template.len());
        let mut args = self.args.iter();
        let mut rest = self.message_template.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => {
                    let _ = write!(out, "{arg}");
                }
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

/// Attribute name under which the correlation id is exposed.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_new() {
        let event = LogEvent::new(LogLevel::Info, "Test message");

        assert_eq!(event.level, LogLevel::Info);
        assert_eq!(event.message_template, "Test message");
        assert!(event.logger_name.is_empty());
        assert!(event.attributes.is_empty());
        assert!(event.exception.is_none());
        assert!(event.correlation_id.is_none());
    }

    #[test]
    fn test_rendered_message_substitutes_args() {
        let event = LogEvent::new(LogLevel::Info, "{} bought {} items")
            .with_arg("ada")
            .with_arg(3);
        assert_eq!(event.rendered_message(), "ada bought 3 items");
    }

    #[test]
    fn test_rendered_message_keeps_surplus_placeholders() {
        let event = LogEvent::new(LogLevel::Info, "{} and {}").with_arg(1);
        assert_eq!(event.rendered_message(), "1 and {}");

        let event = LogEvent::new(LogLevel::Info, "no placeholders").with_arg(1);
        assert_eq!(event.rendered_message(), "no placeholders");
    }

    #[test]
    fn test_attributes_include_correlation_id() {
        let event = LogEvent::new(LogLevel::Info, "traced")
            .with_attribute("user_id", "u1")
            .with_correlation_id("abc");

        assert!(event.has_attribute("correlation_id"));
        assert_eq!(
            event.attribute("correlation_id"),
            Some(FieldValue::from("abc"))
        );
        let names: Vec<String> = event.all_attributes().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["user_id", "correlation_id"]);
    }

    #[test]
    fn test_explicit_correlation_attribute_wins() {
        let event = LogEvent::new(LogLevel::Info, "traced")
            .with_attribute("correlation_id", "explicit")
            .with_correlation_id("ambient");
        assert_eq!(
            event.attribute("correlation_id"),
            Some(FieldValue::from("explicit"))
        );
        assert_eq!(event.all_attributes().count(), 1);
    }

    #[test]
    fn test_exception_from_error_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("request failed")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "timeout"));
        let info = ExceptionInfo::from_error(&err);

        assert_eq!(info.type_name, "Outer");
        assert_eq!(info.render(), "Outer: request failed\nCaused by: timeout");
    }

    #[test]
    fn test_exception_type_name_drops_generic_parameters() {
        #[derive(Debug)]
        struct Wrapper<E>(E);
        impl<E: std::fmt::Display> std::fmt::Display for Wrapper<E> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "wrapped: {}", self.0)
            }
        }
        impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for Wrapper<E> {}

        let err = Wrapper(std::io::Error::new(std::io::ErrorKind::Other, "eof"));
        let info = ExceptionInfo::from_error(&err);
        assert_eq!(info.type_name, "Wrapper");
        assert_eq!(info.render(), "Wrapper: wrapped: eof");

        assert_eq!(short_type_name("alloc::vec::Vec<core::option::Option<u8>>"), "Vec");
        assert_eq!(short_type_name("dyn core::error::Error"), "Error");
    }

    #[test]
    fn test_call_site_key() {
        let site = CallSite::new("billing::invoice", "charge");
        assert_eq!(site.key(), "billing::invoice:charge");

        let here = CallSite::caller();
        assert!(here.module.ends_with("event.rs"));
        assert!(here.function.parse::<u32>().is_ok());
    }
}
