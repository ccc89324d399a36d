//! Single-line JSON formatting.

use super::serialize::SerializerRegistry;
use super::{format_time, validate_time_format, Formatter};
use crate::config::ConfigError;
use crate::models::LogEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Top-level keys the formatter always owns.
pub const RESERVED_KEYS: [&str; 6] = ["time", "level", "message", "module", "exception", "extra"];

/// Default attributes promoted to top-level keys.
pub const DEFAULT_CUSTOM_FIELDS: [&str; 5] =
    ["user_id", "company_id", "request_id", "trace_id", "span_id"];

/// Output options for [`StructuredFormatter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// strftime pattern for `time`. RFC 3339 with milliseconds when unset.
    pub time_format: Option<String>,
    /// Attributes promoted to top-level keys, in output order.
    pub custom_fields: Vec<String>,
    /// Attributes never written to `extra`.
    pub excluded_attrs: BTreeSet<String>,
    /// Attributes moved to a different top-level key, in output order.
    pub field_renames: Vec<(String, String)>,
    /// Whether remaining attributes are collected under `extra`.
    pub include_extra: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            time_format: None,
            custom_fields: DEFAULT_CUSTOM_FIELDS.iter().map(ToString::to_string).collect(),
            excluded_attrs: BTreeSet::new(),
            field_renames: vec![("error".to_string(), "error_details".to_string())],
            include_extra: true,
        }
    }
}

impl FormatterConfig {
    /// Validates the time format, the custom fields and the rename table.
    ///
    /// # Errors
    ///
    /// Returns an error if the time pattern is invalid or a custom field or
    /// rename target is a reserved key.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        if let Some(pattern) = &self.time_format {
            validate_time_format(pattern)?;
        }
        let promoted = self
            .custom_fields
            .iter()
            .chain(self.field_renames.iter().map(|(_, target)| target));
        for key in promoted {
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::ReservedKey(key.clone()));
            }
        }
        Ok(())
    }

    fn is_excluded_from_extra(&self, name: &str) -> bool {
        RESERVED_KEYS.contains(&name)
            || self.excluded_attrs.contains(name)
            || self.custom_fields.iter().any(|f| f == name)
            || self.field_renames.iter().any(|(source, _)| source == name)
    }
}

/// Formats events as single-line JSON objects.
///
/// Keys appear in this order: `time`, `level`, `message`, `module`, then
/// `exception` if present, then the configured custom fields present on the
/// event, then renamed fields, then `extra` if it is non-empty.
///
/// # Example
///
/// ```
/// use jsonlog_shared::format::{Formatter, FormatterConfig, StructuredFormatter};
/// use jsonlog_shared::models::{LogEvent, LogLevel};
///
/// let formatter = StructuredFormatter::new(FormatterConfig::default()).unwrap();
/// let event = LogEvent::new(LogLevel::Info, "checkout")
///     .with_logger_name("shop")
///     .with_attribute("user_id", "u1")
///     .with_attribute("cart_size", 3);
///
/// let line: serde_json::Value = serde_json::from_str(&formatter.format(&event)).unwrap();
/// assert_eq!(line["module"], "shop");
/// assert_eq!(line["user_id"], "u1");
/// assert_eq!(line["extra"]["cart_size"], 3);
/// ```
#[derive(Debug, Clone)]
pub struct StructuredFormatter {
    config: FormatterConfig,
    serializers: SerializerRegistry,
}

impl StructuredFormatter {
    /// Creates a formatter with the built-in serializers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: FormatterConfig) -> Result<Self, ConfigError> {
        config.validate_config()?;
        Ok(Self {
            config,
            serializers: SerializerRegistry::new(),
        })
    }

    /// Replaces the serializer registry.
    #[must_use]
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Builds the JSON object for an event.
    #[must_use]
    pub fn to_value(&self, event: &LogEvent) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert(
            "time".to_string(),
            Value::String(format_time(event.timestamp, self.config.time_format.as_deref())),
        );
        record.insert(
            "level".to_string(),
            Value::String(event.level.as_str().to_string()),
        );
        record.insert(
            "message".to_string(),
            Value::String(event.rendered_message()),
        );
        record.insert("module".to_string(), Value::String(module_name(event)));

        if let Some(exception) = &event.exception {
            record.insert("exception".to_string(), Value::String(exception.render()));
        }

        for field in &self.config.custom_fields {
            if let Some(value) = event.attribute(field) {
                record.insert(field.clone(), self.serializers.serialize(&value));
            }
        }

        for (source, target) in &self.config.field_renames {
            if let Some(value) = event.attribute(source) {
                record.insert(target.clone(), self.serializers.serialize(&value));
            }
        }

        if self.config.include_extra {
            let extra: Map<String, Value> = event
                .all_attributes()
                .filter(|(name, _)| !self.config.is_excluded_from_extra(name))
                .map(|(name, value)| {
                    let value = self.serializers.serialize(&value);
                    (name, value)
                })
                .collect();
            if !extra.is_empty() {
                record.insert("extra".to_string(), Value::Object(extra));
            }
        }

        record
    }
}

impl Formatter for StructuredFormatter {
    fn format(&self, event: &LogEvent) -> String {
        Value::Object(self.to_value(event)).to_string()
    }
}

pub(super) fn module_name(event: &LogEvent) -> String {
    if event.logger_name.is_empty() {
        "root".to_string()
    } else {
        event.logger_name.clone()
    }
}
