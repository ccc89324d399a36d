//! Conversion of attribute values into JSON.
//!
//! Custom serializers are matched by [`FieldType`] in registration order
//! before the built-in conversions apply. A value that cannot be converted
//! degrades to its display string; it never aborts the event.

use crate::models::{FieldType, FieldValue};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default nesting limit for records and lists.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Why a value fell back to its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    /// Records or lists nest deeper than the configured limit.
    #[error("Value nests deeper than {0} levels")]
    TooDeep(usize),

    /// The value has no JSON representation (e.g. NaN).
    #[error("Value is not representable in JSON: {0}")]
    NotRepresentable(String),

    /// A registered serializer rejected the value.
    #[error("Serializer for {tag} failed: {reason}")]
    Custom {
        /// Type the serializer was registered for.
        tag: FieldType,
        /// Serializer-provided reason.
        reason: String,
    },
}

/// A registered conversion for one value type.
pub type SerializerFn = Arc<dyn Fn(&FieldValue) -> Result<Value, SerializeError> + Send + Sync>;

/// Ordered table of per-type serializers plus the built-in conversions.
///
/// # Example
///
/// ```
/// use jsonlog_shared::format::SerializerRegistry;
/// use jsonlog_shared::models::{FieldType, FieldValue};
/// use serde_json::json;
///
/// let registry = SerializerRegistry::new().with_serializer(
///     FieldType::Tagged("Money".to_string()),
///     |v| Ok(json!(format!("{v} EUR"))),
/// );
///
/// assert_eq!(registry.serialize(&FieldValue::tagged("Money", 12)), json!("12 EUR"));
/// assert_eq!(registry.serialize(&FieldValue::from(12)), json!(12));
/// ```
#[derive(Clone)]
pub struct SerializerRegistry {
    entries: Vec<(FieldType, SerializerFn)>,
    max_depth: usize,
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&FieldType> = self.entries.iter().map(|(tag, _)| tag).collect();
        f.debug_struct("SerializerRegistry")
            .field("entries", &tags)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SerializerRegistry {
    /// Creates a registry with only the built-in conversions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a serializer for values of `tag`.
    ///
    /// Earlier registrations win when several match.
    pub fn register<F>(&mut self, tag: FieldType, serializer: F)
    where
        F: Fn(&FieldValue) -> Result<Value, SerializeError> + Send + Sync + 'static,
    {
        self.entries.push((tag, Arc::new(serializer)));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_serializer<F>(mut self, tag: FieldType, serializer: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<Value, SerializeError> + Send + Sync + 'static,
    {
        self.register(tag, serializer);
        self
    }

    /// Sets the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the number of registered serializers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no serializers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts a value, falling back to its display string on failure.
    #[must_use]
    pub fn serialize(&self, value: &FieldValue) -> Value {
        self.try_serialize(value).unwrap_or_else(|err| {
            tracing::trace!(target: "jsonlog::format", error = %err, "Falling back to string");
            Value::String(value.to_string())
        })
    }

    /// Converts a value.
    ///
    /// Nested record fields and list items that fail are replaced by their
    /// string form; only a failure of the value itself is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a registered serializer fails, the value nests too
    /// deeply or has no JSON representation.
    pub fn try_serialize(&self, value: &FieldValue) -> Result<Value, SerializeError> {
        self.convert(value, 0)
    }

    fn convert(&self, value: &FieldValue, depth: usize) -> Result<Value, SerializeError> {
        if depth > self.max_depth {
            return Err(SerializeError::TooDeep(self.max_depth));
        }

        if let Some((_, serializer)) = self.entries.iter().find(|(tag, _)| value.is_type(tag)) {
            return serializer(value);
        }

        Ok(match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::UInt(u) => Value::from(*u),
            FieldValue::Float(x) => Number::from_f64(*x)
                .map(Value::Number)
                .ok_or_else(|| SerializeError::NotRepresentable(x.to_string()))?,
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::Time(t) => Value::String(t.to_rfc3339()),
            FieldValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.convert_nested(item, depth + 1))
                    .collect(),
            ),
            FieldValue::Record(fields) => Value::Object(
                fields
                    .iter()
                    .filter(|(name, _)| !name.starts_with('_'))
                    .map(|(name, v)| (name.clone(), self.convert_nested(v, depth + 1)))
                    .collect::<Map<String, Value>>(),
            ),
            FieldValue::Tagged { value, .. } => self.convert(value, depth + 1)?,
            FieldValue::Json(v) => v.clone(),
        })
    }

    fn convert_nested(&self, value: &FieldValue, depth: usize) -> Value {
        self.convert(value, depth)
            .unwrap_or_else(|_| Value::String(value.to_string()))
    }
}
