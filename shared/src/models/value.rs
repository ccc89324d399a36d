//! Attribute values carried by log events.
//!
//! `FieldValue` is a closed tagged union. Application types that need custom
//! rendering are wrapped in [`FieldValue::Tagged`] and matched by tag in the
//! formatter's serializer registry instead of being introspected at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque identifier, rendered as its canonical string.
    Uuid(Uuid),
    /// Point in time, rendered as RFC 3339.
    Time(DateTime<Utc>),
    /// Ordered list of values.
    List(Vec<FieldValue>),
    /// An object exposing a field mapping. Names starting with `_` are private
    /// and stripped during serialization.
    Record(Vec<(String, FieldValue)>),
    /// A value annotated with an application type tag.
    Tagged {
        /// Application type name used for serializer lookup and schema checks.
        tag: String,
        /// The underlying value.
        value: Box<FieldValue>,
    },
    /// Pre-built JSON.
    Json(serde_json::Value),
}

/// Type tags used by schemas to constrain attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Matches [`FieldValue::Null`].
    Null,
    /// Matches [`FieldValue::Bool`].
    Bool,
    /// Matches signed and unsigned integers.
    Int,
    /// Matches [`FieldValue::Float`].
    Float,
    /// Matches [`FieldValue::Str`].
    Str,
    /// Matches [`FieldValue::Uuid`].
    Uuid,
    /// Matches [`FieldValue::Time`].
    Time,
    /// Matches [`FieldValue::List`].
    List,
    /// Matches [`FieldValue::Record`].
    Record,
    /// Matches [`FieldValue::Json`].
    Json,
    /// Matches a [`FieldValue::Tagged`] value with this tag.
    Tagged(String),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Uuid => f.write_str("uuid"),
            Self::Time => f.write_str("time"),
            Self::List => f.write_str("list"),
            Self::Record => f.write_str("record"),
            Self::Json => f.write_str("json"),
            Self::Tagged(tag) => write!(f, "tagged<{tag}>"),
        }
    }
}

impl FieldValue {
    /// Builds a record value from name/value pairs.
    ///
    /// # Example
    ///
    /// ```
    /// use jsonlog_shared::models::FieldValue;
    ///
    /// let order = FieldValue::record([("id", FieldValue::from(42)), ("_secret", "x".into())]);
    /// assert_eq!(order.field_type().to_string(), "record");
    /// ```
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wraps a value with an application type tag.
    pub fn tagged(tag: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Tagged {
            tag: tag.into(),
            value: Box::new(value.into()),
        }
    }

    /// Returns the runtime type tag of this value.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Null => FieldType::Null,
            Self::Bool(_) => FieldType::Bool,
            Self::Int(_) | Self::UInt(_) => FieldType::Int,
            Self::Float(_) => FieldType::Float,
            Self::Str(_) => FieldType::Str,
            Self::Uuid(_) => FieldType::Uuid,
            Self::Time(_) => FieldType::Time,
            Self::List(_) => FieldType::List,
            Self::Record(_) => FieldType::Record,
            Self::Tagged { tag, .. } => FieldType::Tagged(tag.clone()),
            Self::Json(_) => FieldType::Json,
        }
    }

    /// Returns true if this value has the given type.
    #[must_use]
    pub fn is_type(&self, expected: &FieldType) -> bool {
        &self.field_type() == expected
    }

    /// Returns the string slice if this is a `Str` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Tagged { value, .. } => write!(f, "{value}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_of_integers() {
        assert_eq!(FieldValue::from(-3).field_type(), FieldType::Int);
        assert_eq!(FieldValue::from(3u64).field_type(), FieldType::Int);
        assert!(!FieldValue::from(3.5).is_type(&FieldType::Int));
    }

    #[test]
    fn test_tagged_type_matches_only_same_tag() {
        let money = FieldValue::tagged("Money", 1250);
        assert!(money.is_type(&FieldType::Tagged("Money".to_string())));
        assert!(!money.is_type(&FieldType::Tagged("Weight".to_string())));
        assert!(!money.is_type(&FieldType::Int));
    }

    #[test]
    fn test_display_nested_values() {
        let value = FieldValue::record([
            ("name", FieldValue::from("ada")),
            ("tags", FieldValue::from(vec!["a", "b"])),
        ]);
        assert_eq!(value.to_string(), "{name: ada, tags: [a, b]}");
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Str("x".to_string()));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(FieldValue::from(7u64).as_i64(), Some(7));
        assert_eq!(FieldValue::from(u64::MAX).as_i64(), None);
        assert_eq!(FieldValue::from("7").as_i64(), None);
    }

    #[test]
    fn test_field_type_serialization() {
        let json = serde_json::to_string(&FieldType::Str).unwrap();
        assert_eq!(json, "\"str\"");
        let tagged: FieldType = serde_json::from_str(r#"{"tagged":"Money"}"#).unwrap();
        assert_eq!(tagged, FieldType::Tagged("Money".to_string()));
    }
}
