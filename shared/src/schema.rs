//! Declarative log schemas and event validation.
//!
//! A [`LogSchema`] describes which events a sink accepts. [`validate`] checks a
//! single event against it and reports the first violated rule; [`is_valid`] is
//! the fail-closed boolean form used on the hot path.

use crate::models::{FieldType, FieldValue, LogEvent, LogLevel};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// A predicate over one attribute value.
pub type FieldPredicate = Arc<dyn Fn(&FieldValue) -> bool + Send + Sync>;

/// Reasons an event is rejected by a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The event's level is not in the allowed set.
    #[error("Level {0} is not allowed")]
    LevelNotAllowed(LogLevel),

    /// The rendered message is longer than allowed.
    #[error("Message length {length} exceeds maximum {max}")]
    MessageTooLong {
        /// Rendered message length in characters.
        length: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A required attribute is absent.
    #[error("Required field missing: {0}")]
    MissingField(String),

    /// An attribute has the wrong type.
    #[error("Field {field} has type {actual}, expected {expected}")]
    TypeMismatch {
        /// Attribute name.
        field: String,
        /// Declared type.
        expected: FieldType,
        /// Runtime type.
        actual: FieldType,
    },

    /// A registered predicate returned false.
    #[error("Field {0} failed its validator")]
    PredicateFailed(String),

    /// A registered predicate panicked.
    #[error("Validator for field {0} panicked")]
    PredicatePanicked(String),
}

/// Declarative rules an event must satisfy.
///
/// # Example
///
/// ```
/// use jsonlog_shared::models::{FieldType, LogEvent, LogLevel};
/// use jsonlog_shared::schema::{validate, LogSchema};
///
/// let schema = LogSchema::new()
///     .require("user_id")
///     .with_type("user_id", FieldType::Str)
///     .with_max_message_length(200);
///
/// let ok = LogEvent::new(LogLevel::Info, "login").with_attribute("user_id", "u1");
/// assert!(validate(&ok, &schema).is_ok());
///
/// let missing = LogEvent::new(LogLevel::Info, "login");
/// assert!(validate(&missing, &schema).is_err());
/// ```
#[derive(Clone)]
pub struct LogSchema {
    /// Attributes every event must carry.
    pub required_fields: BTreeSet<String>,
    /// Attributes that may appear. Informational only.
    pub optional_fields: BTreeSet<String>,
    /// Expected types of attributes, checked when present.
    pub field_types: HashMap<String, FieldType>,
    /// Extra predicates, run for typed attributes that are present.
    pub field_validators: HashMap<String, FieldPredicate>,
    /// Maximum length of the rendered message in characters.
    pub max_message_length: Option<usize>,
    /// Levels accepted by the schema.
    pub allowed_levels: BTreeSet<LogLevel>,
}

impl fmt::Debug for LogSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut validators: Vec<&String> = self.field_validators.keys().collect();
        validators.sort();
        f.debug_struct("LogSchema")
            .field("required_fields", &self.required_fields)
            .field("optional_fields", &self.optional_fields)
            .field("field_types", &self.field_types)
            .field("field_validators", &validators)
            .field("max_message_length", &self.max_message_length)
            .field("allowed_levels", &self.allowed_levels)
            .finish()
    }
}

impl Default for LogSchema {
    fn default() -> Self {
        Self {
            required_fields: BTreeSet::new(),
            optional_fields: BTreeSet::new(),
            field_types: HashMap::new(),
            field_validators: HashMap::new(),
            max_message_length: None,
            allowed_levels: LogLevel::ALL.into_iter().collect(),
        }
    }
}

impl LogSchema {
    /// Creates a schema that accepts every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an attribute as required.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.insert(field.into());
        self
    }

    /// Declares an optional attribute.
    #[must_use]
    pub fn optional(mut self, field: impl Into<String>) -> Self {
        self.optional_fields.insert(field.into());
        self
    }

    /// Declares the type of an attribute.
    #[must_use]
    pub fn with_type(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.field_types.insert(field.into(), field_type);
        self
    }

    /// Registers a predicate for an attribute.
    ///
    /// Predicates only run for attributes that also have a declared type.
    #[must_use]
    pub fn with_validator<F>(mut self, field: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&FieldValue) -> bool + Send + Sync + 'static,
    {
        self.field_validators
            .insert(field.into(), Arc::new(predicate));
        self
    }

    /// Sets the maximum rendered message length.
    #[must_use]
    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = Some(max);
        self
    }

    /// Restricts the accepted levels.
    #[must_use]
    pub fn with_allowed_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.allowed_levels = levels.into_iter().collect();
        self
    }
}

/// Checks an event against a schema.
///
/// Rules are evaluated in order: level, message length, required fields, then
/// declared types and predicates. The first violation is returned.
///
/// # Errors
///
/// Returns the [`ValidationError`] describing the first violated rule.
pub fn validate(event: &LogEvent, schema: &LogSchema) -> Result<(), ValidationError> {
    if !schema.allowed_levels.contains(&event.level) {
        return Err(ValidationError::LevelNotAllowed(event.level));
    }

    if let Some(max) = schema.max_message_length {
        let length = event.rendered_message().chars().count();
        if length > max {
            return Err(ValidationError::MessageTooLong { length, max });
        }
    }

    for field in &schema.required_fields {
        if !event.has_attribute(field) {
            return Err(ValidationError::MissingField(field.clone()));
        }
    }

    let mut typed: Vec<(&String, &FieldType)> = schema.field_types.iter().collect();
    typed.sort_by(|a, b| a.0.cmp(b.0));
    for (field, expected) in typed {
        let Some(value) = event.attribute(field) else {
            continue;
        };

        let actual = value.field_type();
        if &actual != expected {
            return Err(ValidationError::TypeMismatch {
                field: field.clone(),
                expected: expected.clone(),
                actual,
            });
        }

        if let Some(predicate) = schema.field_validators.get(field) {
            match catch_unwind(AssertUnwindSafe(|| predicate(&value))) {
                Ok(true) => {}
                Ok(false) => return Err(ValidationError::PredicateFailed(field.clone())),
                Err(_) => return Err(ValidationError::PredicatePanicked(field.clone())),
            }
        }
    }

    Ok(())
}

/// Returns true if the event satisfies the schema. Any failure rejects.
#[must_use]
pub fn is_valid(event: &LogEvent, schema: &LogSchema) -> bool {
    validate(event, schema).is_ok()
}

/// A schema bound to a sink, applied to every event before formatting.
#[derive(Debug, Clone)]
pub struct LogValidator {
    schema: Arc<LogSchema>,
}

impl LogValidator {
    /// Creates a validator for the given schema.
    #[must_use]
    pub fn new(schema: LogSchema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &LogSchema {
        &self.schema
    }

    /// Checks an event.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn check(&self, event: &LogEvent) -> Result<(), ValidationError> {
        validate(event, &self.schema)
    }
}
