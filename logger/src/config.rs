//! Logger configuration.
//!
//! [`LoggerConfig`] is the one record the registry needs to build a handler
//! chain. Values that depend on the process environment (level, JSON versus
//! development output) are resolved through an [`Environment`] so tests can
//! supply their own variables.

use crate::components::ComponentConfig;
use crate::sink::{OutputStream, DEFAULT_QUEUE_SIZE};
use jsonlog_shared::config::{ConfigError, MetricsConfig, RotationConfig, SamplingConfig};
use jsonlog_shared::format::{validate_template, FormatterConfig, SerializerRegistry, DEFAULT_DEV_TEMPLATE};
use jsonlog_shared::models::LogLevel;
use jsonlog_shared::schema::LogSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use validator::Validate;

/// Source of environment variables.
pub trait Environment: Send + Sync {
    /// Returns the value of a variable, if set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    /// JSON in production, development lines otherwise.
    #[default]
    Auto,
    /// Always JSON.
    Json,
    /// Always development lines.
    Dev,
}

/// Configuration of one handler chain.
///
/// Configuration values can be overridden via environment variables:
/// - `LOG_LEVEL` (see `log_level_env_var`): level of the configured logger
/// - `RAILWAY_ENVIRONMENT`, `ENV`, `ENVIRONMENT`, `NODE_ENV` (see
///   `production_env_vars`): a value of `prod`, `production` or `staging`
///   selects JSON output under [`FormatChoice::Auto`]
///
/// # Example
///
/// ```
/// use jsonlog::config::{FormatChoice, LoggerConfig};
/// use jsonlog_shared::config::SamplingConfig;
/// use jsonlog_shared::models::LogLevel;
/// use std::collections::HashMap;
///
/// let config = LoggerConfig::default()
///     .with_format(FormatChoice::Auto)
///     .with_sampling(SamplingConfig::new(0.1, 50, 60, 500).unwrap());
/// assert!(config.validate_config().is_ok());
///
/// let env = HashMap::from([
///     ("ENV".to_string(), "Production".to_string()),
///     ("LOG_LEVEL".to_string(), "debug".to_string()),
/// ]);
/// assert!(config.use_json(&env));
/// assert_eq!(config.resolve_level(&env), LogLevel::Debug);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggerConfig {
    /// Variables inspected to detect a production environment.
    pub production_env_vars: Vec<String>,
    /// Values (case-insensitive) that mark an environment as production.
    pub production_env_values: Vec<String>,
    /// Variable holding the level override.
    pub log_level_env_var: String,
    /// Level used when the override is unset.
    pub default_log_level: LogLevel,
    /// JSON or development output.
    pub format: FormatChoice,
    /// Template of development lines.
    pub dev_template: String,
    /// JSON output options.
    pub formatter: FormatterConfig,
    /// Per-type serializers for attribute values.
    #[serde(skip)]
    pub serializers: SerializerRegistry,
    /// Stream used when no file is configured.
    pub output: OutputStream,
    /// Schema events must satisfy.
    #[serde(skip)]
    pub schema: Option<LogSchema>,
    /// Rate limiting; disabled when unset.
    pub sampling: Option<SamplingConfig>,
    /// Metrics; disabled when unset.
    pub metrics: Option<MetricsConfig>,
    /// File rotation; requires `log_file_path`.
    pub rotation: Option<RotationConfig>,
    /// Path of the log file.
    pub log_file_path: Option<PathBuf>,
    /// Whether lines are written by a background worker.
    pub enable_async: bool,
    /// Capacity of the background queue.
    #[validate(range(min = 1, message = "Queue size must be at least 1"))]
    pub queue_size: usize,
    /// Whether the current correlation id is stamped on events.
    pub enable_correlation_ids: bool,
    /// External component groups.
    pub components: ComponentConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            production_env_vars: ["RAILWAY_ENVIRONMENT", "ENV", "ENVIRONMENT", "NODE_ENV"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            production_env_values: ["prod", "production", "staging"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            log_level_env_var: "LOG_LEVEL".to_string(),
            default_log_level: LogLevel::Info,
            format: FormatChoice::Auto,
            dev_template: DEFAULT_DEV_TEMPLATE.to_string(),
            formatter: FormatterConfig::default(),
            serializers: SerializerRegistry::new(),
            output: OutputStream::Stdout,
            schema: None,
            sampling: None,
            metrics: None,
            rotation: None,
            log_file_path: None,
            enable_async: false,
            queue_size: DEFAULT_QUEUE_SIZE,
            enable_correlation_ids: false,
            components: ComponentConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: FormatChoice) -> Self {
        self.format = format;
        self
    }

    /// Sets the default level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_log_level = level;
        self
    }

    /// Sets the attributes promoted to top-level keys.
    #[must_use]
    pub fn with_custom_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formatter.custom_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-type serializers.
    #[must_use]
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Sets the output stream.
    #[must_use]
    pub fn with_output(mut self, output: OutputStream) -> Self {
        self.output = output;
        self
    }

    /// Enables schema validation.
    #[must_use]
    pub fn with_schema(mut self, schema: LogSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Enables rate limiting.
    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = Some(sampling);
        self
    }

    /// Enables metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Writes to a rotating file.
    #[must_use]
    pub fn with_rotation(mut self, path: impl Into<PathBuf>, rotation: RotationConfig) -> Self {
        self.log_file_path = Some(path.into());
        self.rotation = Some(rotation);
        self
    }

    /// Enables background writing with the given queue capacity.
    #[must_use]
    pub fn with_async(mut self, queue_size: usize) -> Self {
        self.enable_async = true;
        self.queue_size = queue_size;
        self
    }

    /// Enables correlation id stamping.
    #[must_use]
    pub fn with_correlation_ids(mut self) -> Self {
        self.enable_correlation_ids = true;
        self
    }

    /// Sets the component groups.
    #[must_use]
    pub fn with_components(mut self, components: ComponentConfig) -> Self {
        self.components = components;
        self
    }

    /// Validates the configuration and every nested record.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.formatter.validate_config()?;
        validate_template(&self.dev_template)?;
        if let Some(sampling) = &self.sampling {
            sampling.validate_config()?;
        }
        if let Some(metrics) = &self.metrics {
            metrics.validate_config()?;
        }
        if let Some(rotation) = &self.rotation {
            rotation.validate_config()?;
        }
        Ok(())
    }

    /// Returns true if any production variable holds a production value.
    #[must_use]
    pub fn is_production(&self, env: &dyn Environment) -> bool {
        self.production_env_vars.iter().any(|name| {
            env.var(name).is_some_and(|value| {
                self.production_env_values
                    .iter()
                    .any(|expected| expected.eq_ignore_ascii_case(value.trim()))
            })
        })
    }

    /// Returns true if JSON output should be used.
    #[must_use]
    pub fn use_json(&self, env: &dyn Environment) -> bool {
        match self.format {
            FormatChoice::Json => true,
            FormatChoice::Dev => false,
            FormatChoice::Auto => self.is_production(env),
        }
    }

    /// Returns the level override from the environment, or the default.
    ///
    /// Unknown level names resolve to INFO.
    #[must_use]
    pub fn resolve_level(&self, env: &dyn Environment) -> LogLevel {
        env.var(&self.log_level_env_var)
            .map_or(self.default_log_level, |name| LogLevel::parse_or_info(&name))
    }
}
