//! Idempotent logger setup.
//!
//! A [`LoggerRegistry`] owns the logger tree of one application. It builds
//! handler chains from a [`LoggerConfig`], attaches them to named loggers at
//! most once, takes over external component loggers, and closes everything
//! it started on shutdown.

use crate::bridge::StructuredLayer;
use crate::components::ComponentGroup;
use crate::config::{Environment, LoggerConfig, ProcessEnv};
use crate::error::SetupError;
use crate::handler::Handler;
use crate::logger::{LevelFilter, Logger, LoggerTree};
use crate::sink::{AsyncDispatchQueue, RotatingFileSink, Sink, StreamSink, TimedRotatingFileSink};
use jsonlog_shared::config::{MetricsConfig, RotationConfig, RotationKind};
use jsonlog_shared::format::{DevFormatter, Formatter, StructuredFormatter};
use jsonlog_shared::metrics::{MetricsCollector, MetricsReporter, MetricsSnapshot};
use jsonlog_shared::models::{FieldValue, LogEvent, LogLevel};
use jsonlog_shared::rate_limit::RateLimiter;
use jsonlog_shared::schema::LogValidator;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logger that carries periodic metrics reports.
pub const METRICS_LOGGER: &str = "jsonlog.metrics";

/// How long shutdown waits for each metrics reporter.
const REPORTER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Owner of an application's loggers.
///
/// # Example
///
/// ```
/// use jsonlog::{FormatChoice, LoggerConfig, LoggerRegistry};
/// use std::collections::HashMap;
///
/// let registry = LoggerRegistry::with_env(HashMap::new());
/// let config = LoggerConfig::default().with_format(FormatChoice::Json);
///
/// let logger = registry.attach("billing", &config).unwrap();
/// registry.attach("billing", &config).unwrap();
/// assert_eq!(logger.handler_count(), 1);
/// assert!(!logger.propagate());
/// ```
pub struct LoggerRegistry {
    env: Arc<dyn Environment>,
    tree: Arc<LoggerTree>,
    handlers: Mutex<Vec<Arc<Handler>>>,
    files: Mutex<HashMap<PathBuf, Arc<dyn Sink>>>,
    reporters: Mutex<Vec<MetricsReporter>>,
    // Serializes public setup calls so attach checks and adds atomically.
    setup: Mutex<()>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("tree", &self.tree)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerRegistry {
    /// Creates a registry reading the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_env(ProcessEnv)
    }

    /// Creates a registry reading the given environment.
    #[must_use]
    pub fn with_env(env: impl Environment + 'static) -> Self {
        Self {
            env: Arc::new(env),
            tree: Arc::new(LoggerTree::new()),
            handlers: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
            reporters: Mutex::new(Vec::new()),
            setup: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Returns the root logger.
    #[must_use]
    pub fn root(&self) -> Arc<Logger> {
        self.tree.root()
    }

    /// Returns the named logger, creating it if needed. An empty name or
    /// `root` returns the root logger.
    #[must_use]
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        self.tree.get(name)
    }

    /// Attaches a handler chain built from `config` to the named logger.
    ///
    /// If the logger already has handlers nothing changes. Otherwise its
    /// level is set from the environment or the configured default and
    /// propagation is disabled. Concurrent calls for the same name attach
    /// one chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the registry was
    /// shut down.
    pub fn attach(&self, name: &str, config: &LoggerConfig) -> Result<Arc<Logger>, SetupError> {
        let _setup = self.setup.lock().unwrap_or_else(PoisonError::into_inner);
        self.attach_inner(name, config, None)
    }

    /// Like [`attach`](Self::attach), but writes to `sink` instead of the
    /// stream or file named by `config`. The sink is still wrapped in a
    /// dispatch queue when async output is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the registry was
    /// shut down.
    pub fn attach_with_sink(
        &self,
        name: &str,
        config: &LoggerConfig,
        sink: Arc<dyn Sink>,
    ) -> Result<Arc<Logger>, SetupError> {
        let _setup = self.setup.lock().unwrap_or_else(PoisonError::into_inner);
        self.attach_inner(name, config, Some(sink))
    }

    /// Replaces the root logger's handlers with a fresh chain.
    ///
    /// Detached handlers stay open until [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the registry was
    /// shut down.
    pub fn setup_root(&self, config: &LoggerConfig) -> Result<Arc<Logger>, SetupError> {
        let _setup = self.setup.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_running()?;
        config.validate_config()?;

        let root = self.root();
        let handler = self.build_handler(config, self.base_sink(config), true)?;
        root.clear_handlers();
        root.add_handler(handler);
        root.set_level(self.resolve_level(config));
        Ok(root)
    }

    /// Applies the component groups of `config`.
    ///
    /// Enabled groups get one shared structured handler, their level and no
    /// propagation. Disabled groups that silence are set to `Off` without
    /// handlers or propagation; other disabled groups are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the registry was
    /// shut down.
    pub fn setup_components(&self, config: &LoggerConfig) -> Result<(), SetupError> {
        let _setup = self.setup.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_running()?;
        config.validate_config()?;

        for group in ComponentGroup::ALL {
            let settings = config.components.settings(group);
            if settings.enabled {
                let level = settings.level.unwrap_or_else(|| self.resolve_level(config));
                let handler = self.build_handler(config, self.base_sink(config), false)?;
                for name in &settings.loggers {
                    let logger = self.get_logger(name);
                    logger.clear_handlers();
                    logger.add_handler(Arc::clone(&handler));
                    logger.set_level(level);
                    logger.set_propagate(false);
                }
                tracing::debug!(target: "jsonlog::registry", %group, %level, "Component loggers overridden");
            } else if group.silenced_when_disabled() {
                for name in &settings.loggers {
                    let logger = self.get_logger(name);
                    logger.clear_handlers();
                    logger.set_level(LevelFilter::Off);
                    logger.set_propagate(false);
                }
                tracing::debug!(target: "jsonlog::registry", %group, "Component loggers silenced");
            }
        }
        Ok(())
    }

    /// Returns a `tracing` layer that feeds this registry's loggers.
    #[must_use]
    pub fn tracing_layer(&self) -> StructuredLayer {
        StructuredLayer::new(Arc::clone(&self.tree))
    }

    /// Installs a global `tracing` subscriber that routes events into this
    /// registry.
    ///
    /// The filter comes from `RUST_LOG` when set, else from the level
    /// resolved from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn install_tracing_bridge(&self, config: &LoggerConfig) -> Result<(), SetupError> {
        self.ensure_running()?;
        let directive = match self.resolve_level(config) {
            LogLevel::Debug => "trace",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

        tracing_subscriber::registry()
            .with(filter)
            .with(self.tracing_layer())
            .try_init()?;
        Ok(())
    }

    /// Stops metrics reporters and closes every handler this registry
    /// created. Later setup calls fail with [`SetupError::ShutDown`].
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let reporters = std::mem::take(&mut *self.reporters.lock().unwrap_or_else(PoisonError::into_inner));
        for mut reporter in reporters {
            reporter.stop(REPORTER_STOP_TIMEOUT);
        }

        let handlers = std::mem::take(&mut *self.handlers.lock().unwrap_or_else(PoisonError::into_inner));
        for handler in &handlers {
            handler.close();
        }

        tracing::debug!(target: "jsonlog::registry", handlers = handlers.len(), "Logger registry shut down");
    }

    /// Callers hold the setup lock. Metrics setup re-enters this for
    /// [`METRICS_LOGGER`].
    fn attach_inner(
        &self,
        name: &str,
        config: &LoggerConfig,
        sink: Option<Arc<dyn Sink>>,
    ) -> Result<Arc<Logger>, SetupError> {
        self.ensure_running()?;
        config.validate_config()?;

        let logger = self.get_logger(name);
        if logger.has_handlers() {
            return Ok(logger);
        }

        let level = self.resolve_level(config);
        let sink = sink.unwrap_or_else(|| self.base_sink(config));
        logger.add_handler(self.build_handler(config, sink, true)?);
        logger.set_level(level);
        logger.set_propagate(false);

        tracing::debug!(target: "jsonlog::registry", logger = logger.name(), %level, "Attached structured handler");
        Ok(logger)
    }

    fn ensure_running(&self) -> Result<(), SetupError> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(SetupError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn resolve_level(&self, config: &LoggerConfig) -> LogLevel {
        config.resolve_level(self.env.as_ref())
    }

    fn build_handler(
        &self,
        config: &LoggerConfig,
        sink: Arc<dyn Sink>,
        with_metrics: bool,
    ) -> Result<Arc<Handler>, SetupError> {
        let formatter = self.build_formatter(config)?;
        let mut handler = Handler::new(formatter, dispatch(config, Arc::clone(&sink)))
            .with_correlation(config.enable_correlation_ids);

        if let Some(schema) = &config.schema {
            handler = handler.with_validator(LogValidator::new(schema.clone()));
        }
        if let Some(sampling) = &config.sampling {
            handler = handler.with_rate_limiter(RateLimiter::new(sampling.clone()));
        }
        if let Some(metrics) = config.metrics.as_ref().filter(|m| m.enabled && with_metrics) {
            handler = handler.with_metrics(self.start_metrics(config, metrics, &sink)?);
        }

        let handler = Arc::new(handler);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&handler));
        Ok(handler)
    }

    fn build_formatter(&self, config: &LoggerConfig) -> Result<Arc<dyn Formatter>, SetupError> {
        if config.use_json(self.env.as_ref()) {
            let formatter = StructuredFormatter::new(config.formatter.clone())?
                .with_serializers(config.serializers.clone());
            Ok(Arc::new(formatter))
        } else {
            let formatter = DevFormatter::new(&config.dev_template, config.formatter.time_format.as_deref())?;
            Ok(Arc::new(formatter))
        }
    }

    /// Returns the configured stream or file sink. Chains naming the same
    /// file share one sink, opened with the first chain's rotation settings.
    fn base_sink(&self, config: &LoggerConfig) -> Arc<dyn Sink> {
        let stream = || -> Arc<dyn Sink> { Arc::new(StreamSink::new(config.output)) };

        match (&config.log_file_path, &config.rotation) {
            (Some(path), rotation) => {
                let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(sink) = files.get(path) {
                    return Arc::clone(sink);
                }
                match open_file_sink(path, rotation.as_ref()) {
                    Ok(sink) => {
                        files.insert(path.clone(), Arc::clone(&sink));
                        sink
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "jsonlog::registry",
                            path = %path.display(),
                            error = %err,
                            "Failed to open log file, writing to stream instead"
                        );
                        stream()
                    }
                }
            }
            (None, Some(_)) => {
                tracing::warn!(
                    target: "jsonlog::registry",
                    "File rotation configured without a log file path, writing to stream instead"
                );
                stream()
            }
            (None, None) => stream(),
        }
    }

    fn start_metrics(
        &self,
        config: &LoggerConfig,
        metrics: &MetricsConfig,
        sink: &Arc<dyn Sink>,
    ) -> Result<Arc<MetricsCollector>, SetupError> {
        let collector = Arc::new(MetricsCollector::new(metrics.clone()));

        // Reports share the sink but not the collector, so they are never
        // counted themselves.
        let mut report_config = config.clone();
        report_config.metrics = None;
        report_config.schema = None;
        report_config.sampling = None;
        let reports = self.attach_inner(METRICS_LOGGER, &report_config, Some(Arc::clone(sink)))?;
        reports.set_level(LogLevel::Info);

        let emit = move |snapshot: MetricsSnapshot| {
            let value = serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null);
            reports.log(
                LogEvent::new(LogLevel::Info, "Logging metrics")
                    .with_attribute("metrics", FieldValue::Json(value)),
            );
        };

        match MetricsReporter::spawn(Arc::clone(&collector), metrics.interval(), emit) {
            Ok(reporter) => self
                .reporters
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(reporter),
            Err(err) => tracing::warn!(
                target: "jsonlog::registry",
                error = %err,
                "Failed to start metrics reporter"
            ),
        }
        Ok(collector)
    }
}

impl Drop for LoggerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(config: &LoggerConfig, sink: Arc<dyn Sink>) -> Arc<dyn Sink> {
    if !config.enable_async {
        return sink;
    }
    match AsyncDispatchQueue::new(Arc::clone(&sink), config.queue_size) {
        Ok(queue) => Arc::new(queue),
        Err(err) => {
            tracing::warn!(
                target: "jsonlog::registry",
                error = %err,
                "Failed to start dispatch worker, writing synchronously"
            );
            sink
        }
    }
}

fn open_file_sink(path: &Path, rotation: Option<&RotationConfig>) -> io::Result<Arc<dyn Sink>> {
    Ok(match rotation {
        None => Arc::new(RotatingFileSink::open(path, 0, 0)?),
        Some(RotationConfig {
            kind: RotationKind::Size,
            max_bytes,
            backup_count,
            ..
        }) => Arc::new(RotatingFileSink::open(path, *max_bytes, *backup_count)?),
        Some(RotationConfig {
            kind: RotationKind::Time { when },
            backup_count,
            ..
        }) => Arc::new(TimedRotatingFileSink::open(path, when, *backup_count)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatChoice;
    use crate::sink::InMemorySink;
    use std::collections::HashMap;
    use std::sync::Barrier;

    fn registry() -> LoggerRegistry {
        LoggerRegistry::with_env(HashMap::new())
    }

    #[test]
    fn test_concurrent_attach_adds_one_handler() {
        const THREADS: usize = 8;
        let config = LoggerConfig::default().with_format(FormatChoice::Json);

        for round in 0..50 {
            let registry = registry();
            let name = format!("race.{round}");
            let barrier = Barrier::new(THREADS);
            std::thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        barrier.wait();
                        registry
                            .attach_with_sink(&name, &config, Arc::new(InMemorySink::new()))
                            .unwrap();
                    });
                }
            });
            assert_eq!(registry.get_logger(&name).handler_count(), 1, "round {round}");
        }
    }

    #[test]
    fn test_attach_sets_level_from_environment() {
        let registry = LoggerRegistry::with_env(HashMap::from([(
            "LOG_LEVEL".to_string(),
            "ERROR".to_string(),
        )]));
        let logger = registry.attach("api", &LoggerConfig::default()).unwrap();
        assert_eq!(logger.level(), Some(LevelFilter::Level(LogLevel::Error)));
    }

    #[test]
    fn test_attach_rejects_invalid_config() {
        let mut config = LoggerConfig::default();
        config.queue_size = 0;
        assert!(matches!(
            registry().attach("api", &config),
            Err(SetupError::Config(_))
        ));
    }

    #[test]
    fn test_setup_root_replaces_handlers() {
        let registry = registry();
        let root = registry.root();
        root.add_handler(Arc::new(Handler::new(
            Arc::new(DevFormatter::default()),
            Arc::new(InMemorySink::new()),
        )));

        registry.setup_root(&LoggerConfig::default()).unwrap();
        assert_eq!(root.handler_count(), 1);
        assert_eq!(root.level(), Some(LevelFilter::Level(LogLevel::Info)));
    }

    #[test]
    fn test_missing_file_path_falls_back_to_stream() {
        let mut config = LoggerConfig::default().with_format(FormatChoice::Json);
        config.rotation = Some(RotationConfig::default());
        let logger = registry().attach("fallback", &config).unwrap();
        assert!(logger.has_handlers());
    }

    #[test]
    fn test_same_file_shares_one_sink() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggerConfig::default()
            .with_rotation(dir.path().join("app.log"), RotationConfig::size(1024, 2));
        let registry = registry();

        let a = registry.attach("a", &config).unwrap();
        let b = registry.attach("b", &config).unwrap();
        assert!(Arc::ptr_eq(a.handlers()[0].sink(), b.handlers()[0].sink()));
    }

    #[test]
    fn test_shutdown_blocks_further_setup() {
        let registry = registry();
        registry.shutdown();
        assert!(matches!(
            registry.attach("late", &LoggerConfig::default()),
            Err(SetupError::ShutDown)
        ));
        registry.shutdown();
    }

    #[test]
    fn test_metrics_logger_has_no_collector() {
        let registry = registry();
        let config = LoggerConfig::default()
            .with_format(FormatChoice::Json)
            .with_metrics(MetricsConfig::default());

        let app = registry.attach("app", &config).unwrap();
        assert!(app.handlers()[0].metrics().is_some());

        let reports = registry.get_logger(METRICS_LOGGER);
        assert_eq!(reports.handler_count(), 1);
        assert!(reports.handlers()[0].metrics().is_none());
    }
}
