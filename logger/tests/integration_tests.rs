//! Integration tests for jsonlog.
//!
//! These tests drive the registry end to end: configuration in, formatted
//! lines out of a sink.

use jsonlog::jsonlog_shared::config::{MetricsConfig, RotationConfig, SamplingConfig};
use jsonlog::jsonlog_shared::correlation;
use jsonlog::jsonlog_shared::models::{LogEvent, LogLevel};
use jsonlog::jsonlog_shared::schema::{LogSchema, ValidationError};
use jsonlog::sink::{InMemorySink, Sink};
use jsonlog::{
    ComponentConfig, ComponentGroup, FormatChoice, HandleOutcome, LevelFilter, Logger, LoggerConfig,
    LoggerRegistry, SetupError, METRICS_LOGGER,
};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Creates a registry with an empty environment.
fn test_registry() -> LoggerRegistry {
    LoggerRegistry::with_env(HashMap::new())
}

/// Creates a registry with the given environment variables.
fn registry_with_env(pairs: &[(&str, &str)]) -> LoggerRegistry {
    LoggerRegistry::with_env(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>(),
    )
}

fn json_config() -> LoggerConfig {
    LoggerConfig::default().with_format(FormatChoice::Json)
}

/// Attaches a logger writing into a fresh in-memory sink.
fn attach_memory(registry: &LoggerRegistry, name: &str, config: &LoggerConfig) -> (Arc<Logger>, InMemorySink) {
    let memory = InMemorySink::new();
    let logger = registry
        .attach_with_sink(name, config, Arc::new(memory.clone()))
        .unwrap();
    (logger, memory)
}

mod pipeline {
    use super::*;

    #[test]
    fn test_schema_gates_events() {
        let registry = test_registry();
        let config = json_config().with_schema(LogSchema::new().require("user_id"));
        let (logger, memory) = attach_memory(&registry, "auth", &config);

        let outcomes = logger.log(LogEvent::new(LogLevel::Info, "anonymous login"));
        assert_eq!(
            outcomes,
            vec![HandleOutcome::Rejected(ValidationError::MissingField(
                "user_id".to_string()
            ))]
        );
        assert!(memory.is_empty());

        logger.log(LogEvent::new(LogLevel::Info, "User logged in").with_attribute("user_id", "12345"));
        let lines = memory.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "User logged in");
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["module"], "auth");
        assert_eq!(lines[0]["user_id"], "12345");
        assert!(lines[0].get("extra").is_none());
    }

    #[test]
    fn test_key_order() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "orders", &json_config());

        logger.log(
            LogEvent::new(LogLevel::Warning, "Order {} delayed")
                .with_arg(17)
                .with_attribute("carrier", "ups")
                .with_attribute("request_id", "r-1"),
        );

        let line = &memory.json_lines()[0];
        let keys: Vec<&str> = line.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["time", "level", "message", "module", "request_id", "extra"]);
        assert_eq!(line["message"], "Order 17 delayed");
        assert_eq!(line["extra"]["carrier"], "ups");
        assert!(line["extra"].get("request_id").is_none());
    }

    #[test]
    fn test_error_attribute_is_renamed() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "jobs", &json_config());

        logger.log(LogEvent::new(LogLevel::Error, "Job failed").with_attribute("error", "timeout"));

        let line = &memory.json_lines()[0];
        assert_eq!(line["error_details"], "timeout");
        assert!(line.get("error").is_none());
        assert!(line.get("extra").is_none());
    }

    #[test]
    fn test_exception_is_rendered() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "storage", &json_config());

        let err = io::Error::new(io::ErrorKind::Other, "disk full");
        logger.exception("Write failed", &err);

        let line = &memory.json_lines()[0];
        assert_eq!(line["level"], "ERROR");
        assert!(line["exception"].as_str().unwrap().contains("disk full"));
    }

    #[test]
    fn test_sampling_admits_burst_only() {
        let registry = test_registry();
        let config = json_config().with_sampling(SamplingConfig::new(0.0, 3, 60, 10).unwrap());
        let (logger, memory) = attach_memory(&registry, "noisy", &config);

        for i in 0..10 {
            logger.info(format!("event {i}"));
        }

        assert_eq!(memory.len(), 3);
        let stats = logger.handlers()[0].stats();
        assert_eq!(stats.emitted, 3);
        assert_eq!(stats.rate_limited, 7);
    }
}

mod setup {
    use super::*;

    #[test]
    fn test_attach_is_idempotent() {
        let registry = test_registry();
        let first = registry.attach("api", &json_config()).unwrap();
        let second = registry
            .attach("api", &json_config().with_level(LogLevel::Error))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.handler_count(), 1);
        assert_eq!(second.level(), Some(LevelFilter::Level(LogLevel::Info)));
    }

    #[test]
    fn test_attached_logger_does_not_propagate() {
        let registry = test_registry();
        let (_root, root_memory) = attach_memory(&registry, "root", &json_config());
        let (child, child_memory) = attach_memory(&registry, "api.users", &json_config());

        child.info("created");
        assert_eq!(child_memory.len(), 1);
        assert!(root_memory.is_empty());
    }

    #[test]
    fn test_environment_selects_format_and_level() {
        let registry = registry_with_env(&[("ENV", "production"), ("LOG_LEVEL", "warning")]);
        let (logger, memory) = attach_memory(&registry, "web", &LoggerConfig::default());

        logger.info("dropped");
        logger.warning("kept");

        let lines = memory.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "kept");
    }

    #[test]
    fn test_development_format_outside_production() {
        let registry = registry_with_env(&[("ENV", "development")]);
        let (logger, memory) = attach_memory(&registry, "web", &LoggerConfig::default());

        logger.info("hello");

        let line = &memory.lines()[0];
        assert!(!line.starts_with('{'));
        assert!(line.ends_with("[INFO] web: hello"));
    }

    #[test]
    fn test_shutdown_closes_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("app.log");
        let registry = test_registry();
        let config = json_config().with_rotation(&path, RotationConfig::size(0, 0));
        let logger = registry.attach("files", &config)?;

        logger.info("before");
        registry.shutdown();

        assert_eq!(
            logger.log(LogEvent::new(LogLevel::Info, "after")),
            vec![HandleOutcome::WriteFailed]
        );
        assert!(matches!(
            registry.attach("late", &config),
            Err(SetupError::ShutDown)
        ));
        assert_eq!(std::fs::read_to_string(&path)?.lines().count(), 1);
        Ok(())
    }
}

mod rotation {
    use super::*;

    #[test]
    fn test_size_rotation_keeps_backup_count() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("service.log");
        let registry = test_registry();
        let config = json_config().with_rotation(&path, RotationConfig::size(200, 2));
        let logger = registry.attach("service", &config)?;

        for i in 0..20 {
            logger.info(format!("request {i} handled"));
        }
        registry.shutdown();

        assert!(path.exists());
        assert!(dir.path().join("service.log.1").exists());
        assert!(dir.path().join("service.log.2").exists());
        assert!(!dir.path().join("service.log.3").exists());

        let last = std::fs::read_to_string(&path)?;
        assert!(last.contains("request 19 handled"));
        Ok(())
    }

    #[test]
    fn test_time_rotation_never_writes_bare_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timed.log");
        let registry = test_registry();
        let config = json_config().with_rotation(&path, RotationConfig::time("never", 3));
        let logger = registry.attach("timed", &config).unwrap();

        logger.info("one");
        logger.info("two");
        registry.shutdown();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}

mod dispatch {
    use super::*;

    /// A sink that takes a while for every line.
    #[derive(Default)]
    struct SlowSink {
        written: AtomicUsize,
    }

    impl Sink for SlowSink {
        fn write_line(&self, _line: &str) -> io::Result<()> {
            std::thread::sleep(Duration::from_millis(50));
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_async_output_keeps_order() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "queued", &json_config().with_async(100));

        for i in 0..10 {
            logger.info(format!("line {i}"));
        }
        registry.shutdown();

        let messages: Vec<String> = memory
            .json_lines()
            .iter()
            .map(|line| line["message"].as_str().unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let registry = test_registry();
        let slow = Arc::new(SlowSink::default());
        let logger = registry
            .attach_with_sink("slow", &json_config().with_async(4), slow.clone())
            .unwrap();

        let started = Instant::now();
        let dropped = (0..100)
            .flat_map(|i| logger.log(LogEvent::new(LogLevel::Info, format!("burst {i}"))))
            .filter(|outcome| *outcome == HandleOutcome::Dropped)
            .count();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(dropped > 0);

        let stats = logger.handlers()[0].stats();
        assert_eq!(stats.dropped, dropped as u64);
        assert_eq!(stats.emitted + stats.dropped, 100);

        registry.shutdown();
        assert!(slow.written.load(Ordering::SeqCst) as u64 <= stats.emitted);
    }
}

mod components {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_default_groups() {
        let registry = test_registry();
        registry.setup_components(&json_config()).unwrap();

        let sqlx = registry.get_logger("sqlx");
        assert_eq!(sqlx.level(), Some(LevelFilter::Off));
        assert!(!sqlx.has_handlers());
        assert!(!sqlx.propagate());

        let hyper = registry.get_logger("hyper");
        assert_eq!(hyper.handler_count(), 1);
        assert!(!hyper.propagate());
        assert_eq!(hyper.level(), Some(LevelFilter::Level(LogLevel::Info)));

        let untouched = registry.get_logger("actix_server");
        assert_eq!(untouched.level(), None);
        assert!(untouched.propagate());
    }

    #[test]
    fn test_enabled_group_uses_its_level() {
        let registry = test_registry();
        let components = ComponentConfig::default()
            .enable(ComponentGroup::Orm, true)
            .with_level(ComponentGroup::Orm, LogLevel::Debug);
        registry
            .setup_components(&json_config().with_components(components))
            .unwrap();

        let sqlx = registry.get_logger("sqlx");
        assert_eq!(sqlx.handler_count(), 1);
        assert_eq!(sqlx.level(), Some(LevelFilter::Level(LogLevel::Debug)));

        let diesel = registry.get_logger("diesel");
        assert!(Arc::ptr_eq(&sqlx.handlers()[0], &diesel.handlers()[0]));
    }

    #[test]
    fn test_silenced_group_drops_bridged_events() {
        let registry = test_registry();
        let (_root, memory) = attach_memory(&registry, "root", &json_config());
        registry.setup_components(&json_config()).unwrap();

        let subscriber = tracing_subscriber::registry().with(registry.tracing_layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "sqlx::query", "slow statement");
            tracing::info!(target: "my_app::jobs", job = "cleanup", "Job finished");
        });

        let lines = memory.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["module"], "my_app.jobs");
        assert_eq!(lines[0]["extra"]["job"], "cleanup");
    }
}

mod metrics {
    use super::*;

    #[test]
    fn test_reporter_writes_snapshots() {
        let registry = test_registry();
        let config = json_config().with_metrics(MetricsConfig {
            metrics_interval_secs: 1,
            ..MetricsConfig::default()
        });
        let (logger, memory) = attach_memory(&registry, "app", &config);

        logger.info("one");
        logger.error("two");

        let snapshot = logger.handlers()[0].metrics().unwrap().snapshot();
        assert_eq!(snapshot.total(), 2);
        assert_eq!(snapshot.count(LogLevel::Error), 1);

        std::thread::sleep(Duration::from_millis(1500));
        registry.shutdown();

        let lines = memory.json_lines();
        let report = lines
            .iter()
            .find(|line| line["module"] == METRICS_LOGGER)
            .expect("metrics report");
        assert_eq!(report["message"], "Logging metrics");
        assert_eq!(report["extra"]["metrics"]["counts"]["total"], 2);
        assert_eq!(report["extra"]["metrics"]["counts"]["INFO"], 1);
        assert_eq!(report["extra"]["metrics"]["errors"].as_object().unwrap().len(), 1);
    }
}

mod correlation_ids {
    use super::*;

    #[tokio::test]
    async fn test_task_scope_stamps_events() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "requests", &json_config().with_correlation_ids());

        correlation::scope_async(Some("req-42".to_string()), async {
            logger.info("inside");
        })
        .await;
        logger.info("outside");

        let lines = memory.json_lines();
        assert_eq!(lines[0]["extra"]["correlation_id"], "req-42");
        assert!(lines[1].get("extra").is_none());
    }

    #[test]
    fn test_guard_generates_id() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "workers", &json_config().with_correlation_ids());

        let guard = correlation::scoped(None);
        logger.info("working");
        let id = guard.id().to_string();
        drop(guard);
        logger.info("idle");

        let lines = memory.json_lines();
        assert_eq!(lines[0]["extra"]["correlation_id"], id.as_str());
        assert!(lines[1].get("extra").is_none());
    }

    #[test]
    fn test_disabled_by_default() {
        let registry = test_registry();
        let (logger, memory) = attach_memory(&registry, "plain", &json_config());

        let _guard = correlation::scoped(Some("ignored".to_string()));
        logger.info("no id");
        assert!(memory.json_lines()[0].get("extra").is_none());
    }
}

mod bridge {
    use super::*;

    #[test]
    fn test_global_bridge_installs_once() {
        let registry = test_registry();
        registry.install_tracing_bridge(&json_config()).unwrap();
        assert!(matches!(
            registry.install_tracing_bridge(&json_config()),
            Err(SetupError::TracingBridge(_))
        ));
    }
}
