//! Routes `tracing` events into named loggers.
//!
//! Libraries instrumented with `tracing` do not know about this crate. The
//! [`StructuredLayer`] turns each of their events into a [`LogEvent`] on the
//! logger named after the event's target, so component groups and
//! application handlers apply to them like any other event.

use crate::logger::LoggerTree;
use jsonlog_shared::models::{CallSite, FieldValue, LogEvent, LogLevel};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Target prefix of this crate's own diagnostics, which are never bridged.
pub const INTERNAL_TARGET_PREFIX: &str = "jsonlog";

/// A `tracing_subscriber` layer feeding a logger registry.
pub struct StructuredLayer {
    tree: Arc<LoggerTree>,
}

impl fmt::Debug for StructuredLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLayer").finish_non_exhaustive()
    }
}

impl StructuredLayer {
    pub(crate) fn new(tree: Arc<LoggerTree>) -> Self {
        Self { tree }
    }
}

/// Maps a `tracing` level onto the five-level scale.
#[must_use]
pub fn map_level(level: Level) -> LogLevel {
    match level {
        Level::TRACE | Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warning,
        Level::ERROR => LogLevel::Error,
    }
}

/// Converts a `tracing` target (`a::b`) into a logger name (`a.b`).
#[must_use]
pub fn logger_name(target: &str) -> String {
    target.replace("::", ".")
}

impl<S: Subscriber> Layer<S> for StructuredLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(INTERNAL_TARGET_PREFIX) {
            return;
        }

        let level = map_level(*metadata.level());
        let name = logger_name(metadata.target());
        let logger = self.tree.get(&name);
        if !logger.is_enabled_for(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let call_site = CallSite::new(
            metadata.module_path().unwrap_or_else(|| metadata.target()),
            metadata.line().map_or_else(String::new, |line| line.to_string()),
        );

        logger.log(
            LogEvent::new(level, visitor.message.unwrap_or_default())
                .with_logger_name(name)
                .with_attributes(visitor.fields)
                .with_call_site(call_site),
        );
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, FieldValue)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: FieldValue) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, FieldValue::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, FieldValue::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, FieldValue::UInt(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, FieldValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, FieldValue::Str(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, FieldValue::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, FieldValue::Str(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::sink::InMemorySink;
    use jsonlog_shared::format::{FormatterConfig, StructuredFormatter};
    use tracing_subscriber::layer::SubscriberExt;

    fn setup() -> (Arc<LoggerTree>, InMemorySink) {
        let tree = Arc::new(LoggerTree::new());
        let memory = InMemorySink::new();
        let root = tree.root();
        root.set_level(LogLevel::Debug);
        root.add_handler(Arc::new(Handler::new(
            Arc::new(StructuredFormatter::new(FormatterConfig::default()).unwrap()),
            Arc::new(memory.clone()),
        )));
        (tree, memory)
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(map_level(Level::TRACE), LogLevel::Debug);
        assert_eq!(map_level(Level::WARN), LogLevel::Warning);
        assert_eq!(logger_name("sqlx::query"), "sqlx.query");
    }

    #[test]
    fn test_events_become_log_events() {
        let (tree, memory) = setup();
        let subscriber = tracing_subscriber::registry().with(StructuredLayer::new(tree));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "hyper::proto", user_id = "u1", retries = 3_u64, "connection {} reset", 7);
        });

        let lines = memory.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "WARNING");
        assert_eq!(lines[0]["module"], "hyper.proto");
        assert_eq!(lines[0]["message"], "connection 7 reset");
        assert_eq!(lines[0]["user_id"], "u1");
        assert_eq!(lines[0]["extra"]["retries"], 3);
    }

    #[test]
    fn test_internal_targets_are_ignored() {
        let (tree, memory) = setup();
        let subscriber = tracing_subscriber::registry().with(StructuredLayer::new(tree));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "jsonlog::sink", "internal");
        });
        assert!(memory.is_empty());
    }

    #[test]
    fn test_logger_level_filters_bridged_events() {
        let (tree, memory) = setup();
        tree.get("noisy").set_level(LogLevel::Error);
        let subscriber = tracing_subscriber::registry().with(StructuredLayer::new(Arc::clone(&tree)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "noisy::pool", "ignored");
            tracing::error!(target: "noisy::pool", "kept");
        });

        let lines = memory.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "kept");
    }
}
