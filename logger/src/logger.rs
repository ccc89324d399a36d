//! Named loggers arranged in a dotted hierarchy.
//!
//! `app.db` is a child of `app`, which is a child of the root logger. An
//! event accepted by a logger's level is handed to its handlers and, while
//! `propagate` is set, to the handlers of each ancestor in turn.

use crate::handler::{HandleOutcome, Handler};
use jsonlog_shared::models::{CallSite, ExceptionInfo, LogEvent, LogLevel};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Name of the root logger.
pub const ROOT_LOGGER: &str = "root";

/// Minimum severity a logger lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Events at or above this level pass.
    Level(LogLevel),
    /// Nothing passes.
    Off,
}

impl LevelFilter {
    /// Returns true if an event at `level` passes.
    #[must_use]
    pub fn allows(self, level: LogLevel) -> bool {
        match self {
            Self::Level(min) => level >= min,
            Self::Off => false,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        Self::Level(level)
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(level) => write!(f, "{level}"),
            Self::Off => f.write_str("OFF"),
        }
    }
}

/// A named logger.
///
/// Loggers are created through [`LoggerRegistry::get_logger`](crate::LoggerRegistry::get_logger)
/// and shared as `Arc<Logger>`.
pub struct Logger {
    name: String,
    parent: Option<Arc<Logger>>,
    level: RwLock<Option<LevelFilter>>,
    handlers: RwLock<Vec<Arc<Handler>>>,
    propagate: AtomicBool,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("handlers", &self.handler_count())
            .field("propagate", &self.propagate())
            .finish()
    }
}

impl Logger {
    fn new(name: impl Into<String>, parent: Option<Arc<Logger>>, level: Option<LevelFilter>) -> Self {
        Self {
            name: name.into(),
            parent,
            level: RwLock::new(level),
            handlers: RwLock::new(Vec::new()),
            propagate: AtomicBool::new(true),
        }
    }

    /// Returns the dotted name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent logger, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Logger>> {
        self.parent.as_ref()
    }

    /// Returns the level set on this logger, if any.
    #[must_use]
    pub fn level(&self) -> Option<LevelFilter> {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets this logger's level.
    pub fn set_level(&self, level: impl Into<LevelFilter>) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = Some(level.into());
    }

    /// Removes this logger's level so it inherits from its ancestors.
    pub fn reset_level(&self) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns the first level set on this logger or an ancestor.
    #[must_use]
    pub fn effective_level(&self) -> LevelFilter {
        let mut current = Some(self);
        while let Some(logger) = current {
            if let Some(level) = logger.level() {
                return level;
            }
            current = logger.parent.as_deref();
        }
        LevelFilter::Level(LogLevel::Warning)
    }

    /// Returns true if an event at `level` would be dispatched.
    #[must_use]
    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        self.effective_level().allows(level)
    }

    /// Returns whether events continue to ancestor handlers.
    #[must_use]
    pub fn propagate(&self) -> bool {
        self.propagate.load(Ordering::Acquire)
    }

    /// Sets whether events continue to ancestor handlers.
    pub fn set_propagate(&self, propagate: bool) {
        self.propagate.store(propagate, Ordering::Release);
    }

    /// Attaches a handler.
    pub fn add_handler(&self, handler: Arc<Handler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Returns true if this logger has its own handlers.
    #[must_use]
    pub fn has_handlers(&self) -> bool {
        self.handler_count() > 0
    }

    /// Returns the number of handlers attached to this logger.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the attached handlers.
    #[must_use]
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Detaches and returns all handlers.
    pub fn clear_handlers(&self) -> Vec<Arc<Handler>> {
        std::mem::take(&mut *self.handlers.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Dispatches an event to this logger's handlers and, while propagation
    /// allows, to its ancestors' handlers.
    ///
    /// Events below the effective level are discarded without reaching any
    /// handler. An empty logger name is replaced by this logger's name.
    pub fn log(&self, mut event: LogEvent) -> Vec<HandleOutcome> {
        if !self.is_enabled_for(event.level) {
            return Vec::new();
        }
        if event.logger_name.is_empty() {
            event.logger_name.clone_from(&self.name);
        }

        let mut outcomes = Vec::new();
        let mut current = Some(self);
        while let Some(logger) = current {
            for handler in logger.handlers.read().unwrap_or_else(PoisonError::into_inner).iter() {
                outcomes.push(handler.handle(&event));
            }
            if !logger.propagate() {
                break;
            }
            current = logger.parent.as_deref();
        }
        outcomes
    }

    #[track_caller]
    fn emit(&self, level: LogLevel, message: String) {
        if self.is_enabled_for(level) {
            self.log(LogEvent::new(level, message).with_call_site(CallSite::caller()));
        }
    }

    /// Logs a message at DEBUG.
    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message.into());
    }

    /// Logs a message at INFO.
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into());
    }

    /// Logs a message at WARNING.
    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warning, message.into());
    }

    /// Logs a message at ERROR.
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into());
    }

    /// Logs a message at CRITICAL.
    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.emit(LogLevel::Critical, message.into());
    }

    /// Logs a message at ERROR with an error and its cause chain attached.
    #[track_caller]
    pub fn exception<E>(&self, message: impl Into<String>, err: &E)
    where
        E: std::error::Error + ?Sized,
    {
        if self.is_enabled_for(LogLevel::Error) {
            self.log(
                LogEvent::new(LogLevel::Error, message)
                    .with_exception(ExceptionInfo::from_error(err))
                    .with_call_site(CallSite::caller()),
            );
        }
    }
}

/// The table of named loggers below one root.
#[derive(Debug)]
pub(crate) struct LoggerTree {
    root: Arc<Logger>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
}

impl LoggerTree {
    pub(crate) fn new() -> Self {
        Self {
            root: Arc::new(Logger::new(
                ROOT_LOGGER,
                None,
                Some(LevelFilter::Level(LogLevel::Warning)),
            )),
            loggers: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn root(&self) -> Arc<Logger> {
        Arc::clone(&self.root)
    }

    /// Returns the named logger, creating it and any missing ancestors.
    pub(crate) fn get(&self, name: &str) -> Arc<Logger> {
        if name.is_empty() || name == ROOT_LOGGER {
            return self.root();
        }
        if let Some(logger) = self
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(logger);
        }

        let mut loggers = self.loggers.write().unwrap_or_else(PoisonError::into_inner);
        let mut parent = self.root();
        let mut end = 0;
        for segment in name.split('.') {
            end += segment.len();
            let prefix = &name[..end];
            let logger = loggers
                .entry(prefix.to_string())
                .or_insert_with(|| Arc::new(Logger::new(prefix, Some(Arc::clone(&parent)), None)));
            parent = Arc::clone(logger);
            end += 1;
        }
        parent
    }

    pub(crate) fn all(&self) -> Vec<Arc<Logger>> {
        let mut all: Vec<Arc<Logger>> = self
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.push(self.root());
        all
    }
}
