//! Loggers of external components.
//!
//! Dependencies log under their crate names (through the `tracing` bridge
//! `sqlx::query` becomes `sqlx.query`). Each group below can be taken over
//! by the structured pipeline, left alone, or, for the noisy ones, silenced.

use jsonlog_shared::models::LogLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A family of external loggers configured together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentGroup {
    /// HTTP servers and their access/error logs.
    WebServer,
    /// Process supervisors and worker managers.
    ProcessManager,
    /// HTTP clients, TLS and protocol libraries.
    Libraries,
    /// Database access layers.
    Orm,
    /// LLM agent frameworks.
    AgentFramework,
}

impl ComponentGroup {
    /// All groups in setup order.
    pub const ALL: [ComponentGroup; 5] = [
        Self::WebServer,
        Self::ProcessManager,
        Self::Libraries,
        Self::Orm,
        Self::AgentFramework,
    ];

    /// Returns the group's name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebServer => "web_server",
            Self::ProcessManager => "process_manager",
            Self::Libraries => "libraries",
            Self::Orm => "orm",
            Self::AgentFramework => "agent_framework",
        }
    }

    /// Returns the logger names covered by default.
    #[must_use]
    pub fn default_loggers(self) -> &'static [&'static str] {
        match self {
            Self::WebServer => &["hyper", "axum", "tower_http", "actix_web"],
            Self::ProcessManager => &["actix_server", "tokio_util"],
            Self::Libraries => &["reqwest", "h2", "rustls", "tungstenite"],
            Self::Orm => &["sqlx", "sqlx.query", "diesel", "sea_orm"],
            Self::AgentFramework => &["rig", "langchain_rust", "async_openai"],
        }
    }

    /// Returns true if the group is taken over unless configured otherwise.
    #[must_use]
    pub fn enabled_by_default(self) -> bool {
        matches!(self, Self::WebServer | Self::Libraries)
    }

    /// Returns true if disabling the group silences its loggers instead of
    /// leaving them untouched.
    #[must_use]
    pub fn silenced_when_disabled(self) -> bool {
        matches!(self, Self::Orm | Self::AgentFramework)
    }

    /// Returns the group's fixed default level, if it has one.
    ///
    /// Groups without one use the resolved application level.
    #[must_use]
    pub fn default_level(self) -> Option<LogLevel> {
        if self.silenced_when_disabled() {
            Some(LogLevel::Warning)
        } else {
            None
        }
    }
}

impl fmt::Display for ComponentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one component group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSettings {
    /// Whether the group's loggers get the structured pipeline.
    pub enabled: bool,
    /// Logger names in the group.
    pub loggers: Vec<String>,
    /// Level for the group's loggers.
    pub level: Option<LogLevel>,
}

impl ComponentSettings {
    /// Returns the default settings of a group.
    #[must_use]
    pub fn defaults(group: ComponentGroup) -> Self {
        Self {
            enabled: group.enabled_by_default(),
            loggers: group
                .default_loggers()
                .iter()
                .map(ToString::to_string)
                .collect(),
            level: group.default_level(),
        }
    }
}

/// Settings for every component group.
///
/// # Example
///
/// ```
/// use jsonlog::components::{ComponentConfig, ComponentGroup};
/// use jsonlog_shared::models::LogLevel;
///
/// let config = ComponentConfig::default()
///     .enable(ComponentGroup::Orm, true)
///     .with_level(ComponentGroup::Orm, LogLevel::Info);
///
/// assert!(config.settings(ComponentGroup::Orm).enabled);
/// assert!(config.settings(ComponentGroup::WebServer).enabled);
/// assert!(!config.settings(ComponentGroup::AgentFramework).enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Web servers.
    pub web_server: ComponentSettings,
    /// Process managers.
    pub process_manager: ComponentSettings,
    /// Generic libraries.
    pub libraries: ComponentSettings,
    /// Database layers.
    pub orm: ComponentSettings,
    /// Agent frameworks.
    pub agent_framework: ComponentSettings,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            web_server: ComponentSettings::defaults(ComponentGroup::WebServer),
            process_manager: ComponentSettings::defaults(ComponentGroup::ProcessManager),
            libraries: ComponentSettings::defaults(ComponentGroup::Libraries),
            orm: ComponentSettings::defaults(ComponentGroup::Orm),
            agent_framework: ComponentSettings::defaults(ComponentGroup::AgentFramework),
        }
    }
}

impl ComponentConfig {
    /// Returns the settings of a group.
    #[must_use]
    pub fn settings(&self, group: ComponentGroup) -> &ComponentSettings {
        match group {
            ComponentGroup::WebServer => &self.web_server,
            ComponentGroup::ProcessManager => &self.process_manager,
            ComponentGroup::Libraries => &self.libraries,
            ComponentGroup::Orm => &self.orm,
            ComponentGroup::AgentFramework => &self.agent_framework,
        }
    }

    fn settings_mut(&mut self, group: ComponentGroup) -> &mut ComponentSettings {
        match group {
            ComponentGroup::WebServer => &mut self.web_server,
            ComponentGroup::ProcessManager => &mut self.process_manager,
            ComponentGroup::Libraries => &mut self.libraries,
            ComponentGroup::Orm => &mut self.orm,
            ComponentGroup::AgentFramework => &mut self.agent_framework,
        }
    }

    /// Enables or disables a group.
    #[must_use]
    pub fn enable(mut self, group: ComponentGroup, enabled: bool) -> Self {
        self.settings_mut(group).enabled = enabled;
        self
    }

    /// Sets a group's level.
    #[must_use]
    pub fn with_level(mut self, group: ComponentGroup, level: LogLevel) -> Self {
        self.settings_mut(group).level = Some(level);
        self
    }

    /// Replaces a group's logger names.
    #[must_use]
    pub fn with_loggers<I, S>(mut self, group: ComponentGroup, loggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings_mut(group).loggers = loggers.into_iter().map(Into::into).collect();
        self
    }
}
