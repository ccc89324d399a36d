//! Registry setup errors.

use jsonlog_shared::config::ConfigError;
use thiserror::Error;

/// Errors returned while configuring loggers.
///
/// Runtime failures (rejected events, sink errors) are never reported here;
/// see [`HandleOutcome`](crate::handler::HandleOutcome).
#[derive(Debug, Error)]
pub enum SetupError {
    /// The configuration violates an invariant.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global `tracing` subscriber is already installed.
    #[error("Failed to install tracing bridge: {0}")]
    TracingBridge(#[from] tracing_subscriber::util::TryInitError),

    /// The registry was shut down.
    #[error("Logger registry has been shut down")]
    ShutDown,
}
