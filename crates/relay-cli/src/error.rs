//! Error types for the terminal client.

use thiserror::Error;

use relay_core::ConfigError;
use relay_orchestrator::OrchestratorError;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Line editor failure.
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Orchestrator setup failed.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
