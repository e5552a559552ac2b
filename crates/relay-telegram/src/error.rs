//! Error types for the Telegram adapter.

use thiserror::Error;

use relay_core::ConfigError;
use relay_orchestrator::OrchestratorError;

/// Errors that can occur in the Telegram adapter.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Telegram API request failed.
    #[error("Telegram API error: {0}")]
    Request(#[from] teloxide::RequestError),

    /// Attachment download failed.
    #[error("Download failed: {0}")]
    Download(#[from] teloxide::DownloadError),

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

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
