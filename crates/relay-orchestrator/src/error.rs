//! Error types for the orchestrator and their user-facing rendering.

use thiserror::Error;

use relay_assistants::AssistantError;
use relay_persistence::PersistenceError;

/// Orchestrator-specific errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    /// Assistant error.
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A git invocation failed.
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// The platform could not deliver a message.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// User-visible error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Database,
    AiSession,
    RateLimit,
    Authentication,
    Filesystem,
    Unknown,
}

/// Map an error to the category reported to the user.
pub fn classify_error(error: &OrchestratorError) -> ErrorCategory {
    match error {
        OrchestratorError::Store(_) => ErrorCategory::Database,
        OrchestratorError::Assistant(AssistantError::RateLimited(_)) => ErrorCategory::RateLimit,
        OrchestratorError::Assistant(AssistantError::Authentication(_)) => {
            ErrorCategory::Authentication
        }
        OrchestratorError::Assistant(_) => ErrorCategory::AiSession,
        OrchestratorError::Io(_) | OrchestratorError::Git { .. } => ErrorCategory::Filesystem,
        OrchestratorError::Platform(_) | OrchestratorError::Configuration(_) => {
            ErrorCategory::Unknown
        }
    }
}

/// One short message for the platform. Never includes error details.
pub fn format_error(error: &OrchestratorError) -> String {
    let text = match classify_error(error) {
        ErrorCategory::Database => {
            "A database error occurred. Please try again in a moment."
        }
        ErrorCategory::AiSession => {
            "The AI assistant session failed. Try again, or use /reset to start a fresh session."
        }
        ErrorCategory::RateLimit => {
            "The AI assistant is rate limited. Please wait a few minutes and try again."
        }
        ErrorCategory::Authentication => {
            "The AI assistant could not authenticate. Check its credentials on the server."
        }
        ErrorCategory::Filesystem => {
            "A filesystem error occurred. Check the working directory with /getcwd."
        }
        ErrorCategory::Unknown => "An unexpected error occurred. Check the server logs.",
    };
    format!("\u{26A0}\u{FE0F} {}", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let db = OrchestratorError::Store(PersistenceError::LockPoisoned);
        assert_eq!(classify_error(&db), ErrorCategory::Database);

        let limited = OrchestratorError::Assistant(AssistantError::RateLimited("429".into()));
        assert_eq!(classify_error(&limited), ErrorCategory::RateLimit);

        let missing = OrchestratorError::Assistant(AssistantError::NotInstalled {
            binary: "claude".into(),
        });
        assert_eq!(classify_error(&missing), ErrorCategory::AiSession);

        let io = OrchestratorError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(classify_error(&io), ErrorCategory::Filesystem);

        let platform = OrchestratorError::Platform("timeout".into());
        assert_eq!(classify_error(&platform), ErrorCategory::Unknown);
    }

    #[test]
    fn test_format_error_hides_details() {
        let err = OrchestratorError::Assistant(AssistantError::Process(
            "secret token sk-123 at /home/me/.config".into(),
        ));
        let text = format_error(&err);
        assert!(!text.contains("sk-123"));
        assert!(!text.contains("/home/me"));
        assert!(text.contains("AI assistant session failed"));
        assert_eq!(text.lines().count(), 1);
    }
}
