//! Error types for assistant clients.

use thiserror::Error;

/// Errors raised while running an assistant.
#[derive(Error, Debug)]
pub enum AssistantError {
    /// The assistant binary is not on `PATH`.
    #[error("assistant binary not found: {binary}")]
    NotInstalled { binary: String },

    /// Unknown assistant tag.
    #[error("unknown assistant type: {0}")]
    UnknownKind(String),

    /// Failed to launch the assistant process.
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The assistant reported rate limiting or exhausted quota.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The assistant is not logged in or its credentials were rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The assistant process failed or reported an error.
    #[error("assistant failed: {0}")]
    Process(String),
}

impl AssistantError {
    /// Pick the most specific variant for a raw error message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("rate limit") || lower.contains("quota") || lower.contains("429") {
            Self::RateLimited(message)
        } else if lower.contains("unauthorized")
            || lower.contains("authentication")
            || lower.contains("api key")
            || lower.contains("not logged in")
            || lower.contains("401")
        {
            Self::Authentication(message)
        } else {
            Self::Process(message)
        }
    }
}

/// Result type alias for assistant operations.
pub type Result<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message() {
        assert!(matches!(
            AssistantError::from_message("Error: Rate limit exceeded"),
            AssistantError::RateLimited(_)
        ));
        assert!(matches!(
            AssistantError::from_message("Invalid API key provided"),
            AssistantError::Authentication(_)
        ));
        assert!(matches!(
            AssistantError::from_message("segfault"),
            AssistantError::Process(_)
        ));
    }
}
