//! The closed set of supported assistants.

use std::fmt;
use std::str::FromStr;

use crate::error::AssistantError;

/// Which assistant backs a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistantKind {
    Claude,
    Codex,
}

impl AssistantKind {
    pub const ALL: [AssistantKind; 2] = [AssistantKind::Claude, AssistantKind::Codex];

    /// Tag stored on conversations and sessions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }
}

impl fmt::Display for AssistantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistantKind {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            other => Err(AssistantError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_tags() {
        for kind in AssistantKind::ALL {
            assert_eq!(kind.as_str().parse::<AssistantKind>().unwrap(), kind);
        }
        assert_eq!(" Claude ".parse::<AssistantKind>().unwrap(), AssistantKind::Claude);
        assert!("gemini".parse::<AssistantKind>().is_err());
    }
}
