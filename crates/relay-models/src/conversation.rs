//! Conversation types.
//!
//! A conversation is the durable identity of one platform thread (a Telegram
//! chat or forum topic, a Slack thread, a CLI workspace) together with the
//! working context the assistant runs in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{CodebaseId, ConversationId};
use crate::ModelError;

/// Chat platform a conversation originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    Telegram,
    Slack,
    Github,
    Discord,
    Cli,
    Web,
}

impl PlatformType {
    /// Stable lowercase tag used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Slack => "slack",
            Self::Github => "github",
            Self::Discord => "discord",
            Self::Cli => "cli",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "slack" => Ok(Self::Slack),
            "github" => Ok(Self::Github),
            "discord" => Ok(Self::Discord),
            "cli" => Ok(Self::Cli),
            "web" => Ok(Self::Web),
            other => Err(ModelError::UnknownPlatform(other.to_string())),
        }
    }
}

/// How a platform wants assistant output delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingMode {
    /// Forward every fragment as soon as it arrives.
    #[default]
    Stream,
    /// Collect the whole response and send one cleaned summary.
    Batch,
}

impl FromStr for StreamingMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "batch" => Ok(Self::Batch),
            other => Err(ModelError::UnknownStreamingMode(other.to_string())),
        }
    }
}

/// Durable mapping from a platform thread to its working context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub platform_type: PlatformType,
    /// Platform-specific thread identifier, unique per platform.
    pub platform_conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codebase_id: Option<CodebaseId>,
    /// Working directory override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Worktree checkout; wins over `cwd` when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,
    pub ai_assistant_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The conversation-level working directory: worktree first, then cwd.
    pub fn working_dir(&self) -> Option<&str> {
        self.worktree_path.as_deref().or(self.cwd.as_deref())
    }
}

/// Parameters for a lazily created conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversation {
    pub platform_type: PlatformType,
    pub platform_conversation_id: String,
    pub ai_assistant_type: String,
    pub codebase_id: Option<CodebaseId>,
    pub parent_conversation_id: Option<String>,
}

impl NewConversation {
    /// Create parameters for a conversation with no codebase or parent.
    pub fn new(
        platform_type: PlatformType,
        platform_conversation_id: impl Into<String>,
        ai_assistant_type: impl Into<String>,
    ) -> Self {
        Self {
            platform_type,
            platform_conversation_id: platform_conversation_id.into(),
            ai_assistant_type: ai_assistant_type.into(),
            codebase_id: None,
            parent_conversation_id: None,
        }
    }

    /// Attach the parent thread identifier.
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent_conversation_id = parent;
        self
    }

    /// Attach an initial codebase.
    pub fn with_codebase(mut self, codebase_id: Option<CodebaseId>) -> Self {
        self.codebase_id = codebase_id;
        self
    }
}

/// Partial update of a conversation.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationUpdate {
    pub codebase_id: Option<Option<CodebaseId>>,
    pub cwd: Option<Option<String>>,
    pub worktree_path: Option<Option<String>>,
    pub ai_assistant_type: Option<String>,
}

impl ConversationUpdate {
    pub fn codebase(mut self, codebase_id: Option<CodebaseId>) -> Self {
        self.codebase_id = Some(codebase_id);
        self
    }

    pub fn cwd(mut self, cwd: Option<String>) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn worktree(mut self, worktree_path: Option<String>) -> Self {
        self.worktree_path = Some(worktree_path);
        self
    }

    pub fn assistant(mut self, ai_assistant_type: impl Into<String>) -> Self {
        self.ai_assistant_type = Some(ai_assistant_type.into());
        self
    }

    /// True when the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self.codebase_id.is_none()
            && self.cwd.is_none()
            && self.worktree_path.is_none()
            && self.ai_assistant_type.is_none()
    }

    /// Apply this update to a conversation in place.
    pub fn apply_to(&self, conversation: &mut Conversation) {
        if let Some(codebase_id) = &self.codebase_id {
            conversation.codebase_id = codebase_id.clone();
        }
        if let Some(cwd) = &self.cwd {
            conversation.cwd = cwd.clone();
        }
        if let Some(worktree) = &self.worktree_path {
            conversation.worktree_path = worktree.clone();
        }
        if let Some(kind) = &self.ai_assistant_type {
            conversation.ai_assistant_type = kind.clone();
        }
        conversation.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation {
            id: ConversationId::from_string("conv-1"),
            platform_type: PlatformType::Telegram,
            platform_conversation_id: "42".to_string(),
            codebase_id: None,
            cwd: None,
            worktree_path: None,
            ai_assistant_type: "claude".to_string(),
            parent_conversation_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_platform_type_parse() {
        assert_eq!("telegram".parse::<PlatformType>().unwrap(), PlatformType::Telegram);
        assert_eq!("CLI".parse::<PlatformType>().unwrap(), PlatformType::Cli);
        assert!("irc".parse::<PlatformType>().is_err());
        assert_eq!(PlatformType::Github.to_string(), "github");
    }

    #[test]
    fn test_streaming_mode_parse() {
        assert_eq!("batch".parse::<StreamingMode>().unwrap(), StreamingMode::Batch);
        assert_eq!(" Stream ".parse::<StreamingMode>().unwrap(), StreamingMode::Stream);
        assert!("bulk".parse::<StreamingMode>().is_err());
    }

    #[test]
    fn test_worktree_wins_over_cwd() {
        let mut conv = conversation();
        assert_eq!(conv.working_dir(), None);

        conv.cwd = Some("/repo".to_string());
        assert_eq!(conv.working_dir(), Some("/repo"));

        conv.worktree_path = Some("/worktrees/feat".to_string());
        assert_eq!(conv.working_dir(), Some("/worktrees/feat"));
    }

    #[test]
    fn test_update_sets_and_clears() {
        let mut conv = conversation();
        conv.worktree_path = Some("/gone".to_string());

        let update = ConversationUpdate::default()
            .worktree(None)
            .cwd(Some("/repo".to_string()))
            .codebase(Some(CodebaseId::from_string("cb-1")));
        assert!(!update.is_empty());
        update.apply_to(&mut conv);

        assert_eq!(conv.worktree_path, None);
        assert_eq!(conv.cwd.as_deref(), Some("/repo"));
        assert_eq!(conv.codebase_id, Some(CodebaseId::from_string("cb-1")));
        assert_eq!(conv.ai_assistant_type, "claude");
    }
}
