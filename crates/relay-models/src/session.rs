//! Assistant session types.
//!
//! A session is one continuous assistant dialogue bound to a conversation.
//! Its metadata is an open JSON map; the keys the orchestrator relies on are
//! exposed as constants with typed accessors on [`Session`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::ids::{CodebaseId, ConversationId, SessionId};

/// Command that ran on the previous turn.
pub const LAST_COMMAND: &str = "lastCommand";
/// Fingerprint of the external tool configuration the session was opened with.
pub const MCP_CONFIG_HASH: &str = "mcpConfigHash";
/// Set when a history block must be replayed on the next turn.
pub const RESUMED_WITH_HISTORY: &str = "resumedWithHistory";
/// The history block to replay.
pub const HISTORY_CONTEXT: &str = "historyContext";

/// Open key-value metadata attached to a session.
pub type SessionMetadata = Map<String, Value>;

/// One continuous assistant dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub conversation_id: ConversationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codebase_id: Option<CodebaseId>,
    pub ai_assistant_type: String,
    /// Remote handle returned by the assistant, used to resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_session_id: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub metadata: SessionMetadata,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Build a fresh active session from creation parameters.
    pub fn from_new(new: NewSession) -> Self {
        Self {
            id: SessionId::new(),
            conversation_id: new.conversation_id,
            codebase_id: new.codebase_id,
            ai_assistant_type: new.ai_assistant_type,
            assistant_session_id: None,
            active: true,
            metadata: new.metadata,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn last_command(&self) -> Option<&str> {
        self.metadata.get(LAST_COMMAND).and_then(Value::as_str)
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.metadata.get(MCP_CONFIG_HASH).and_then(Value::as_str)
    }

    /// String-valued metadata keyed for template placeholders:
    /// `lastCommand` becomes `LAST_COMMAND`, `plan` becomes `PLAN`.
    pub fn placeholder_values(&self) -> HashMap<String, String> {
        self.metadata
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_str()
                    .map(|v| (screaming_snake_case(key), v.to_string()))
            })
            .collect()
    }

    /// History block pending replay, if the session was resumed with one.
    pub fn pending_history(&self) -> Option<&str> {
        let resumed = self
            .metadata
            .get(RESUMED_WITH_HISTORY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !resumed {
            return None;
        }
        self.metadata
            .get(HISTORY_CONTEXT)
            .and_then(Value::as_str)
            .filter(|h| !h.trim().is_empty())
    }
}

/// Parameters for creating a session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub conversation_id: ConversationId,
    pub codebase_id: Option<CodebaseId>,
    pub ai_assistant_type: String,
    pub metadata: SessionMetadata,
}

impl NewSession {
    pub fn new(
        conversation_id: ConversationId,
        codebase_id: Option<CodebaseId>,
        ai_assistant_type: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            codebase_id,
            ai_assistant_type: ai_assistant_type.into(),
            metadata: SessionMetadata::new(),
        }
    }

    /// Stamp the tool configuration fingerprint.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.metadata
            .insert(MCP_CONFIG_HASH.to_string(), Value::String(hash.into()));
        self
    }

    /// Carry a history block to replay on the first turn.
    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.metadata
            .insert(RESUMED_WITH_HISTORY.to_string(), Value::Bool(true));
        self.metadata
            .insert(HISTORY_CONTEXT.to_string(), Value::String(history.into()));
        self
    }
}

fn screaming_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Merge a metadata patch into existing metadata.
///
/// Keys are replaced one by one; a `null` value removes the key.
pub fn merge_metadata(target: &mut SessionMetadata, patch: SessionMetadata) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Patch that records the command run on this turn.
pub fn last_command_patch(command: &str) -> SessionMetadata {
    let mut patch = SessionMetadata::new();
    patch.insert(LAST_COMMAND.to_string(), Value::String(command.to_string()));
    patch
}

/// Patch that records the tool configuration fingerprint.
pub fn config_hash_patch(hash: &str) -> SessionMetadata {
    let mut patch = SessionMetadata::new();
    patch.insert(MCP_CONFIG_HASH.to_string(), Value::String(hash.to_string()));
    patch
}

/// Patch that clears a replayed history block.
pub fn clear_history_patch() -> SessionMetadata {
    let mut patch = SessionMetadata::new();
    patch.insert(RESUMED_WITH_HISTORY.to_string(), Value::Bool(false));
    patch.insert(HISTORY_CONTEXT.to_string(), Value::Null);
    patch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::from_new(NewSession::new(
            ConversationId::from_string("conv-1"),
            None,
            "claude",
        ))
    }

    #[test]
    fn test_new_session_is_active() {
        let s = session();
        assert!(s.active);
        assert!(s.assistant_session_id.is_none());
        assert!(s.ended_at.is_none());
        assert!(s.last_command().is_none());
    }

    #[test]
    fn test_placeholder_values() {
        let mut s = session();
        s.metadata
            .insert("implementationSummary".to_string(), Value::from("Added OAuth"));
        s.metadata.insert(LAST_COMMAND.to_string(), Value::from("plan-feature"));
        s.metadata.insert("plan".to_string(), Value::from("1. login"));
        s.metadata.insert(RESUMED_WITH_HISTORY.to_string(), Value::Bool(true));

        let values = s.placeholder_values();
        assert_eq!(values.get("IMPLEMENTATION_SUMMARY").map(String::as_str), Some("Added OAuth"));
        assert_eq!(values.get("LAST_COMMAND").map(String::as_str), Some("plan-feature"));
        assert_eq!(values.get("PLAN").map(String::as_str), Some("1. login"));
        assert!(!values.contains_key("RESUMED_WITH_HISTORY"));
    }

    #[test]
    fn test_metadata_accessors() {
        let s = Session::from_new(
            NewSession::new(ConversationId::new(), None, "codex")
                .with_config_hash("abc")
                .with_history("user: hi"),
        );
        assert_eq!(s.config_hash(), Some("abc"));
        assert_eq!(s.pending_history(), Some("user: hi"));
    }

    #[test]
    fn test_pending_history_requires_flag_and_content() {
        let mut s = session();
        s.metadata
            .insert(HISTORY_CONTEXT.to_string(), Value::String("x".into()));
        assert_eq!(s.pending_history(), None);

        s.metadata
            .insert(RESUMED_WITH_HISTORY.to_string(), Value::Bool(true));
        s.metadata
            .insert(HISTORY_CONTEXT.to_string(), Value::String("   ".into()));
        assert_eq!(s.pending_history(), None);
    }

    #[test]
    fn test_merge_replaces_and_removes() {
        let mut s = session();
        merge_metadata(&mut s.metadata, last_command_patch("plan-feature"));
        assert_eq!(s.last_command(), Some("plan-feature"));

        merge_metadata(&mut s.metadata, last_command_patch("execute"));
        assert_eq!(s.last_command(), Some("execute"));

        s.metadata = NewSession::new(ConversationId::new(), None, "claude")
            .with_history("old turns")
            .metadata;
        merge_metadata(&mut s.metadata, clear_history_patch());
        assert_eq!(s.pending_history(), None);
        assert!(!s.metadata.contains_key(HISTORY_CONTEXT));
        assert_eq!(s.metadata.get(RESUMED_WITH_HISTORY), Some(&Value::Bool(false)));
    }
}
