//! Audit-trail messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversation::PlatformType;
use crate::ids::{CodebaseId, ConversationId, MessageId};

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message to append to the audit history.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub platform_type: PlatformType,
    pub codebase_id: Option<CodebaseId>,
    pub codebase_name: Option<String>,
    pub role: MessageRole,
    pub text: String,
    /// Image descriptions (paths and mime types) serialized as JSON.
    pub image_meta: Option<serde_json::Value>,
}

/// A message read back from the audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub platform_type: PlatformType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codebase_id: Option<CodebaseId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codebase_name: Option<String>,
    pub role: MessageRole,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn from_new(new: NewMessage) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id: new.conversation_id,
            platform_type: new.platform_type,
            codebase_id: new.codebase_id,
            codebase_name: new.codebase_name,
            role: new.role,
            text: new.text,
            image_meta: new.image_meta,
            created_at: Utc::now(),
        }
    }
}
