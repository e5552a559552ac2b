//! Core data models for Relay.
//!
//! This crate provides the record types shared by every Relay crate:
//! conversations, assistant sessions, codebases, command templates, audit
//! messages and the chunks an assistant streams back.

pub mod chunk;
pub mod codebase;
pub mod conversation;
pub mod ids;
pub mod message;
pub mod session;

use thiserror::Error;

// Re-export main types
pub use chunk::{ImageAttachment, MessageChunk};
pub use codebase::{Codebase, CommandEntry, CommandTemplate, NewCodebase};
pub use conversation::{
    Conversation, ConversationUpdate, NewConversation, PlatformType, StreamingMode,
};
pub use ids::{CodebaseId, ConversationId, MessageId, SessionId};
pub use message::{MessageRole, NewMessage, StoredMessage};
pub use session::{
    clear_history_patch, config_hash_patch, last_command_patch, merge_metadata, NewSession,
    Session, SessionMetadata, HISTORY_CONTEXT, LAST_COMMAND, MCP_CONFIG_HASH,
    RESUMED_WITH_HISTORY,
};

/// Errors raised while parsing model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown platform type: {0}")]
    UnknownPlatform(String),

    #[error("unknown streaming mode: {0} (expected stream or batch)")]
    UnknownStreamingMode(String),
}
