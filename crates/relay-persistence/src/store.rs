//! Store traits consumed by the orchestrator.
//!
//! Each trait covers one table-shaped concern. Implementations must make
//! every call atomic at the row level; the orchestrator relies on that and
//! on nothing stronger.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use relay_models::{
    Codebase, CodebaseId, CommandEntry, CommandTemplate, Conversation, ConversationId,
    ConversationUpdate, NewCodebase, NewConversation, NewMessage, NewSession, PlatformType,
    Session, SessionId, SessionMetadata, StoredMessage,
};

use crate::error::Result;

/// Conversations keyed by `(platform_type, platform_conversation_id)`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the conversation for the platform thread, creating it if needed.
    async fn get_or_create_conversation(&self, new: NewConversation) -> Result<Conversation>;

    /// Look up a conversation by its platform identity.
    async fn get_conversation_by_platform_id(
        &self,
        platform_type: PlatformType,
        platform_conversation_id: &str,
    ) -> Result<Option<Conversation>>;

    /// Apply a partial update and return the stored row.
    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: ConversationUpdate,
    ) -> Result<Conversation>;
}

/// Assistant sessions.
///
/// Implementations reject creating a second active session for the same
/// conversation with [`PersistenceError::Conflict`](crate::PersistenceError::Conflict).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_active_session(&self, conversation_id: &ConversationId)
        -> Result<Option<Session>>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>>;

    async fn create_session(&self, new: NewSession) -> Result<Session>;

    /// Record the assistant's remote session handle.
    async fn update_session(&self, id: &SessionId, assistant_session_id: &str) -> Result<()>;

    /// Merge a metadata patch (`null` removes a key).
    async fn update_session_metadata(&self, id: &SessionId, patch: SessionMetadata)
        -> Result<()>;

    /// Mark the session inactive and stamp its end time. Idempotent.
    async fn deactivate_session(&self, id: &SessionId) -> Result<()>;
}

/// Registered projects.
#[async_trait]
pub trait CodebaseStore: Send + Sync {
    async fn get_codebase(&self, id: &CodebaseId) -> Result<Option<Codebase>>;

    async fn find_codebase_by_name(&self, name: &str) -> Result<Option<Codebase>>;

    async fn list_codebases(&self) -> Result<Vec<Codebase>>;

    async fn create_codebase(&self, new: NewCodebase) -> Result<Codebase>;

    /// Replace the command map of a codebase.
    async fn update_codebase_commands(
        &self,
        id: &CodebaseId,
        commands: BTreeMap<String, CommandEntry>,
    ) -> Result<()>;
}

/// Global command templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, name: &str) -> Result<Option<CommandTemplate>>;

    async fn list_templates(&self) -> Result<Vec<CommandTemplate>>;

    /// Insert or replace a template by name.
    async fn upsert_template(&self, template: CommandTemplate) -> Result<()>;

    /// Remove a template. Returns false when it did not exist.
    async fn delete_template(&self, name: &str) -> Result<bool>;
}

/// Append-only audit history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: NewMessage) -> Result<()>;

    /// The last `limit` messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;
}

/// Bundle of store handles passed to the orchestrator.
#[derive(Clone)]
pub struct Stores {
    pub conversations: Arc<dyn ConversationStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub codebases: Arc<dyn CodebaseStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl Stores {
    /// Use one backend for every concern.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: ConversationStore + SessionStore + CodebaseStore + TemplateStore + MessageStore + 'static,
    {
        Self {
            conversations: backend.clone(),
            sessions: backend.clone(),
            codebases: backend.clone(),
            templates: backend.clone(),
            messages: backend,
        }
    }
}
