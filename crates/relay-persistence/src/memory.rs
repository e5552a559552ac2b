//! In-memory store for tests and ephemeral runs.
//!
//! Implements every store trait over hash maps behind one `RwLock`, so a
//! single write lock covers each read-modify-write.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use relay_models::{
    merge_metadata, Codebase, CodebaseId, CommandEntry, CommandTemplate, Conversation,
    ConversationId, ConversationUpdate, NewCodebase, NewConversation, NewMessage, NewSession,
    PlatformType, Session, SessionId, SessionMetadata, StoredMessage,
};

use crate::error::{PersistenceError, Result};
use crate::store::{CodebaseStore, ConversationStore, MessageStore, SessionStore, TemplateStore};

#[derive(Default)]
struct Tables {
    conversations: HashMap<ConversationId, Conversation>,
    sessions: HashMap<SessionId, Session>,
    codebases: HashMap<CodebaseId, Codebase>,
    templates: BTreeMap<String, CommandTemplate>,
    messages: Vec<StoredMessage>,
}

/// Volatile implementation of all Relay stores.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions of a conversation, in creation order.
    pub async fn sessions_for(&self, conversation_id: &ConversationId) -> Vec<Session> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| &s.conversation_id == conversation_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Every stored audit message, in insertion order.
    pub async fn all_messages(&self) -> Vec<StoredMessage> {
        self.tables.read().await.messages.clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get_or_create_conversation(&self, new: NewConversation) -> Result<Conversation> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.conversations.values().find(|c| {
            c.platform_type == new.platform_type
                && c.platform_conversation_id == new.platform_conversation_id
        }) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::new(),
            platform_type: new.platform_type,
            platform_conversation_id: new.platform_conversation_id,
            codebase_id: new.codebase_id,
            cwd: None,
            worktree_path: None,
            ai_assistant_type: new.ai_assistant_type,
            parent_conversation_id: new.parent_conversation_id,
            created_at: now,
            updated_at: now,
        };
        debug!(id = %conversation.id, platform = %conversation.platform_type, "Created conversation");
        tables
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation_by_platform_id(
        &self,
        platform_type: PlatformType,
        platform_conversation_id: &str,
    ) -> Result<Option<Conversation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .values()
            .find(|c| {
                c.platform_type == platform_type
                    && c.platform_conversation_id == platform_conversation_id
            })
            .cloned())
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: ConversationUpdate,
    ) -> Result<Conversation> {
        let mut tables = self.tables.write().await;
        let conversation = tables
            .conversations
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("conversation", id))?;
        update.apply_to(conversation);
        Ok(conversation.clone())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_active_session(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.active && &s.conversation_id == conversation_id)
            .cloned())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn create_session(&self, new: NewSession) -> Result<Session> {
        let mut tables = self.tables.write().await;
        if tables
            .sessions
            .values()
            .any(|s| s.active && s.conversation_id == new.conversation_id)
        {
            return Err(PersistenceError::Conflict(format!(
                "conversation {} already has an active session",
                new.conversation_id
            )));
        }

        let session = Session::from_new(new);
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn update_session(&self, id: &SessionId, assistant_session_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("session", id))?;
        session.assistant_session_id = Some(assistant_session_id.to_string());
        Ok(())
    }

    async fn update_session_metadata(
        &self,
        id: &SessionId,
        patch: SessionMetadata,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("session", id))?;
        merge_metadata(&mut session.metadata, patch);
        Ok(())
    }

    async fn deactivate_session(&self, id: &SessionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("session", id))?;
        if session.active {
            session.active = false;
            session.ended_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl CodebaseStore for MemoryStore {
    async fn get_codebase(&self, id: &CodebaseId) -> Result<Option<Codebase>> {
        Ok(self.tables.read().await.codebases.get(id).cloned())
    }

    async fn find_codebase_by_name(&self, name: &str) -> Result<Option<Codebase>> {
        let tables = self.tables.read().await;
        Ok(tables.codebases.values().find(|c| c.name == name).cloned())
    }

    async fn list_codebases(&self) -> Result<Vec<Codebase>> {
        let tables = self.tables.read().await;
        let mut codebases: Vec<Codebase> = tables.codebases.values().cloned().collect();
        codebases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(codebases)
    }

    async fn create_codebase(&self, new: NewCodebase) -> Result<Codebase> {
        let mut tables = self.tables.write().await;
        if tables.codebases.values().any(|c| c.name == new.name) {
            return Err(PersistenceError::Conflict(format!(
                "codebase {} already exists",
                new.name
            )));
        }
        let codebase = new.into_codebase();
        tables.codebases.insert(codebase.id.clone(), codebase.clone());
        Ok(codebase)
    }

    async fn update_codebase_commands(
        &self,
        id: &CodebaseId,
        commands: BTreeMap<String, CommandEntry>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let codebase = tables
            .codebases
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("codebase", id))?;
        codebase.commands = commands;
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, name: &str) -> Result<Option<CommandTemplate>> {
        Ok(self.tables.read().await.templates.get(name).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<CommandTemplate>> {
        Ok(self.tables.read().await.templates.values().cloned().collect())
    }

    async fn upsert_template(&self, template: CommandTemplate) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.templates.insert(template.name.clone(), template);
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> Result<bool> {
        Ok(self.tables.write().await.templates.remove(name).is_some())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.messages.push(StoredMessage::from_new(message));
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let tables = self.tables.read().await;
        let matching: Vec<&StoredMessage> = tables
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_models::MessageRole;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let first = store
            .get_or_create_conversation(NewConversation::new(PlatformType::Telegram, "42", "claude"))
            .await
            .unwrap();
        let second = store
            .get_or_create_conversation(NewConversation::new(PlatformType::Telegram, "42", "codex"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.ai_assistant_type, "claude");

        let other_platform = store
            .get_or_create_conversation(NewConversation::new(PlatformType::Slack, "42", "claude"))
            .await
            .unwrap();
        assert_ne!(first.id, other_platform.id);
    }

    #[tokio::test]
    async fn test_second_active_session_is_rejected() {
        let store = MemoryStore::new();
        let conv = ConversationId::new();
        let first = store
            .create_session(NewSession::new(conv.clone(), None, "claude"))
            .await
            .unwrap();

        let err = store
            .create_session(NewSession::new(conv.clone(), None, "claude"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));

        store.deactivate_session(&first.id).await.unwrap();
        let second = store
            .create_session(NewSession::new(conv.clone(), None, "claude"))
            .await
            .unwrap();
        assert_eq!(
            store.get_active_session(&conv).await.unwrap().map(|s| s.id),
            Some(second.id)
        );

        let ended = store.get_session(&first.id).await.unwrap().unwrap();
        assert!(!ended.active);
        assert!(ended.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_recent_messages_keeps_tail_in_order() {
        let store = MemoryStore::new();
        let conv = ConversationId::new();
        for i in 0..5 {
            store
                .create_message(NewMessage {
                    conversation_id: conv.clone(),
                    platform_type: PlatformType::Cli,
                    codebase_id: None,
                    codebase_name: None,
                    role: MessageRole::User,
                    text: format!("m{}", i),
                    image_meta: None,
                })
                .await
                .unwrap();
        }

        let recent = store.recent_messages(&conv, 2).await.unwrap();
        let texts: Vec<&str> = recent.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);
    }
}
