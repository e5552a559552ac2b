//! SQLite-backed store.
//!
//! One connection behind a mutex serves every store trait. Each call runs on
//! tokio's blocking pool and holds the lock for its whole closure, which gives
//! row-level atomicity for the read-modify-write updates below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use relay_models::{
    merge_metadata, Codebase, CodebaseId, CommandEntry, CommandTemplate, Conversation,
    ConversationId, ConversationUpdate, MessageId, MessageRole, NewCodebase, NewConversation,
    NewMessage, NewSession, PlatformType, Session, SessionId, SessionMetadata, StoredMessage,
};

use crate::error::{PersistenceError, Result};
use crate::store::{CodebaseStore, ConversationStore, MessageStore, SessionStore, TemplateStore};

const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS codebases (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    repository_url TEXT,
    default_cwd TEXT NOT NULL,
    ai_assistant_type TEXT NOT NULL,
    commands TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    platform_type TEXT NOT NULL,
    platform_conversation_id TEXT NOT NULL,
    codebase_id TEXT REFERENCES codebases(id),
    cwd TEXT,
    worktree_path TEXT,
    ai_assistant_type TEXT NOT NULL,
    parent_conversation_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (platform_type, platform_conversation_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    codebase_id TEXT,
    ai_assistant_type TEXT NOT NULL,
    assistant_session_id TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    metadata TEXT NOT NULL DEFAULT '{}',
    started_at TEXT NOT NULL,
    ended_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
    ON sessions (conversation_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS command_templates (
    name TEXT PRIMARY KEY,
    description TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    seq INTEGER NOT NULL,
    conversation_id TEXT NOT NULL,
    platform_type TEXT NOT NULL,
    codebase_id TEXT,
    codebase_name TEXT,
    role TEXT NOT NULL,
    text TEXT NOT NULL,
    image_meta TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages (conversation_id, seq);
";

const CONVERSATION_COLUMNS: &str = "id, platform_type, platform_conversation_id, codebase_id, \
     cwd, worktree_path, ai_assistant_type, parent_conversation_id, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, conversation_id, codebase_id, ai_assistant_type, \
     assistant_session_id, active, metadata, started_at, ended_at";

const CODEBASE_COLUMNS: &str =
    "id, name, repository_url, default_cwd, ai_assistant_type, commands, created_at";

/// Relational store on a single SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    PersistenceError::DirectoryError {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened SQLite store");
        Self::with_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| PersistenceError::LockPoisoned)?;
            f(&guard)
        })
        .await?
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
        debug!(from = version, to = SCHEMA_VERSION, "Applied schema migration");
    }
    Ok(())
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn role_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<MessageRole> {
    let raw: String = row.get(idx)?;
    match raw.as_str() {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        other => Err(conversion_error(
            idx,
            PersistenceError::InvalidData(format!("unknown message role: {}", other)),
        )),
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId::from_string(row.get::<_, String>(0)?),
        platform_type: parse_column(row, 1)?,
        platform_conversation_id: row.get(2)?,
        codebase_id: row.get::<_, Option<String>>(3)?.map(CodebaseId::from_string),
        cwd: row.get(4)?,
        worktree_path: row.get(5)?,
        ai_assistant_type: row.get(6)?,
        parent_conversation_id: row.get(7)?,
        created_at: row.get::<_, DateTime<Utc>>(8)?,
        updated_at: row.get::<_, DateTime<Utc>>(9)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: SessionId::from_string(row.get::<_, String>(0)?),
        conversation_id: ConversationId::from_string(row.get::<_, String>(1)?),
        codebase_id: row.get::<_, Option<String>>(2)?.map(CodebaseId::from_string),
        ai_assistant_type: row.get(3)?,
        assistant_session_id: row.get(4)?,
        active: row.get(5)?,
        metadata: json_column(row, 6)?,
        started_at: row.get(7)?,
        ended_at: row.get(8)?,
    })
}

fn codebase_from_row(row: &Row<'_>) -> rusqlite::Result<Codebase> {
    Ok(Codebase {
        id: CodebaseId::from_string(row.get::<_, String>(0)?),
        name: row.get(1)?,
        repository_url: row.get(2)?,
        default_cwd: row.get(3)?,
        ai_assistant_type: row.get(4)?,
        commands: json_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<CommandTemplate> {
    Ok(CommandTemplate::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
    ))
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let image_meta: Option<String> = row.get(7)?;
    let image_meta = image_meta
        .map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_error(7, e)))
        .transpose()?;
    Ok(StoredMessage {
        id: MessageId::from_string(row.get::<_, String>(0)?),
        conversation_id: ConversationId::from_string(row.get::<_, String>(1)?),
        platform_type: parse_column(row, 2)?,
        codebase_id: row.get::<_, Option<String>>(3)?.map(CodebaseId::from_string),
        codebase_name: row.get(4)?,
        role: role_column(row, 5)?,
        text: row.get(6)?,
        image_meta,
        created_at: row.get(8)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn load_conversation(conn: &Connection, id: &ConversationId) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id.as_str()], conversation_from_row)
        .optional()?)
}

fn load_session(conn: &Connection, id: &SessionId) -> Result<Option<Session>> {
    let sql = format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id.as_str()], session_from_row)
        .optional()?)
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_or_create_conversation(&self, new: NewConversation) -> Result<Conversation> {
        self.call(move |conn| {
            let now = Utc::now();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO conversations (id, platform_type, platform_conversation_id, \
                 codebase_id, ai_assistant_type, parent_conversation_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    ConversationId::new().as_str(),
                    new.platform_type.as_str(),
                    new.platform_conversation_id,
                    new.codebase_id.as_ref().map(|c| c.as_str()),
                    new.ai_assistant_type,
                    new.parent_conversation_id,
                    now,
                ],
            )?;
            if inserted > 0 {
                debug!(
                    platform = %new.platform_type,
                    platform_conversation_id = %new.platform_conversation_id,
                    "Created conversation"
                );
            }

            let sql = format!(
                "SELECT {} FROM conversations WHERE platform_type = ?1 AND platform_conversation_id = ?2",
                CONVERSATION_COLUMNS
            );
            Ok(conn.query_row(
                &sql,
                params![new.platform_type.as_str(), new.platform_conversation_id],
                conversation_from_row,
            )?)
        })
        .await
    }

    async fn get_conversation_by_platform_id(
        &self,
        platform_type: PlatformType,
        platform_conversation_id: &str,
    ) -> Result<Option<Conversation>> {
        let platform_conversation_id = platform_conversation_id.to_string();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM conversations WHERE platform_type = ?1 AND platform_conversation_id = ?2",
                CONVERSATION_COLUMNS
            );
            Ok(conn
                .query_row(
                    &sql,
                    params![platform_type.as_str(), platform_conversation_id],
                    conversation_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        update: ConversationUpdate,
    ) -> Result<Conversation> {
        let id = id.clone();
        self.call(move |conn| {
            let mut conversation = load_conversation(conn, &id)?
                .ok_or_else(|| PersistenceError::not_found("conversation", &id))?;
            update.apply_to(&mut conversation);
            conn.execute(
                "UPDATE conversations SET codebase_id = ?2, cwd = ?3, worktree_path = ?4, \
                 ai_assistant_type = ?5, updated_at = ?6 WHERE id = ?1",
                params![
                    id.as_str(),
                    conversation.codebase_id.as_ref().map(|c| c.as_str()),
                    conversation.cwd,
                    conversation.worktree_path,
                    conversation.ai_assistant_type,
                    conversation.updated_at,
                ],
            )?;
            Ok(conversation)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get_active_session(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Session>> {
        let conversation_id = conversation_id.clone();
        self.call(move |conn| {
            let sql = format!(
                "SELECT {} FROM sessions WHERE conversation_id = ?1 AND active = 1",
                SESSION_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![conversation_id.as_str()], session_from_row)
                .optional()?)
        })
        .await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let id = id.clone();
        self.call(move |conn| load_session(conn, &id)).await
    }

    async fn create_session(&self, new: NewSession) -> Result<Session> {
        self.call(move |conn| {
            let session = Session::from_new(new);
            let metadata = serde_json::to_string(&session.metadata)?;
            conn.execute(
                "INSERT INTO sessions (id, conversation_id, codebase_id, ai_assistant_type, \
                 active, metadata, started_at) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
                params![
                    session.id.as_str(),
                    session.conversation_id.as_str(),
                    session.codebase_id.as_ref().map(|c| c.as_str()),
                    session.ai_assistant_type,
                    metadata,
                    session.started_at,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    PersistenceError::Conflict(format!(
                        "conversation {} already has an active session",
                        session.conversation_id
                    ))
                } else {
                    PersistenceError::Database(e)
                }
            })?;
            Ok(session)
        })
        .await
    }

    async fn update_session(&self, id: &SessionId, assistant_session_id: &str) -> Result<()> {
        let id = id.clone();
        let assistant_session_id = assistant_session_id.to_string();
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET assistant_session_id = ?2 WHERE id = ?1",
                params![id.as_str(), assistant_session_id],
            )?;
            if updated == 0 {
                return Err(PersistenceError::not_found("session", &id));
            }
            Ok(())
        })
        .await
    }

    async fn update_session_metadata(
        &self,
        id: &SessionId,
        patch: SessionMetadata,
    ) -> Result<()> {
        let id = id.clone();
        self.call(move |conn| {
            let mut session = load_session(conn, &id)?
                .ok_or_else(|| PersistenceError::not_found("session", &id))?;
            merge_metadata(&mut session.metadata, patch);
            conn.execute(
                "UPDATE sessions SET metadata = ?2 WHERE id = ?1",
                params![id.as_str(), serde_json::to_string(&session.metadata)?],
            )?;
            Ok(())
        })
        .await
    }

    async fn deactivate_session(&self, id: &SessionId) -> Result<()> {
        let id = id.clone();
        self.call(move |conn| {
            let found: Option<bool> = conn
                .query_row(
                    "SELECT active FROM sessions WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match found {
                None => Err(PersistenceError::not_found("session", &id)),
                Some(false) => Ok(()),
                Some(true) => {
                    conn.execute(
                        "UPDATE sessions SET active = 0, ended_at = ?2 WHERE id = ?1",
                        params![id.as_str(), Utc::now()],
                    )?;
                    Ok(())
                }
            }
        })
        .await
    }
}

#[async_trait]
impl CodebaseStore for SqliteStore {
    async fn get_codebase(&self, id: &CodebaseId) -> Result<Option<Codebase>> {
        let id = id.clone();
        self.call(move |conn| {
            let sql = format!("SELECT {} FROM codebases WHERE id = ?1", CODEBASE_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id.as_str()], codebase_from_row)
                .optional()?)
        })
        .await
    }

    async fn find_codebase_by_name(&self, name: &str) -> Result<Option<Codebase>> {
        let name = name.to_string();
        self.call(move |conn| {
            let sql = format!("SELECT {} FROM codebases WHERE name = ?1", CODEBASE_COLUMNS);
            Ok(conn
                .query_row(&sql, params![name], codebase_from_row)
                .optional()?)
        })
        .await
    }

    async fn list_codebases(&self) -> Result<Vec<Codebase>> {
        self.call(|conn| {
            let sql = format!("SELECT {} FROM codebases ORDER BY name", CODEBASE_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], codebase_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn create_codebase(&self, new: NewCodebase) -> Result<Codebase> {
        self.call(move |conn| {
            let codebase = new.into_codebase();
            conn.execute(
                "INSERT INTO codebases (id, name, repository_url, default_cwd, ai_assistant_type, \
                 commands, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    codebase.id.as_str(),
                    codebase.name,
                    codebase.repository_url,
                    codebase.default_cwd,
                    codebase.ai_assistant_type,
                    serde_json::to_string(&codebase.commands)?,
                    codebase.created_at,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    PersistenceError::Conflict(format!("codebase {} already exists", codebase.name))
                } else {
                    PersistenceError::Database(e)
                }
            })?;
            Ok(codebase)
        })
        .await
    }

    async fn update_codebase_commands(
        &self,
        id: &CodebaseId,
        commands: BTreeMap<String, CommandEntry>,
    ) -> Result<()> {
        let id = id.clone();
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE codebases SET commands = ?2 WHERE id = ?1",
                params![id.as_str(), serde_json::to_string(&commands)?],
            )?;
            if updated == 0 {
                return Err(PersistenceError::not_found("codebase", &id));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn get_template(&self, name: &str) -> Result<Option<CommandTemplate>> {
        let name = name.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT name, description, content FROM command_templates WHERE name = ?1",
                    params![name],
                    template_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn list_templates(&self) -> Result<Vec<CommandTemplate>> {
        self.call(|conn| {
            let mut stmt = conn
                .prepare("SELECT name, description, content FROM command_templates ORDER BY name")?;
            let rows = stmt.query_map([], template_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn upsert_template(&self, template: CommandTemplate) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO command_templates (name, description, content) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(name) DO UPDATE SET description = excluded.description, \
                 content = excluded.content",
                params![template.name, template.description, template.content],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_template(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM command_templates WHERE name = ?1",
                params![name],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create_message(&self, message: NewMessage) -> Result<()> {
        self.call(move |conn| {
            let stored = StoredMessage::from_new(message);
            let image_meta = stored
                .image_meta
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            conn.execute(
                "INSERT INTO messages (id, seq, conversation_id, platform_type, codebase_id, \
                 codebase_name, role, text, image_meta, created_at) \
                 VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    stored.id.as_str(),
                    stored.conversation_id.as_str(),
                    stored.platform_type.as_str(),
                    stored.codebase_id.as_ref().map(|c| c.as_str()),
                    stored.codebase_name,
                    stored.role.as_str(),
                    stored.text,
                    image_meta,
                    stored.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let conversation_id = conversation_id.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, platform_type, codebase_id, codebase_name, role, text, \
                 image_meta, created_at FROM messages WHERE conversation_id = ?1 \
                 ORDER BY seq DESC LIMIT ?2",
            )?;
            let rows =
                stmt.query_map(params![conversation_id.as_str(), limit], message_from_row)?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_models::{last_command_patch, LAST_COMMAND};
    use tempfile::TempDir;

    async fn store_with_conversation() -> (SqliteStore, Conversation) {
        let store = SqliteStore::open_in_memory().unwrap();
        let conv = store
            .get_or_create_conversation(NewConversation::new(PlatformType::Telegram, "100", "claude"))
            .await
            .unwrap();
        (store, conv)
    }

    #[tokio::test]
    async fn test_conversation_get_or_create() {
        let (store, conv) = store_with_conversation().await;
        let again = store
            .get_or_create_conversation(NewConversation::new(PlatformType::Telegram, "100", "codex"))
            .await
            .unwrap();
        assert_eq!(conv.id, again.id);

        let found = store
            .get_conversation_by_platform_id(PlatformType::Telegram, "100")
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(conv.id));
        assert!(store
            .get_conversation_by_platform_id(PlatformType::Slack, "100")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_conversation_update_round_trip() {
        let (store, conv) = store_with_conversation().await;
        let codebase = store
            .create_codebase(NewCodebase::new("app", "/workspace/app", "claude"))
            .await
            .unwrap();

        let updated = store
            .update_conversation(
                &conv.id,
                ConversationUpdate::default()
                    .codebase(Some(codebase.id.clone()))
                    .cwd(Some("/workspace/app".to_string()))
                    .worktree(Some("/workspace/worktrees/feat".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(updated.working_dir(), Some("/workspace/worktrees/feat"));

        let cleared = store
            .update_conversation(&conv.id, ConversationUpdate::default().worktree(None))
            .await
            .unwrap();
        assert_eq!(cleared.working_dir(), Some("/workspace/app"));
        assert_eq!(cleared.codebase_id, Some(codebase.id));
    }

    #[tokio::test]
    async fn test_one_active_session_enforced_by_index() {
        let (store, conv) = store_with_conversation().await;
        let first = store
            .create_session(NewSession::new(conv.id.clone(), None, "claude").with_config_hash("h1"))
            .await
            .unwrap();

        let err = store
            .create_session(NewSession::new(conv.id.clone(), None, "claude"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));

        store.deactivate_session(&first.id).await.unwrap();
        store.deactivate_session(&first.id).await.unwrap();
        let second = store
            .create_session(NewSession::new(conv.id.clone(), None, "claude"))
            .await
            .unwrap();

        let active = store.get_active_session(&conv.id).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);

        let old = store.get_session(&first.id).await.unwrap().unwrap();
        assert!(!old.active);
        assert_eq!(old.config_hash(), Some("h1"));
    }

    #[tokio::test]
    async fn test_session_updates() {
        let (store, conv) = store_with_conversation().await;
        let session = store
            .create_session(NewSession::new(conv.id.clone(), None, "claude"))
            .await
            .unwrap();

        store.update_session(&session.id, "remote-1").await.unwrap();
        store
            .update_session_metadata(&session.id, last_command_patch("plan-feature"))
            .await
            .unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.assistant_session_id.as_deref(), Some("remote-1"));
        assert_eq!(loaded.last_command(), Some("plan-feature"));
        assert!(loaded.metadata.contains_key(LAST_COMMAND));

        let missing = store
            .update_session(&SessionId::from_string("sess-missing"), "x")
            .await;
        assert!(matches!(missing, Err(PersistenceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_codebase_commands_and_templates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let codebase = store
            .create_codebase(NewCodebase::new("app", "/workspace/app", "claude"))
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_codebase(NewCodebase::new("app", "/elsewhere", "claude"))
                .await,
            Err(PersistenceError::Conflict(_))
        ));

        let mut commands = BTreeMap::new();
        commands.insert(
            "execute".to_string(),
            CommandEntry::new(".claude/commands/execute.md", "Execute a plan"),
        );
        store
            .update_codebase_commands(&codebase.id, commands)
            .await
            .unwrap();
        let loaded = store.find_codebase_by_name("app").await.unwrap().unwrap();
        assert!(loaded.command("execute").is_some());

        store
            .upsert_template(CommandTemplate::new("router", "Route", "v1 $ARGUMENTS"))
            .await
            .unwrap();
        store
            .upsert_template(CommandTemplate::new("router", "Route", "v2 $ARGUMENTS"))
            .await
            .unwrap();
        let router = store.get_template("router").await.unwrap().unwrap();
        assert_eq!(router.content, "v2 $ARGUMENTS");
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
        assert!(store.delete_template("router").await.unwrap());
        assert!(!store.delete_template("router").await.unwrap());
    }

    #[tokio::test]
    async fn test_messages_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db/relay.db");
        let conv_id;
        {
            let store = SqliteStore::open(&path).unwrap();
            let conv = store
                .get_or_create_conversation(NewConversation::new(PlatformType::Cli, "local", "claude"))
                .await
                .unwrap();
            conv_id = conv.id.clone();
            for (role, text) in [(MessageRole::User, "hi"), (MessageRole::Assistant, "hello")] {
                store
                    .create_message(NewMessage {
                        conversation_id: conv.id.clone(),
                        platform_type: PlatformType::Cli,
                        codebase_id: None,
                        codebase_name: None,
                        role,
                        text: text.to_string(),
                        image_meta: None,
                    })
                    .await
                    .unwrap();
            }
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let messages = reopened.recent_messages(&conv_id, 10).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "hello"]);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_worker_threads() {
        let (store, conv) = store_with_conversation().await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let conversation_id = conv.id.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .create_message(NewMessage {
                        conversation_id: conversation_id.clone(),
                        platform_type: PlatformType::Telegram,
                        codebase_id: None,
                        codebase_name: None,
                        role: MessageRole::User,
                        text: format!("message {}", i),
                        image_meta: None,
                    })
                    .await
                    .unwrap();
                store
                    .create_session(NewSession::new(conversation_id, None, "claude"))
                    .await
                    .is_ok()
            }));
        }

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.recent_messages(&conv.id, 100).await.unwrap().len(), 16);
    }
}
