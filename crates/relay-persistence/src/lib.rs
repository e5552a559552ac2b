//! Persistence layer for Relay.
//!
//! Store traits for conversations, sessions, codebases, templates and the
//! message audit trail, with a SQLite backend for real deployments and an
//! in-memory backend for tests.
//!
//! # Example
//!
//! ```no_run
//! use relay_models::{NewConversation, PlatformType};
//! use relay_persistence::{ConversationStore, SqliteStore};
//!
//! # async fn run() -> relay_persistence::Result<()> {
//! let store = SqliteStore::open("/home/user/.relay/db/relay.db")?;
//! let conv = store
//!     .get_or_create_conversation(NewConversation::new(PlatformType::Cli, "local", "claude"))
//!     .await?;
//! println!("{}", conv.id);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod seed;
pub mod sqlite;
pub mod store;

pub use error::{PersistenceError, Result};
pub use memory::MemoryStore;
pub use seed::seed_templates;
pub use sqlite::SqliteStore;
pub use store::{
    CodebaseStore, ConversationStore, MessageStore, SessionStore, Stores, TemplateStore,
};
