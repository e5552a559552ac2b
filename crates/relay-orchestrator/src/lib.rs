//! Message orchestration for Relay.
//!
//! This crate provides the [`Orchestrator`], which turns one inbound platform
//! message into one assistant turn: it resolves the conversation, classifies
//! the message, builds the prompt, decides whether the assistant session is
//! resumed or replaced, and relays the streamed response back.
//!
//! # Overview
//!
//! The orchestrator manages:
//! - Conversation lookup and parent-thread inheritance
//! - Deterministic slash commands through a [`CommandHandler`]
//! - Codebase commands and global templates rendered into prompts
//! - Session lifecycle: plan-to-execute transitions, config drift, stale worktrees
//! - Stream or batch delivery to the [`Platform`]
//!
//! # Example
//!
//! ```ignore
//! use relay_orchestrator::{InboundMessage, Orchestrator, OrchestratorConfig};
//!
//! let orchestrator = Orchestrator::new(stores, assistants, commands, OrchestratorConfig::default());
//! orchestrator
//!     .handle_message(&platform, InboundMessage::new("42", "/status"))
//!     .await;
//! ```

pub mod commands;
mod error;
pub mod lifecycle;
mod locks;
mod orchestrator;
mod platform;
pub mod research;
mod setup;
pub mod tool_config;

pub use commands::{BuiltinCommands, CommandHandler, CommandOutcome};
pub use error::{classify_error, format_error, ErrorCategory, OrchestratorError, Result};
pub use lifecycle::{decide_session, SessionDecision};
pub use locks::ConversationLocks;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use platform::{InboundMessage, Platform};
pub use research::{DependencyResearch, NoResearch, ResearchAdvisor};
pub use tool_config::{McpConfigFile, ToolConfigSource};
