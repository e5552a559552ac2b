//! AI coding assistant clients for Relay.
//!
//! Every assistant is driven through the [`AssistantClient`] trait: send one
//! prompt with a working directory and an optional resume handle, get back a
//! stream of [`MessageChunk`](relay_models::MessageChunk)s.
//!
//! # Key Concepts
//!
//! - **AssistantKind**: The closed set of supported assistants
//! - **AssistantRegistry**: Maps a kind to its client with an exhaustive match
//! - **Subprocess clients**: `claude` and `codex` CLIs speaking JSON lines
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use relay_assistants::{AssistantBinaries, AssistantFactory, AssistantKind, AssistantRegistry};
//! use std::path::Path;
//!
//! # async fn run() -> relay_assistants::Result<()> {
//! let registry = AssistantRegistry::new(AssistantBinaries::default());
//! let client = registry.client(AssistantKind::Claude);
//! let mut stream = client
//!     .send_query("List the TODOs", Path::new("/workspace/app"), None, &[])
//!     .await?;
//! while let Some(chunk) = stream.next().await {
//!     println!("{:?}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod claude;
pub mod client;
pub mod codex;
pub mod error;
pub mod kind;
mod process;

pub use claude::{parse_claude_line, ClaudeClient};
pub use client::{
    AssistantBinaries, AssistantClient, AssistantFactory, AssistantRegistry, ChunkStream,
};
pub use codex::{CodexClient, CodexEvents};
pub use error::{AssistantError, Result};
pub use kind::AssistantKind;
