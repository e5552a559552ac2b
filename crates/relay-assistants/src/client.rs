//! The assistant client trait and the registry that selects one.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use relay_models::{ImageAttachment, MessageChunk};

use crate::claude::ClaudeClient;
use crate::codex::CodexClient;
use crate::error::Result;
use crate::kind::AssistantKind;

/// Stream of chunks produced by one query.
///
/// Dropping the stream stops the underlying assistant.
pub type ChunkStream = BoxStream<'static, Result<MessageChunk>>;

/// A coding assistant that answers one prompt at a time.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Which assistant this is.
    fn kind(&self) -> AssistantKind;

    /// Send a prompt and stream the response.
    ///
    /// `resume` is the assistant's own session handle from an earlier
    /// `Result` chunk. The stream ends after the turn completes; a `Result`
    /// chunk is expected but not guaranteed.
    async fn send_query(
        &self,
        prompt: &str,
        cwd: &Path,
        resume: Option<&str>,
        images: &[ImageAttachment],
    ) -> Result<ChunkStream>;
}

/// Selects the client for an assistant kind.
pub trait AssistantFactory: Send + Sync {
    fn client(&self, kind: AssistantKind) -> Arc<dyn AssistantClient>;
}

/// Binaries used by the subprocess clients.
#[derive(Debug, Clone)]
pub struct AssistantBinaries {
    pub claude: PathBuf,
    pub codex: PathBuf,
}

impl Default for AssistantBinaries {
    fn default() -> Self {
        Self {
            claude: PathBuf::from("claude"),
            codex: PathBuf::from("codex"),
        }
    }
}

/// The built-in clients, one per [`AssistantKind`].
///
/// # Example
///
/// ```
/// use relay_assistants::{AssistantBinaries, AssistantFactory, AssistantKind, AssistantRegistry};
///
/// let registry = AssistantRegistry::new(AssistantBinaries::default());
/// let client = registry.client(AssistantKind::Codex);
/// assert_eq!(client.kind(), AssistantKind::Codex);
/// ```
pub struct AssistantRegistry {
    claude: Arc<ClaudeClient>,
    codex: Arc<CodexClient>,
}

impl AssistantRegistry {
    pub fn new(binaries: AssistantBinaries) -> Self {
        Self {
            claude: Arc::new(ClaudeClient::new(binaries.claude)),
            codex: Arc::new(CodexClient::new(binaries.codex)),
        }
    }

    /// Kinds whose binary is installed.
    pub fn available(&self) -> Vec<AssistantKind> {
        let mut kinds = Vec::new();
        if self.claude.is_installed() {
            kinds.push(AssistantKind::Claude);
        }
        if self.codex.is_installed() {
            kinds.push(AssistantKind::Codex);
        }
        kinds
    }
}

impl AssistantFactory for AssistantRegistry {
    fn client(&self, kind: AssistantKind) -> Arc<dyn AssistantClient> {
        match kind {
            AssistantKind::Claude => self.claude.clone(),
            AssistantKind::Codex => self.codex.clone(),
        }
    }
}
