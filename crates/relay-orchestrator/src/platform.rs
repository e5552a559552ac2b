//! The seam between the orchestrator and a chat platform.

use async_trait::async_trait;

use relay_models::{ImageAttachment, PlatformType, StreamingMode};

use crate::error::Result;

/// A chat platform the orchestrator can reply on.
///
/// `send_message` may be called many times per turn in stream mode.
#[async_trait]
pub trait Platform: Send + Sync {
    fn platform_type(&self) -> PlatformType;

    fn streaming_mode(&self) -> StreamingMode;

    /// Deliver text to a platform conversation.
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<()>;

    /// True when the conversation has no project scope, such as a forum
    /// chat's general topic. Only a safelist of commands runs there.
    fn is_general_context(&self, _conversation_id: &str) -> bool {
        false
    }

    /// Create a sub-thread and return its conversation id, when supported.
    async fn create_topic(&self, _conversation_id: &str, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// One inbound message and the context the adapter gathered for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundMessage {
    /// Platform conversation id (chat, thread or topic).
    pub conversation_id: String,
    pub text: String,
    /// Issue or pull-request body injected by the adapter.
    pub issue_context: Option<String>,
    /// Earlier messages of the surrounding thread.
    pub thread_context: Option<String>,
    /// Platform id of the enclosing conversation for threaded platforms.
    pub parent_conversation_id: Option<String>,
    pub images: Vec<ImageAttachment>,
}

impl InboundMessage {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_issue_context(mut self, context: impl Into<String>) -> Self {
        self.issue_context = Some(context.into());
        self
    }

    pub fn with_thread_context(mut self, context: impl Into<String>) -> Self {
        self.thread_context = Some(context.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_conversation_id = Some(parent.into());
        self
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }
}
