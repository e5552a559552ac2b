//! The per-message state machine.
//!
//! One call to [`Orchestrator::handle_message`] runs a whole turn: resolve
//! the conversation, classify the message, build the prompt, pick or replace
//! the assistant session, stream the response back and stamp bookkeeping.

use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use relay_assistants::{AssistantFactory, AssistantKind};
use relay_core::{
    clean_batch_response, format_tool_call, is_command, parse_command, substitute_variables,
    substitute_variables_with, ParsedCommand,
};
use relay_models::{
    clear_history_patch, config_hash_patch, last_command_patch, merge_metadata, Codebase,
    Conversation, ConversationUpdate, MessageChunk, MessageRole, NewConversation, NewMessage,
    NewSession, Session, StreamingMode,
};
use relay_persistence::Stores;

use crate::commands::{allowed_in_general_context, is_deterministic, CommandHandler};
use crate::error::{classify_error, format_error, Result};
use crate::lifecycle::{decide_session, SessionDecision};
use crate::locks::ConversationLocks;
use crate::platform::{InboundMessage, Platform};
use crate::research::{NoResearch, ResearchAdvisor};
use crate::tool_config::{McpConfigFile, ToolConfigSource};

/// Template applied to natural-language messages when present.
pub const ROUTER_TEMPLATE: &str = "router";
/// Template prepended to every assistant prompt when present.
pub const SYSTEM_CONTEXT_TEMPLATE: &str = "system-context";

const NO_CODEBASE_MESSAGE: &str = "No codebase configured. Use /clone <repository-url> to add one, \
or /repo <name> to switch to a registered codebase.";
const BATCH_PLACEHOLDER: &str = "\u{23F3} I'm on it. I'll send a summary when I'm done.";
const SECTION_RULE: &str = "\n\n---\n\n";

/// Construction-time settings. The orchestrator never reads the environment.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Working directory when neither the conversation nor its codebase has one.
    pub fallback_cwd: PathBuf,
    /// Assistant recorded on newly created conversations.
    pub default_assistant: AssistantKind,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback_cwd: PathBuf::from("/workspace"),
            default_assistant: AssistantKind::Claude,
        }
    }
}

/// Prompt built for the assistant this turn.
struct PreparedPrompt {
    prompt: String,
    /// Command or template name driving the turn, for workflow transitions.
    command_name: Option<String>,
}

/// Routes inbound platform messages to assistant sessions.
pub struct Orchestrator {
    stores: Stores,
    assistants: Arc<dyn AssistantFactory>,
    commands: Arc<dyn CommandHandler>,
    research: Arc<dyn ResearchAdvisor>,
    tool_config: Arc<dyn ToolConfigSource>,
    config: OrchestratorConfig,
    locks: ConversationLocks,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        assistants: Arc<dyn AssistantFactory>,
        commands: Arc<dyn CommandHandler>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            stores,
            assistants,
            commands,
            research: Arc::new(NoResearch),
            tool_config: Arc::new(McpConfigFile::default()),
            config,
            locks: ConversationLocks::new(),
        }
    }

    pub fn with_research(mut self, research: Arc<dyn ResearchAdvisor>) -> Self {
        self.research = research;
        self
    }

    pub fn with_tool_config(mut self, tool_config: Arc<dyn ToolConfigSource>) -> Self {
        self.tool_config = tool_config;
        self
    }

    /// Handle one inbound message end to end.
    ///
    /// Turns of the same conversation run one at a time. Any failure is
    /// logged and reported to the platform as a single short message; state
    /// committed before the failure stays committed.
    pub async fn handle_message(&self, platform: &dyn Platform, message: InboundMessage) {
        let key = format!("{}:{}", platform.platform_type(), message.conversation_id);
        let _turn = self.locks.lock(&key).await;
        let conversation_id = message.conversation_id.clone();

        if let Err(e) = self.process(platform, message).await {
            error!(
                conversation_id = %conversation_id,
                category = ?classify_error(&e),
                error = %e,
                "Failed to handle message"
            );
            if let Err(send_err) = platform
                .send_message(&conversation_id, &format_error(&e))
                .await
            {
                warn!(conversation_id = %conversation_id, error = %send_err, "Failed to report error");
            }
        }
    }

    async fn process(&self, platform: &dyn Platform, message: InboundMessage) -> Result<()> {
        let reply_to = message.conversation_id.as_str();
        let conversation = self.resolve_conversation(platform, &message).await?;

        if platform.is_general_context(reply_to) && is_command(&message.text) {
            let parsed = parse_command(&message.text);
            if !allowed_in_general_context(&parsed.command) {
                debug!(command = %parsed.command, "Rejected command in general context");
                return platform
                    .send_message(
                        reply_to,
                        &format!(
                            "/{} is not available here. Use /new-topic <name> to open a project \
                             topic first. Available here: /help, /status, /repos, /new-topic.",
                            parsed.command
                        ),
                    )
                    .await;
            }
        }

        let Some(prepared) = self
            .classify(platform, &conversation, &message)
            .await?
        else {
            return Ok(());
        };
        let prompt = self.augment(prepared.prompt, &message).await?;

        let (conversation, codebase) = self.heal_working_dir(conversation).await?;
        let cwd = self.effective_cwd(&conversation, codebase.as_ref());
        let mut session = self
            .resolve_session(&conversation, prepared.command_name.as_deref())
            .await?;

        let prompt = match session.pending_history().map(str::to_string) {
            Some(history) => {
                self.stores
                    .sessions
                    .update_session_metadata(&session.id, clear_history_patch())
                    .await?;
                merge_metadata(&mut session.metadata, clear_history_patch());
                debug!(session_id = %session.id, "Replaying resumed history");
                format!("{}{}{}", history, SECTION_RULE, prompt)
            }
            None => prompt,
        };

        self.dispatch(
            platform,
            &conversation,
            codebase.as_ref(),
            &session,
            &message,
            &prompt,
            cwd,
        )
        .await?;

        if let Some(name) = &prepared.command_name {
            self.stores
                .sessions
                .update_session_metadata(&session.id, last_command_patch(name))
                .await?;
        }
        Ok(())
    }

    /// Get or create the conversation and inherit the parent's project.
    async fn resolve_conversation(
        &self,
        platform: &dyn Platform,
        message: &InboundMessage,
    ) -> Result<Conversation> {
        let platform_type = platform.platform_type();
        let conversation = self
            .stores
            .conversations
            .get_or_create_conversation(
                NewConversation::new(
                    platform_type,
                    &message.conversation_id,
                    self.config.default_assistant.as_str(),
                )
                .with_parent(message.parent_conversation_id.clone()),
            )
            .await?;

        if conversation.codebase_id.is_some() {
            return Ok(conversation);
        }
        let Some(parent_id) = &message.parent_conversation_id else {
            return Ok(conversation);
        };
        let Some(parent) = self
            .stores
            .conversations
            .get_conversation_by_platform_id(platform_type, parent_id)
            .await?
        else {
            return Ok(conversation);
        };
        if parent.codebase_id.is_none() {
            return Ok(conversation);
        }

        info!(
            conversation_id = %conversation.id,
            parent = %parent_id,
            "Inheriting codebase from parent conversation"
        );
        Ok(self
            .stores
            .conversations
            .update_conversation(
                &conversation.id,
                ConversationUpdate::default()
                    .codebase(parent.codebase_id.clone())
                    .cwd(parent.cwd.clone()),
            )
            .await?)
    }

    /// Turn the message into a prompt, or reply directly and return `None`.
    async fn classify(
        &self,
        platform: &dyn Platform,
        conversation: &Conversation,
        message: &InboundMessage,
    ) -> Result<Option<PreparedPrompt>> {
        let reply_to = message.conversation_id.as_str();

        if !is_command(&message.text) {
            if conversation.codebase_id.is_none() {
                platform.send_message(reply_to, NO_CODEBASE_MESSAGE).await?;
                return Ok(None);
            }
            let prompt = match self.stores.templates.get_template(ROUTER_TEMPLATE).await? {
                Some(router) => {
                    substitute_variables(&router.content, &[message.text.clone()])
                }
                None => message.text.clone(),
            };
            return Ok(Some(PreparedPrompt {
                prompt,
                command_name: None,
            }));
        }

        let parsed = parse_command(&message.text);
        if is_deterministic(&parsed.command) {
            let outcome = self
                .commands
                .handle(platform, conversation, &parsed)
                .await?;
            if outcome.modified {
                debug!(command = %parsed.command, "Command changed conversation context");
            }
            platform.send_message(reply_to, &outcome.message).await?;
            return Ok(None);
        }

        if parsed.command == "command-invoke" {
            return self
                .invoke_codebase_command(platform, conversation, message, &parsed)
                .await;
        }

        match self.stores.templates.get_template(&parsed.command).await? {
            Some(template) => {
                debug!(template = %template.name, "Running global template");
                let named = self.session_values(conversation).await?;
                Ok(Some(PreparedPrompt {
                    prompt: render_command(
                        &template.name,
                        &template.content,
                        &parsed.args,
                        &named,
                        message.issue_context.as_deref(),
                    ),
                    command_name: Some(template.name),
                }))
            }
            None => {
                platform
                    .send_message(
                        reply_to,
                        &format!(
                            "Unknown command: /{}\n\nUse /help to see available commands.",
                            parsed.command
                        ),
                    )
                    .await?;
                Ok(None)
            }
        }
    }

    async fn invoke_codebase_command(
        &self,
        platform: &dyn Platform,
        conversation: &Conversation,
        message: &InboundMessage,
        parsed: &ParsedCommand,
    ) -> Result<Option<PreparedPrompt>> {
        let reply_to = message.conversation_id.as_str();
        let Some(name) = parsed.arg(0) else {
            platform
                .send_message(reply_to, "Usage: /command-invoke <name> [args...]")
                .await?;
            return Ok(None);
        };
        let codebase = match &conversation.codebase_id {
            Some(id) => self.stores.codebases.get_codebase(id).await?,
            None => None,
        };
        let Some(codebase) = codebase else {
            platform.send_message(reply_to, NO_CODEBASE_MESSAGE).await?;
            return Ok(None);
        };
        let Some(entry) = codebase.command(name) else {
            platform
                .send_message(
                    reply_to,
                    &format!(
                        "Command not found: {}. Use /commands to list registered commands.",
                        name
                    ),
                )
                .await?;
            return Ok(None);
        };

        let path = self
            .effective_cwd(conversation, Some(&codebase))
            .join(&entry.path);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Command file missing");
                platform
                    .send_message(reply_to, &format!("Command file not found: {}", entry.path))
                    .await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        debug!(command = %name, path = %path.display(), "Invoking codebase command");
        let named = self.session_values(conversation).await?;
        Ok(Some(PreparedPrompt {
            prompt: render_command(
                name,
                &body,
                &parsed.args[1..],
                &named,
                message.issue_context.as_deref(),
            ),
            command_name: Some(name.to_string()),
        }))
    }

    /// Named placeholder values from the active session's metadata.
    async fn session_values(&self, conversation: &Conversation) -> Result<HashMap<String, String>> {
        Ok(self
            .stores
            .sessions
            .get_active_session(&conversation.id)
            .await?
            .map(|s| s.placeholder_values())
            .unwrap_or_default())
    }

    /// Prepend thread context, then system context, then research notes.
    async fn augment(&self, prompt: String, message: &InboundMessage) -> Result<String> {
        let mut prompt = match &message.thread_context {
            Some(context) if !context.trim().is_empty() => format!(
                "## Thread Context\n\nEarlier messages in this thread:\n\n{}{}{}",
                context.trim(),
                SECTION_RULE,
                prompt
            ),
            _ => prompt,
        };

        if let Some(system) = self
            .stores
            .templates
            .get_template(SYSTEM_CONTEXT_TEMPLATE)
            .await?
        {
            prompt = format!("{}{}{}", system.content.trim_end(), SECTION_RULE, prompt);
        }

        if self.research.is_enabled() {
            if let Some(instructions) = self.research.instructions_for(&message.text) {
                prompt = format!("{}{}{}", instructions, SECTION_RULE, prompt);
            }
        }
        Ok(prompt)
    }

    fn effective_cwd(&self, conversation: &Conversation, codebase: Option<&Codebase>) -> PathBuf {
        conversation
            .working_dir()
            .map(PathBuf::from)
            .or_else(|| codebase.map(|c| PathBuf::from(&c.default_cwd)))
            .unwrap_or_else(|| self.config.fallback_cwd.clone())
    }

    /// Reset a working directory that no longer exists to the codebase
    /// default and end the session bound to it.
    async fn heal_working_dir(
        &self,
        conversation: Conversation,
    ) -> Result<(Conversation, Option<Codebase>)> {
        let codebase = match &conversation.codebase_id {
            Some(id) => self.stores.codebases.get_codebase(id).await?,
            None => None,
        };
        let cwd = self.effective_cwd(&conversation, codebase.as_ref());
        if tokio::fs::metadata(&cwd).await.is_ok() {
            return Ok((conversation, codebase));
        }

        warn!(
            conversation_id = %conversation.id,
            cwd = %cwd.display(),
            "Working directory is gone, resetting to codebase default"
        );
        if let Some(active) = self
            .stores
            .sessions
            .get_active_session(&conversation.id)
            .await?
        {
            self.stores.sessions.deactivate_session(&active.id).await?;
        }
        let conversation = self
            .stores
            .conversations
            .update_conversation(
                &conversation.id,
                ConversationUpdate::default()
                    .worktree(None)
                    .cwd(codebase.as_ref().map(|c| c.default_cwd.clone())),
            )
            .await?;
        Ok((conversation, codebase))
    }

    async fn resolve_session(
        &self,
        conversation: &Conversation,
        command_name: Option<&str>,
    ) -> Result<Session> {
        let active = self
            .stores
            .sessions
            .get_active_session(&conversation.id)
            .await?;
        let hash = self.tool_config.config_hash();

        match (decide_session(active.as_ref(), command_name, &hash), active) {
            (SessionDecision::Resume, Some(mut session)) => {
                if session.config_hash().is_none() {
                    self.stores
                        .sessions
                        .update_session_metadata(&session.id, config_hash_patch(&hash))
                        .await?;
                    merge_metadata(&mut session.metadata, config_hash_patch(&hash));
                }
                debug!(session_id = %session.id, "Resuming session");
                Ok(session)
            }
            (SessionDecision::Replace(reason), Some(old)) => {
                info!(session_id = %old.id, reason = ?reason, "Replacing session");
                self.stores.sessions.deactivate_session(&old.id).await?;
                self.create_session(conversation, hash).await
            }
            _ => self.create_session(conversation, hash).await,
        }
    }

    async fn create_session(&self, conversation: &Conversation, hash: String) -> Result<Session> {
        let session = self
            .stores
            .sessions
            .create_session(
                NewSession::new(
                    conversation.id.clone(),
                    conversation.codebase_id.clone(),
                    &conversation.ai_assistant_type,
                )
                .with_config_hash(hash),
            )
            .await?;
        info!(
            session_id = %session.id,
            conversation_id = %conversation.id,
            "Created session"
        );
        Ok(session)
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        platform: &dyn Platform,
        conversation: &Conversation,
        codebase: Option<&Codebase>,
        session: &Session,
        message: &InboundMessage,
        prompt: &str,
        cwd: PathBuf,
    ) -> Result<()> {
        let reply_to = message.conversation_id.as_str();
        let kind: AssistantKind = conversation.ai_assistant_type.parse()?;
        let client = self.assistants.client(kind);

        self.record(
            conversation,
            codebase,
            MessageRole::User,
            &message.text,
            image_meta(message),
        )
        .await;

        info!(
            conversation_id = %conversation.id,
            session_id = %session.id,
            assistant = %kind,
            cwd = %cwd.display(),
            resume = session.assistant_session_id.is_some(),
            "Dispatching to assistant"
        );
        let mut stream = client
            .send_query(
                prompt,
                &cwd,
                session.assistant_session_id.as_deref(),
                &message.images,
            )
            .await?;

        match platform.streaming_mode() {
            StreamingMode::Stream => {
                let mut full = String::new();
                while let Some(chunk) = stream.next().await {
                    match chunk? {
                        MessageChunk::Assistant { content } => {
                            if !full.is_empty() {
                                full.push_str("\n\n");
                            }
                            full.push_str(&content);
                            platform.send_message(reply_to, &content).await?;
                        }
                        MessageChunk::Tool { name, input } => {
                            platform
                                .send_message(reply_to, &format_tool_call(&name, input.as_ref()))
                                .await?;
                        }
                        MessageChunk::Result {
                            session_id: Some(id),
                        } => self.stores.sessions.update_session(&session.id, &id).await?,
                        _ => {}
                    }
                }
                if !full.is_empty() {
                    self.record(conversation, codebase, MessageRole::Assistant, &full, None)
                        .await;
                }
            }
            StreamingMode::Batch => {
                platform.send_message(reply_to, BATCH_PLACEHOLDER).await?;
                let mut texts = Vec::new();
                let mut tools = 0usize;
                while let Some(chunk) = stream.next().await {
                    match chunk? {
                        MessageChunk::Assistant { content } => texts.push(content),
                        MessageChunk::Tool { name, input } => {
                            tools += 1;
                            info!(
                                session_id = %session.id,
                                tool = %format_tool_call(&name, input.as_ref()),
                                "Tool call"
                            );
                        }
                        MessageChunk::Result {
                            session_id: Some(id),
                        } => self.stores.sessions.update_session(&session.id, &id).await?,
                        _ => {}
                    }
                }
                let summary = clean_batch_response(&texts);
                debug!(chunks = texts.len(), tools, "Batch response collected");
                if !summary.trim().is_empty() {
                    platform.send_message(reply_to, &summary).await?;
                    self.record(conversation, codebase, MessageRole::Assistant, &summary, None)
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Append to the audit trail. Failures are logged, never raised.
    async fn record(
        &self,
        conversation: &Conversation,
        codebase: Option<&Codebase>,
        role: MessageRole,
        text: &str,
        image_meta: Option<serde_json::Value>,
    ) {
        let entry = NewMessage {
            conversation_id: conversation.id.clone(),
            platform_type: conversation.platform_type,
            codebase_id: conversation.codebase_id.clone(),
            codebase_name: codebase.map(|c| c.name.clone()),
            role,
            text: text.to_string(),
            image_meta,
        };
        if let Err(e) = self.stores.messages.create_message(entry).await {
            warn!(
                conversation_id = %conversation.id,
                role = role.as_str(),
                error = %e,
                "Failed to record message history"
            );
        }
    }
}

/// Substitute arguments into a command body and frame it for execution.
fn render_command(
    name: &str,
    body: &str,
    args: &[String],
    named: &HashMap<String, String>,
    issue_context: Option<&str>,
) -> String {
    let substituted = substitute_variables_with(body, args, named);
    let mut prompt = format!(
        "The user invoked the /{} command. Execute the following instructions immediately \
         without asking for confirmation:\n\n{}",
        name,
        substituted.trim_end()
    );
    if let Some(issue) = issue_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(SECTION_RULE);
        prompt.push_str(issue.trim());
    }
    prompt
}

fn image_meta(message: &InboundMessage) -> Option<serde_json::Value> {
    if message.images.is_empty() {
        None
    } else {
        serde_json::to_value(&message.images).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command() {
        let prompt = render_command(
            "plan-feature",
            "Plan: $1 ($ARGUMENTS)\n",
            &["dark-mode".to_string(), "now".to_string()],
            &HashMap::new(),
            None,
        );
        assert!(prompt.contains("Execute the following instructions immediately"));
        assert!(prompt.ends_with("Plan: dark-mode (dark-mode now)"));
    }

    #[test]
    fn test_render_command_appends_issue() {
        let prompt = render_command(
            "fix-issue",
            "Fix it",
            &[],
            &HashMap::new(),
            Some("Issue #12: crash on start"),
        );
        assert!(prompt.ends_with("Fix it\n\n---\n\nIssue #12: crash on start"));
    }

    #[test]
    fn test_render_command_fills_named_values() {
        let named = HashMap::from([("PLAN".to_string(), "1. add login".to_string())]);
        let prompt = render_command("execute", "Follow $PLAN in $HOME", &[], &named, None);
        assert!(prompt.ends_with("Follow 1. add login in $HOME"));
    }

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.fallback_cwd, PathBuf::from("/workspace"));
        assert_eq!(config.default_assistant, AssistantKind::Claude);
    }
}
