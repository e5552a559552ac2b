//! Telegram as a Relay platform.
//!
//! Conversation ids are `"<chat>"` for a chat and `"<chat>:<topic>"` for a
//! forum topic, whose parent is `"<chat>"`.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ThreadId};
use tracing::{debug, info};

use relay_core::{split_message, MAX_MESSAGE_LEN};
use relay_models::{PlatformType, StreamingMode};
use relay_orchestrator::{OrchestratorError, Platform};

/// Conversation id for a chat or one of its forum topics.
pub fn conversation_key(chat_id: ChatId, thread: Option<ThreadId>) -> String {
    match thread {
        Some(ThreadId(MessageId(topic))) => format!("{}:{}", chat_id.0, topic),
        None => chat_id.0.to_string(),
    }
}

/// Inverse of [`conversation_key`].
pub fn parse_conversation_key(key: &str) -> Option<(ChatId, Option<ThreadId>)> {
    match key.split_once(':') {
        Some((chat, topic)) => Some((
            ChatId(chat.parse().ok()?),
            Some(ThreadId(MessageId(topic.parse().ok()?))),
        )),
        None => Some((ChatId(key.parse().ok()?), None)),
    }
}

/// Sends orchestrator output to Telegram chats and topics.
pub struct TelegramPlatform {
    bot: Bot,
    mode: StreamingMode,
    /// Chats seen to be forums; their topic-less messages are general context.
    forums: Mutex<HashSet<i64>>,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, mode: StreamingMode) -> Self {
        Self {
            bot,
            mode,
            forums: Mutex::new(HashSet::new()),
        }
    }

    /// Remember that `chat_id` is a forum supergroup.
    pub fn mark_forum(&self, chat_id: ChatId) {
        if let Ok(mut forums) = self.forums.lock() {
            forums.insert(chat_id.0);
        }
    }

    fn is_forum(&self, chat_id: ChatId) -> bool {
        self.forums
            .lock()
            .map(|forums| forums.contains(&chat_id.0))
            .unwrap_or(false)
    }
}

fn platform_error(e: teloxide::RequestError) -> OrchestratorError {
    OrchestratorError::Platform(e.to_string())
}

fn bad_key(key: &str) -> OrchestratorError {
    OrchestratorError::Platform(format!("invalid Telegram conversation id: {}", key))
}

#[async_trait]
impl Platform for TelegramPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Telegram
    }

    fn streaming_mode(&self) -> StreamingMode {
        self.mode
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> relay_orchestrator::Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let (chat_id, thread) =
            parse_conversation_key(conversation_id).ok_or_else(|| bad_key(conversation_id))?;

        for part in split_message(text, MAX_MESSAGE_LEN) {
            let mut request = self.bot.send_message(chat_id, part);
            if let Some(thread) = thread {
                request = request.message_thread_id(thread);
            }
            request.await.map_err(platform_error)?;
        }
        debug!(chat_id = %chat_id, thread = ?thread, chars = text.len(), "Message sent");
        Ok(())
    }

    fn is_general_context(&self, conversation_id: &str) -> bool {
        match parse_conversation_key(conversation_id) {
            Some((chat_id, None)) => self.is_forum(chat_id),
            _ => false,
        }
    }

    async fn create_topic(
        &self,
        conversation_id: &str,
        name: &str,
    ) -> relay_orchestrator::Result<Option<String>> {
        let (chat_id, _) =
            parse_conversation_key(conversation_id).ok_or_else(|| bad_key(conversation_id))?;
        if !self.is_forum(chat_id) {
            return Ok(None);
        }

        let topic = self
            .bot
            .create_forum_topic(chat_id, name)
            .await
            .map_err(platform_error)?;
        info!(chat_id = %chat_id, topic = %name, "Created forum topic");
        Ok(Some(conversation_key(chat_id, Some(topic.thread_id))))
    }
}

/// True when `user_id` may use the bot. An empty allow-list admits everyone.
pub fn is_allowed(allowed: &[u64], user_id: Option<u64>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    user_id.is_some_and(|id| allowed.contains(&id))
}

/// Drop the `@bot` suffix Telegram appends to commands in group chats.
///
/// Returns `None` when the command is addressed to a different bot.
/// Anything that is not a command is returned unchanged.
pub fn strip_bot_mention(text: &str, username: &str) -> Option<String> {
    if !text.starts_with('/') {
        return Some(text.to_string());
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    let (head, rest) = text.split_at(end);
    match head.split_once('@') {
        None => Some(text.to_string()),
        Some((command, mention)) if mention.eq_ignore_ascii_case(username) => {
            Some(format!("{}{}", command, rest))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_keys() {
        assert_eq!(conversation_key(ChatId(-100123), None), "-100123");
        assert_eq!(
            conversation_key(ChatId(-100123), Some(ThreadId(MessageId(42)))),
            "-100123:42"
        );

        assert_eq!(
            parse_conversation_key("-100123:42"),
            Some((ChatId(-100123), Some(ThreadId(MessageId(42)))))
        );
        assert_eq!(parse_conversation_key("555"), Some((ChatId(555), None)));
        assert_eq!(parse_conversation_key("cli"), None);
        assert_eq!(parse_conversation_key("1:x"), None);
    }

    #[test]
    fn test_general_context_only_for_forums() {
        let platform = TelegramPlatform::new(Bot::new("123:TEST"), StreamingMode::Stream);
        assert!(!platform.is_general_context("-100123"));

        platform.mark_forum(ChatId(-100123));
        assert!(platform.is_general_context("-100123"));
        assert!(!platform.is_general_context("-100123:42"));
        assert!(!platform.is_general_context("555"));
    }

    #[test]
    fn test_allow_list() {
        assert!(is_allowed(&[], None));
        assert!(is_allowed(&[], Some(7)));
        assert!(is_allowed(&[7, 8], Some(8)));
        assert!(!is_allowed(&[7, 8], Some(9)));
        assert!(!is_allowed(&[7], None));
    }

    #[test]
    fn test_strip_bot_mention() {
        assert_eq!(
            strip_bot_mention("/status@RelayBot", "RelayBot").as_deref(),
            Some("/status")
        );
        assert_eq!(
            strip_bot_mention("/setcwd@relaybot ~/src/app", "RelayBot").as_deref(),
            Some("/setcwd ~/src/app")
        );
        assert_eq!(
            strip_bot_mention("/help", "RelayBot").as_deref(),
            Some("/help")
        );
        assert_eq!(
            strip_bot_mention("mail me at dev@RelayBot", "RelayBot").as_deref(),
            Some("mail me at dev@RelayBot")
        );
        assert_eq!(strip_bot_mention("/status@OtherBot", "RelayBot"), None);
    }
}
