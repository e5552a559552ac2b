//! Long-polling Telegram bot that feeds the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::PhotoSize;
use tracing::{debug, info, warn};

use relay_core::RelaySettings;
use relay_models::ImageAttachment;
use relay_orchestrator::{InboundMessage, Orchestrator};

use crate::error::{Result, TelegramError};
use crate::platform::{conversation_key, is_allowed, strip_bot_mention, TelegramPlatform};

/// The Telegram bot for Relay.
pub struct TelegramBot {
    bot: Bot,
    platform: Arc<TelegramPlatform>,
    orchestrator: Arc<Orchestrator>,
    allowed_users: Arc<Vec<u64>>,
    /// Where photo attachments are downloaded.
    download_dir: PathBuf,
}

impl TelegramBot {
    /// Create the bot from settings. Requires a bot token.
    pub fn new(
        settings: &RelaySettings,
        orchestrator: Arc<Orchestrator>,
        download_dir: PathBuf,
    ) -> Result<Self> {
        let token = settings
            .telegram_bot_token
            .clone()
            .ok_or(TelegramError::NoToken)?;
        let bot = Bot::new(token);
        let platform = Arc::new(TelegramPlatform::new(
            bot.clone(),
            settings.telegram_streaming_mode,
        ));

        Ok(Self {
            bot,
            platform,
            orchestrator,
            allowed_users: Arc::new(settings.telegram_allowed_user_ids.clone()),
            download_dir,
        })
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_string())
    }

    /// Run the dispatcher until Ctrl+C.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        let username = self.get_me().await?;
        let context = Arc::new(HandlerContext {
            username,
            platform: Arc::clone(&self.platform),
            orchestrator: Arc::clone(&self.orchestrator),
            allowed_users: Arc::clone(&self.allowed_users),
            download_dir: self.download_dir.clone(),
        });

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let context = Arc::clone(&context);
            async move {
                context.handle(bot, msg).await;
                respond(())
            }
        });

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|upd| async move {
                debug!(update_id = ?upd.id, "Unhandled update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

struct HandlerContext {
    /// Our own username, for commands written as `/cmd@username`.
    username: String,
    platform: Arc<TelegramPlatform>,
    orchestrator: Arc<Orchestrator>,
    allowed_users: Arc<Vec<u64>>,
    download_dir: PathBuf,
}

impl HandlerContext {
    async fn handle(&self, bot: Bot, msg: Message) {
        let user_id = msg.from.as_ref().map(|u| u.id.0);
        if !is_allowed(&self.allowed_users, user_id) {
            warn!(chat_id = %msg.chat.id, user_id = ?user_id, "Ignoring message from unauthorized user");
            return;
        }

        if msg.chat.is_forum() {
            self.platform.mark_forum(msg.chat.id);
        }

        let Some(inbound) = self.inbound(&bot, &msg).await else {
            return;
        };
        info!(
            conversation_id = %inbound.conversation_id,
            images = inbound.images.len(),
            "Message received"
        );
        self.orchestrator
            .handle_message(self.platform.as_ref(), inbound)
            .await;
    }

    /// Build the orchestrator input. Messages without text or photos are skipped.
    async fn inbound(&self, bot: &Bot, msg: &Message) -> Option<InboundMessage> {
        let topic = if msg.is_topic_message { msg.thread_id } else { None };
        let key = conversation_key(msg.chat.id, topic);

        let mut images = Vec::new();
        if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
            match self.download_photo(bot, photo).await {
                Ok(image) => images.push(image),
                Err(e) => warn!(conversation_id = %key, error = %e, "Failed to download photo"),
            }
        }

        let raw = msg.text().or(msg.caption()).unwrap_or_default();
        let Some(text) = message_text(raw, !images.is_empty(), &self.username) else {
            debug!(conversation_id = %key, "Skipping message");
            return None;
        };

        let mut inbound = InboundMessage::new(&key, text).with_images(images);
        if topic.is_some() {
            inbound = inbound.with_parent(conversation_key(msg.chat.id, None));
        }
        if let Some(context) = reply_context(msg) {
            inbound = inbound.with_thread_context(context);
        }
        Some(inbound)
    }

    async fn download_photo(&self, bot: &Bot, photo: &PhotoSize) -> Result<ImageAttachment> {
        let file = bot.get_file(photo.file.id.clone()).await?;
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self
            .download_dir
            .join(format!("{}.jpg", photo.file.unique_id));
        let mut dst = tokio::fs::File::create(&path).await?;
        bot.download_file(&file.path, &mut dst).await?;
        debug!(path = %path.display(), "Downloaded photo");
        Ok(ImageAttachment::new(path, "image/jpeg"))
    }
}

/// Text handed to the orchestrator, or `None` when there is nothing for us.
fn message_text(raw: &str, has_images: bool, username: &str) -> Option<String> {
    let text = strip_bot_mention(raw.trim(), username)?;
    if !text.is_empty() {
        Some(text)
    } else if has_images {
        Some("Please look at the attached image.".to_string())
    } else {
        None
    }
}

/// The message being replied to, as a one-line context block.
fn reply_context(msg: &Message) -> Option<String> {
    let replied = msg.reply_to_message()?;
    // Topic messages reply to the topic's creation message implicitly.
    if replied.forum_topic_created().is_some() {
        return None;
    }
    let text = replied.text().or(replied.caption())?.trim();
    if text.is_empty() {
        return None;
    }
    let author = replied
        .from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "someone".to_string());
    Some(format!("{}: {}", author, text))
}
