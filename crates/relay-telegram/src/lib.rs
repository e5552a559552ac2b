//! Telegram adapter for Relay.
//!
//! This crate connects a Telegram bot to the Relay orchestrator so coding
//! assistants can be driven from Telegram chats and forum topics.
//!
//! # Features
//!
//! - Long-polling dispatcher, no webhook setup needed
//! - One conversation per chat, or per topic in forum supergroups
//! - Topics inherit the project of their forum chat
//! - Photos are downloaded and passed to the assistant as images
//! - Long replies are split at Telegram's message limit
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//!
//! Optional:
//! - `TELEGRAM_STREAMING_MODE`: `stream` (default) or `batch`
//! - `TELEGRAM_ALLOWED_USER_IDS`: Comma-separated user ids; empty allows everyone
//!
//! # Example
//!
//! ```no_run
//! use relay_core::{cache_dir, RelaySettings};
//! use relay_orchestrator::Orchestrator;
//! use relay_telegram::TelegramBot;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RelaySettings::from_env()?;
//!     let orchestrator = Arc::new(Orchestrator::from_settings(&settings).await?);
//!     let bot = TelegramBot::new(&settings, orchestrator, cache_dir().join("telegram"))?;
//!     bot.start_polling().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod error;
pub mod platform;

pub use bot::TelegramBot;
pub use error::{Result, TelegramError};
pub use platform::{
    conversation_key, is_allowed, parse_conversation_key, strip_bot_mention, TelegramPlatform,
};
