//! Relay Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx cargo run -p relay-telegram
//! ```

use clap::Parser;
use relay_core::config;
use relay_core::RelaySettings;
use relay_models::StreamingMode;
use relay_orchestrator::Orchestrator;
use relay_telegram::TelegramBot;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Relay Telegram Bot - drive coding assistants from Telegram
#[derive(Parser, Debug)]
#[command(name = "relay-telegram")]
#[command(about = "Telegram bot for Relay - drive Claude Code or Codex remotely")]
struct Args {
    /// Database file (default: ~/.relay/db/relay.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Delivery mode: stream or batch (overrides TELEGRAM_STREAMING_MODE)
    #[arg(short, long)]
    mode: Option<StreamingMode>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    config::load_env_files();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "relay_telegram=info,relay_orchestrator=info,relay_assistants=info,teloxide=warn",
        1 => "relay_telegram=debug,relay_orchestrator=debug,relay_assistants=debug,teloxide=info",
        2 => "relay_telegram=trace,relay_orchestrator=trace,relay_assistants=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let mut settings = RelaySettings::from_env()?;
    if let Some(db) = args.db {
        settings.db_path = db;
    }
    if let Some(mode) = args.mode {
        settings.telegram_streaming_mode = mode;
    }

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings).await?);
    let bot = TelegramBot::new(&settings, orchestrator, config::cache_dir().join("telegram"))?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\nRelay Telegram Bot");
            println!("   Bot: @{}", username);
            println!("   Mode: {:?}", settings.telegram_streaming_mode);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\nOpen Telegram and send /help to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
