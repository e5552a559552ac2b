//! Relay CLI entry point.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use relay_cli::{CliPlatform, Repl, Result};
use relay_core::{config, RelaySettings};
use relay_models::StreamingMode;
use relay_orchestrator::Orchestrator;

/// Relay - drive Claude Code or Codex from the terminal
#[derive(Parser, Debug)]
#[command(name = "relay", version)]
struct Cli {
    /// Database file (default: ~/.relay/db/relay.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Delivery mode: stream or batch (overrides CLI_STREAMING_MODE)
    #[arg(short, long)]
    mode: Option<StreamingMode>,

    /// Conversation id (default: the current directory)
    #[arg(short, long)]
    conversation: Option<String>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Send this message and exit instead of starting the REPL
    message: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    config::load_env_files();

    let filter = match cli.verbose {
        0 => "relay_cli=warn,relay_orchestrator=warn,relay_assistants=warn",
        1 => "relay_cli=info,relay_orchestrator=info,relay_assistants=info",
        2 => "relay_cli=debug,relay_orchestrator=debug,relay_assistants=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    config::ensure_all_dirs()?;

    let mut settings = RelaySettings::from_env()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    let mode = cli.mode.unwrap_or(settings.cli_streaming_mode);

    let conversation_id = match cli.conversation {
        Some(id) => id,
        None => std::env::current_dir()?.display().to_string(),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let orchestrator = Arc::new(runtime.block_on(Orchestrator::from_settings(&settings))?);

    let mut repl = Repl::new(
        runtime,
        orchestrator,
        CliPlatform::new(mode),
        conversation_id,
        Some(config::state_dir().join("repl_history.txt")),
    )?;

    if cli.message.is_empty() {
        repl.run()
    } else {
        repl.send(&cli.message.join(" "));
        Ok(())
    }
}
