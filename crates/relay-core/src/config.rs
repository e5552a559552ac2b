//! Shared configuration for Relay.
//!
//! Locates Relay's state directory and reads runtime settings from the
//! environment. Nothing below the binaries reads the environment directly;
//! they call [`RelaySettings::from_env`] once and pass values down.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.relay/
//! ├── db/           # SQLite database (relay.db)
//! ├── logs/         # Application logs
//! ├── config/       # .env.local and user configuration
//! │   └── templates/  # Global command templates (*.md)
//! └── cache/        # Downloaded attachments
//! ```
//!
//! # Environment Variables
//!
//! - `RELAY_STATE_DIR`: Override the base state directory
//! - `RELAY_DB_DIR`: Override the database directory
//! - `RELAY_LOG_DIR`: Override the log directory
//! - `RELAY_CONFIG_DIR`: Override the config directory
//! - `RELAY_CACHE_DIR`: Override the cache directory
//! - `RELAY_TEMPLATES_DIR`: Override the template seed directory

use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

use relay_models::StreamingMode;

pub const STATE_DIR_ENV: &str = "RELAY_STATE_DIR";
pub const DB_DIR_ENV: &str = "RELAY_DB_DIR";
pub const LOG_DIR_ENV: &str = "RELAY_LOG_DIR";
pub const CONFIG_DIR_ENV: &str = "RELAY_CONFIG_DIR";
pub const CACHE_DIR_ENV: &str = "RELAY_CACHE_DIR";
pub const TEMPLATES_DIR_ENV: &str = "RELAY_TEMPLATES_DIR";

const DEFAULT_STATE_DIR: &str = ".relay";
const DEFAULT_WORKSPACE_ROOT: &str = "/workspace";
const DB_FILE: &str = "relay.db";

// Subdirectory names
const DB_SUBDIR: &str = "db";
const LOGS_SUBDIR: &str = "logs";
const CONFIG_SUBDIR: &str = "config";
const CACHE_SUBDIR: &str = "cache";
const TEMPLATES_SUBDIR: &str = "templates";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the Relay state directory.
///
/// Resolved once from `RELAY_STATE_DIR`, then `~/.relay`, then `.relay`
/// in the current directory.
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()))
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

fn dir_from_env(var: &str, subdir: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(subdir))
}

/// Database directory (`RELAY_DB_DIR` or `<state>/db`).
pub fn db_dir() -> PathBuf {
    dir_from_env(DB_DIR_ENV, DB_SUBDIR)
}

/// Default SQLite database file.
pub fn db_path() -> PathBuf {
    db_dir().join(DB_FILE)
}

pub fn logs_dir() -> PathBuf {
    dir_from_env(LOG_DIR_ENV, LOGS_SUBDIR)
}

pub fn config_dir() -> PathBuf {
    dir_from_env(CONFIG_DIR_ENV, CONFIG_SUBDIR)
}

/// Cache directory, used for downloaded image attachments.
pub fn cache_dir() -> PathBuf {
    dir_from_env(CACHE_DIR_ENV, CACHE_SUBDIR)
}

/// Directory of `*.md` files seeded as global command templates.
pub fn templates_dir() -> PathBuf {
    std::env::var(TEMPLATES_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join(TEMPLATES_SUBDIR))
}

/// The `.env.local` file holding secrets.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Ensure the state directory and all subdirectories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(db_dir())?;
    std::fs::create_dir_all(logs_dir())?;
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(cache_dir())?;
    Ok(())
}

/// Load `.env` files: the config directory's `.env.local` first, then
/// `.env.local` or `.env` in the working directory. Existing variables win.
pub fn load_env_files() {
    let env_path = env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());
}

/// Errors raised while reading settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// Runtime settings gathered from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    /// Assistant tag for new conversations (`claude` or `codex`).
    pub default_assistant: String,
    /// Fallback working directory and clone root.
    pub workspace_root: PathBuf,
    pub telegram_bot_token: Option<String>,
    pub telegram_streaming_mode: StreamingMode,
    /// Telegram users allowed to talk to the bot. Empty allows everyone.
    pub telegram_allowed_user_ids: Vec<u64>,
    pub cli_streaming_mode: StreamingMode,
    pub kb_auto_research: bool,
    pub mcp_config_path: Option<PathBuf>,
    pub claude_bin: String,
    pub codex_bin: String,
    pub db_path: PathBuf,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            default_assistant: "claude".to_string(),
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            telegram_bot_token: None,
            telegram_streaming_mode: StreamingMode::Stream,
            telegram_allowed_user_ids: Vec::new(),
            cli_streaming_mode: StreamingMode::Stream,
            kb_auto_research: false,
            mcp_config_path: None,
            claude_bin: "claude".to_string(),
            codex_bin: "codex".to_string(),
            db_path: PathBuf::from(DB_FILE),
        }
    }
}

impl RelaySettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        if std::env::var("RELAY_DB_PATH").is_err() {
            settings.db_path = db_path();
        }
        Ok(settings)
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let invalid = |var: &str, value: &str| ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        };

        let mut settings = Self::default();

        if let Some(assistant) = get("DEFAULT_AI_ASSISTANT") {
            let assistant = assistant.to_lowercase();
            if assistant != "claude" && assistant != "codex" {
                return Err(invalid("DEFAULT_AI_ASSISTANT", &assistant));
            }
            settings.default_assistant = assistant;
        }
        if let Some(root) = get("RELAY_WORKSPACE_ROOT") {
            settings.workspace_root = PathBuf::from(shellexpand::tilde(&root).to_string());
        }
        settings.telegram_bot_token = get("TELEGRAM_BOT_TOKEN");
        if let Some(mode) = get("TELEGRAM_STREAMING_MODE") {
            settings.telegram_streaming_mode = mode
                .parse()
                .map_err(|_| invalid("TELEGRAM_STREAMING_MODE", &mode))?;
        }
        if let Some(ids) = get("TELEGRAM_ALLOWED_USER_IDS") {
            settings.telegram_allowed_user_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u64>()
                        .map_err(|_| invalid("TELEGRAM_ALLOWED_USER_IDS", s))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(mode) = get("CLI_STREAMING_MODE") {
            settings.cli_streaming_mode = mode
                .parse()
                .map_err(|_| invalid("CLI_STREAMING_MODE", &mode))?;
        }
        if let Some(flag) = get("KB_AUTO_RESEARCH") {
            settings.kb_auto_research =
                parse_bool(&flag).ok_or_else(|| invalid("KB_AUTO_RESEARCH", &flag))?;
        }
        settings.mcp_config_path =
            get("MCP_CONFIG_PATH").map(|p| PathBuf::from(shellexpand::tilde(&p).to_string()));
        if let Some(bin) = get("CLAUDE_BIN") {
            settings.claude_bin = bin;
        }
        if let Some(bin) = get("CODEX_BIN") {
            settings.codex_bin = bin;
        }
        if let Some(path) = get("RELAY_DB_PATH") {
            settings.db_path = PathBuf::from(shellexpand::tilde(&path).to_string());
        }

        Ok(settings)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<RelaySettings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelaySettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_path_names() {
        assert!(db_path().ends_with("relay.db"));
        assert!(env_file().ends_with(".env.local"));
        assert!(cache_dir().to_string_lossy().contains("cache"));
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.default_assistant, "claude");
        assert_eq!(settings.workspace_root, PathBuf::from("/workspace"));
        assert_eq!(settings.telegram_streaming_mode, StreamingMode::Stream);
        assert!(settings.telegram_allowed_user_ids.is_empty());
        assert!(!settings.kb_auto_research);
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("DEFAULT_AI_ASSISTANT", "Codex"),
            ("RELAY_WORKSPACE_ROOT", "/srv/code"),
            ("TELEGRAM_STREAMING_MODE", "batch"),
            ("TELEGRAM_ALLOWED_USER_IDS", "1, 22 ,333"),
            ("KB_AUTO_RESEARCH", "yes"),
            ("CLAUDE_BIN", "/opt/claude"),
            ("RELAY_DB_PATH", "/tmp/relay.db"),
        ])
        .unwrap();
        assert_eq!(settings.default_assistant, "codex");
        assert_eq!(settings.workspace_root, PathBuf::from("/srv/code"));
        assert_eq!(settings.telegram_streaming_mode, StreamingMode::Batch);
        assert_eq!(settings.telegram_allowed_user_ids, vec![1, 22, 333]);
        assert!(settings.kb_auto_research);
        assert_eq!(settings.claude_bin, "/opt/claude");
        assert_eq!(settings.db_path, PathBuf::from("/tmp/relay.db"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            settings_from(&[("DEFAULT_AI_ASSISTANT", "gpt")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(settings_from(&[("TELEGRAM_ALLOWED_USER_IDS", "abc")]).is_err());
        assert!(settings_from(&[("CLI_STREAMING_MODE", "sometimes")]).is_err());
    }
}
