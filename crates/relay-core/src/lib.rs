//! Relay Core - shared helpers for all Relay crates.
//!
//! - **command**: Slash-command parsing
//! - **variables**: `$1`/`$ARGUMENTS` substitution in command templates
//! - **tool_format**: Human-readable tool-call notices
//! - **output_filter**: Batch-mode response cleaning and message splitting
//! - **config**: State directory paths and runtime settings

pub mod command;
pub mod config;
pub mod output_filter;
pub mod tool_format;
pub mod variables;

pub use command::{is_command, parse_command, ParsedCommand};
pub use config::{
    cache_dir, config_dir, db_dir, db_path, ensure_all_dirs, env_file, load_env_files, logs_dir,
    state_dir, templates_dir, ConfigError, RelaySettings,
};
pub use output_filter::{clean_batch_response, split_message, MAX_MESSAGE_LEN};
pub use tool_format::format_tool_call;
pub use variables::{substitute_variables, substitute_variables_with};
