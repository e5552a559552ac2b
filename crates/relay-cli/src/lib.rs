//! Relay terminal client.
//!
//! A REPL that feeds each line to the orchestrator as a `cli` platform
//! conversation and prints the replies. Handy for driving an assistant on
//! the local machine with the same commands the chat adapters offer.

pub mod error;
pub mod platform;
pub mod repl;

pub use error::{CliError, Result};
pub use platform::CliPlatform;
pub use repl::Repl;
