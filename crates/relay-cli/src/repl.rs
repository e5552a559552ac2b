//! Interactive REPL that sends each line through the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::runtime::Runtime;
use tracing::debug;

use relay_orchestrator::commands::DETERMINISTIC_COMMANDS;
use relay_orchestrator::{InboundMessage, Orchestrator};

use crate::error::Result;
use crate::platform::CliPlatform;

/// Commands the REPL handles itself.
const LOCAL_COMMANDS: &[&str] = &["/quit", "/exit", "/q"];

/// Tab completion for slash commands.
struct CommandCompleter {
    commands: Vec<String>,
}

impl CommandCompleter {
    fn new() -> Self {
        let mut commands: Vec<String> = DETERMINISTIC_COMMANDS
            .iter()
            .map(|c| format!("/{}", c))
            .collect();
        commands.push("/command-invoke".to_string());
        commands.extend(LOCAL_COMMANDS.iter().map(|c| c.to_string()));
        commands.sort();
        Self { commands }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }

        let prefix = &line[..pos];
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// What to do with one input line.
#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Skip,
    Quit,
    Send(&'a str),
}

fn classify_line(line: &str) -> LineAction<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineAction::Skip
    } else if LOCAL_COMMANDS.contains(&trimmed) {
        LineAction::Quit
    } else {
        LineAction::Send(trimmed)
    }
}

/// REPL state
pub struct Repl {
    editor: Editor<CommandCompleter, DefaultHistory>,
    runtime: Runtime,
    orchestrator: Arc<Orchestrator>,
    platform: CliPlatform,
    conversation_id: String,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Creates a new REPL bound to one conversation.
    pub fn new(
        runtime: Runtime,
        orchestrator: Arc<Orchestrator>,
        platform: CliPlatform,
        conversation_id: impl Into<String>,
        history_path: Option<PathBuf>,
    ) -> Result<Self> {
        let config = rustyline::Config::builder()
            .completion_type(rustyline::CompletionType::List)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(CommandCompleter::new()));

        if let Some(path) = history_path.as_ref().filter(|p| p.exists()) {
            let _ = editor.load_history(path);
        }

        Ok(Self {
            editor,
            runtime,
            orchestrator,
            platform,
            conversation_id: conversation_id.into(),
            history_path,
        })
    }

    /// Send one message and wait for the turn to finish.
    pub fn send(&self, text: &str) {
        debug!(conversation_id = %self.conversation_id, "Sending line");
        self.runtime.block_on(self.orchestrator.handle_message(
            &self.platform,
            InboundMessage::new(&self.conversation_id, text),
        ));
    }

    /// Runs the REPL loop.
    pub fn run(&mut self) -> Result<()> {
        println!("Relay REPL v{}", env!("CARGO_PKG_VERSION"));
        println!("Conversation: {}", self.conversation_id);
        println!("Type /help for commands, /quit to exit");
        println!();

        loop {
            match self.editor.readline("relay> ") {
                Ok(line) => {
                    self.editor.add_history_entry(line.as_str())?;
                    match classify_line(&line) {
                        LineAction::Skip => {}
                        LineAction::Quit => break,
                        LineAction::Send(text) => self.send(text),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => {
                    println!("^D");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = self.editor.save_history(path);
        }

        println!("Goodbye!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("   "), LineAction::Skip);
        assert_eq!(classify_line("/quit"), LineAction::Quit);
        assert_eq!(classify_line(" /q "), LineAction::Quit);
        assert_eq!(classify_line("/status"), LineAction::Send("/status"));
        assert_eq!(classify_line(" fix the bug "), LineAction::Send("fix the bug"));
    }

    #[test]
    fn test_completer_matches_prefix() {
        let completer = CommandCompleter::new();
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);

        let (pos, matches) = completer.complete("/comm", 5, &ctx).unwrap();
        assert_eq!(pos, 0);
        let replacements: Vec<&str> = matches.iter().map(|m| m.replacement.as_str()).collect();
        assert_eq!(
            replacements,
            vec!["/command-invoke", "/command-set", "/commands"]
        );
    }

    #[test]
    fn test_completer_non_slash_ignored() {
        let completer = CommandCompleter::new();
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);

        let (_, matches) = completer.complete("status", 6, &ctx).unwrap();
        assert!(matches.is_empty());
    }
}
