//! Deterministic slash commands.
//!
//! These never touch the assistant. The orchestrator hands them to a
//! [`CommandHandler`] and relays the returned text.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use relay_core::ParsedCommand;
use relay_models::{
    Codebase, CommandEntry, CommandTemplate, Conversation, ConversationUpdate, MessageRole,
    NewCodebase, NewSession,
};
use relay_persistence::Stores;

use crate::error::{OrchestratorError, Result};
use crate::platform::Platform;
use crate::tool_config::ToolConfigSource;

/// Commands handled without an assistant.
pub const DETERMINISTIC_COMMANDS: &[&str] = &[
    "help",
    "status",
    "getcwd",
    "setcwd",
    "clone",
    "repos",
    "repo",
    "reset",
    "resume",
    "commands",
    "load-commands",
    "command-set",
    "templates",
    "template-add",
    "template-delete",
    "worktree",
    "new-topic",
];

/// Commands allowed where the platform reports no project scope.
pub const GENERAL_CONTEXT_COMMANDS: &[&str] = &["help", "status", "repos", "new-topic"];

const DEFAULT_RESUME_COUNT: usize = 10;
const DEFAULT_COMMANDS_DIR: &str = ".claude/commands";

pub fn is_deterministic(command: &str) -> bool {
    DETERMINISTIC_COMMANDS.contains(&command)
}

pub fn allowed_in_general_context(command: &str) -> bool {
    GENERAL_CONTEXT_COMMANDS.contains(&command)
}

/// Reply from a deterministic command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub message: String,
    /// The conversation's working context changed.
    pub modified: bool,
}

impl CommandOutcome {
    pub fn reply(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            modified: false,
        }
    }

    pub fn modified(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            modified: true,
        }
    }
}

/// Executes deterministic commands.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        platform: &dyn Platform,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome>;
}

/// The built-in command set.
pub struct BuiltinCommands {
    stores: Stores,
    tool_config: Arc<dyn ToolConfigSource>,
    workspace_root: PathBuf,
}

impl BuiltinCommands {
    pub fn new(
        stores: Stores,
        tool_config: Arc<dyn ToolConfigSource>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stores,
            tool_config,
            workspace_root: workspace_root.into(),
        }
    }

    async fn codebase_of(&self, conversation: &Conversation) -> Result<Option<Codebase>> {
        match &conversation.codebase_id {
            Some(id) => Ok(self.stores.codebases.get_codebase(id).await?),
            None => Ok(None),
        }
    }

    fn working_dir(&self, conversation: &Conversation, codebase: Option<&Codebase>) -> PathBuf {
        conversation
            .working_dir()
            .map(PathBuf::from)
            .or_else(|| codebase.map(|c| PathBuf::from(&c.default_cwd)))
            .unwrap_or_else(|| self.workspace_root.clone())
    }

    /// Deactivate the active session. Returns true if there was one.
    async fn end_session(&self, conversation: &Conversation) -> Result<bool> {
        match self
            .stores
            .sessions
            .get_active_session(&conversation.id)
            .await?
        {
            Some(session) => {
                self.stores.sessions.deactivate_session(&session.id).await?;
                debug!(session_id = %session.id, "Deactivated session");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn switch_context(
        &self,
        conversation: &Conversation,
        update: ConversationUpdate,
    ) -> Result<Conversation> {
        let updated = self
            .stores
            .conversations
            .update_conversation(&conversation.id, update)
            .await?;
        self.end_session(conversation).await?;
        Ok(updated)
    }

    fn help(&self) -> CommandOutcome {
        CommandOutcome::reply(
            "Available commands:\n\
             \n\
             /help - Show this message\n\
             /status - Show conversation status\n\
             /getcwd - Show the working directory\n\
             /setcwd <path> - Change the working directory\n\
             /clone <url> - Clone a repository and use it\n\
             /repos - List registered codebases\n\
             /repo <name> - Switch to a registered codebase\n\
             /reset - Start a fresh assistant session\n\
             /resume [n] - New session primed with the last n messages (default 10)\n\
             /commands - List codebase commands\n\
             /load-commands [dir] - Register command files from a directory\n\
             /command-set <name> <path> - Register one command file\n\
             /command-invoke <name> [args] - Run a codebase command\n\
             /templates - List global templates\n\
             /template-add <name> <path> - Add a global template from a file\n\
             /template-delete <name> - Remove a global template\n\
             /worktree create <branch> | list | remove - Manage git worktrees\n\
             /new-topic <name> - Open a new topic (forum chats)\n\
             \n\
             Any other text is sent to the AI assistant.",
        )
    }

    async fn status(&self, conversation: &Conversation) -> Result<CommandOutcome> {
        let codebase = self.codebase_of(conversation).await?;
        let session = self
            .stores
            .sessions
            .get_active_session(&conversation.id)
            .await?;

        let mut lines = vec![
            format!("Platform: {}", conversation.platform_type),
            format!("Assistant: {}", conversation.ai_assistant_type),
            format!(
                "Codebase: {}",
                codebase.as_ref().map(|c| c.name.as_str()).unwrap_or("none")
            ),
            format!(
                "Working directory: {}",
                self.working_dir(conversation, codebase.as_ref()).display()
            ),
        ];
        if let Some(worktree) = &conversation.worktree_path {
            lines.push(format!("Worktree: {}", worktree));
        }
        match session {
            Some(s) => {
                lines.push(format!("Session: {} (active)", s.id));
                if let Some(cmd) = s.last_command() {
                    lines.push(format!("Last command: /{}", cmd));
                }
            }
            None => lines.push("Session: none".to_string()),
        }
        Ok(CommandOutcome::reply(lines.join("\n")))
    }

    async fn getcwd(&self, conversation: &Conversation) -> Result<CommandOutcome> {
        let codebase = self.codebase_of(conversation).await?;
        Ok(CommandOutcome::reply(format!(
            "Current working directory: {}",
            self.working_dir(conversation, codebase.as_ref()).display()
        )))
    }

    async fn setcwd(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let Some(raw) = command.arg(0) else {
            return Ok(CommandOutcome::reply("Usage: /setcwd <path>"));
        };
        let path = PathBuf::from(shellexpand::tilde(raw).to_string());
        if !tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(CommandOutcome::reply(format!(
                "Directory not found: {}",
                path.display()
            )));
        }

        self.switch_context(
            conversation,
            ConversationUpdate::default()
                .cwd(Some(path.display().to_string()))
                .worktree(None),
        )
        .await?;
        info!(conversation_id = %conversation.id, cwd = %path.display(), "Working directory changed");
        Ok(CommandOutcome::modified(format!(
            "Working directory set to {}\nSession reset.",
            path.display()
        )))
    }

    async fn clone(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let Some(url) = command.arg(0) else {
            return Ok(CommandOutcome::reply("Usage: /clone <repository-url>"));
        };
        let Some(name) = repo_name_from_url(url) else {
            return Ok(CommandOutcome::reply(format!(
                "Cannot derive a repository name from {}",
                url
            )));
        };

        let target = self.workspace_root.join(&name);
        if tokio::fs::metadata(&target).await.is_ok() {
            return Ok(CommandOutcome::reply(format!(
                "{} already exists. Use /repo {} to switch to it.",
                target.display(),
                name
            )));
        }
        tokio::fs::create_dir_all(&self.workspace_root).await?;

        let target_str = target.display().to_string();
        if let Err(e) = run_git(&self.workspace_root, &["clone", url, &target_str]).await {
            return Ok(CommandOutcome::reply(format!("Clone failed: {}", git_reason(&e))));
        }

        let codebase = match self.stores.codebases.find_codebase_by_name(&name).await? {
            Some(existing) => existing,
            None => {
                self.stores
                    .codebases
                    .create_codebase(
                        NewCodebase::new(&name, &target_str, &conversation.ai_assistant_type)
                            .with_repository(url),
                    )
                    .await?
            }
        };

        let discovered = discover_commands(&target, DEFAULT_COMMANDS_DIR).await?;
        let count = discovered.len();
        if !discovered.is_empty() {
            let mut commands = codebase.commands.clone();
            commands.extend(discovered);
            self.stores
                .codebases
                .update_codebase_commands(&codebase.id, commands)
                .await?;
        }

        self.switch_context(
            conversation,
            ConversationUpdate::default()
                .codebase(Some(codebase.id.clone()))
                .cwd(Some(target_str.clone()))
                .worktree(None),
        )
        .await?;
        info!(codebase = %name, path = %target_str, "Cloned repository");

        let mut message = format!("Cloned {} into {}", name, target_str);
        if count > 0 {
            message.push_str(&format!("\nLoaded {} command(s). Use /commands to list them.", count));
        }
        Ok(CommandOutcome::modified(message))
    }

    async fn repos(&self, conversation: &Conversation) -> Result<CommandOutcome> {
        let codebases = self.stores.codebases.list_codebases().await?;
        if codebases.is_empty() {
            return Ok(CommandOutcome::reply(
                "No codebases registered. Use /clone <url> to add one.",
            ));
        }
        let lines: Vec<String> = codebases
            .iter()
            .map(|c| {
                let marker = if conversation.codebase_id.as_ref() == Some(&c.id) {
                    "* "
                } else {
                    "  "
                };
                format!("{}{} ({})", marker, c.name, c.default_cwd)
            })
            .collect();
        Ok(CommandOutcome::reply(format!("Codebases:\n{}", lines.join("\n"))))
    }

    async fn repo(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let Some(name) = command.arg(0) else {
            return Ok(CommandOutcome::reply("Usage: /repo <name>"));
        };
        let Some(codebase) = self.stores.codebases.find_codebase_by_name(name).await? else {
            return Ok(CommandOutcome::reply(format!(
                "Codebase not found: {}. Use /repos to list codebases.",
                name
            )));
        };

        self.switch_context(
            conversation,
            ConversationUpdate::default()
                .codebase(Some(codebase.id.clone()))
                .cwd(Some(codebase.default_cwd.clone()))
                .worktree(None),
        )
        .await?;
        Ok(CommandOutcome::modified(format!(
            "Switched to {} ({})\nSession reset.",
            codebase.name, codebase.default_cwd
        )))
    }

    async fn reset(&self, conversation: &Conversation) -> Result<CommandOutcome> {
        if self.end_session(conversation).await? {
            Ok(CommandOutcome::reply(
                "Session cleared. The next message starts a fresh session.",
            ))
        } else {
            Ok(CommandOutcome::reply("No active session."))
        }
    }

    async fn resume(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let count = match command.arg(0) {
            None => DEFAULT_RESUME_COUNT,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Ok(CommandOutcome::reply("Usage: /resume [number-of-messages]")),
            },
        };

        let messages = self
            .stores
            .messages
            .recent_messages(&conversation.id, count)
            .await?;
        if messages.is_empty() {
            return Ok(CommandOutcome::reply("No message history to resume from."));
        }

        let mut history = format!(
            "## Previous conversation (last {} messages)\n",
            messages.len()
        );
        for message in &messages {
            let speaker = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            history.push_str(&format!("\n{}: {}\n", speaker, message.text));
        }

        self.end_session(conversation).await?;
        let session = self
            .stores
            .sessions
            .create_session(
                NewSession::new(
                    conversation.id.clone(),
                    conversation.codebase_id.clone(),
                    &conversation.ai_assistant_type,
                )
                .with_config_hash(self.tool_config.config_hash())
                .with_history(history),
            )
            .await?;
        info!(session_id = %session.id, messages = messages.len(), "Resumed with history");

        Ok(CommandOutcome::reply(format!(
            "Started a new session with the last {} message(s) as context.",
            messages.len()
        )))
    }

    async fn commands(&self, conversation: &Conversation) -> Result<CommandOutcome> {
        let Some(codebase) = self.codebase_of(conversation).await? else {
            return Ok(CommandOutcome::reply(NO_CODEBASE_FOR_COMMANDS));
        };
        if codebase.commands.is_empty() {
            return Ok(CommandOutcome::reply(format!(
                "{} has no registered commands. Use /load-commands to register some.",
                codebase.name
            )));
        }
        let lines: Vec<String> = codebase
            .commands
            .iter()
            .map(|(name, entry)| {
                if entry.description.is_empty() {
                    format!("/{}", name)
                } else {
                    format!("/{} - {}", name, entry.description)
                }
            })
            .collect();
        Ok(CommandOutcome::reply(format!(
            "Commands for {} (run with /command-invoke <name>):\n{}",
            codebase.name,
            lines.join("\n")
        )))
    }

    async fn load_commands(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let Some(codebase) = self.codebase_of(conversation).await? else {
            return Ok(CommandOutcome::reply(NO_CODEBASE_FOR_COMMANDS));
        };
        let dir = command.arg(0).unwrap_or(DEFAULT_COMMANDS_DIR);
        let root = self.working_dir(conversation, Some(&codebase));
        if tokio::fs::metadata(root.join(dir)).await.is_err() {
            return Ok(CommandOutcome::reply(format!("Directory not found: {}", dir)));
        }

        let discovered = discover_commands(&root, dir).await?;
        if discovered.is_empty() {
            return Ok(CommandOutcome::reply(format!("No .md command files in {}", dir)));
        }
        let names: Vec<String> = discovered.keys().map(|n| format!("/{}", n)).collect();
        let mut commands = codebase.commands.clone();
        commands.extend(discovered);
        self.stores
            .codebases
            .update_codebase_commands(&codebase.id, commands)
            .await?;

        Ok(CommandOutcome::reply(format!(
            "Loaded {} command(s): {}",
            names.len(),
            names.join(", ")
        )))
    }

    async fn command_set(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let (Some(name), Some(path)) = (command.arg(0), command.arg(1)) else {
            return Ok(CommandOutcome::reply("Usage: /command-set <name> <path>"));
        };
        let Some(codebase) = self.codebase_of(conversation).await? else {
            return Ok(CommandOutcome::reply(NO_CODEBASE_FOR_COMMANDS));
        };
        let root = self.working_dir(conversation, Some(&codebase));
        let content = match tokio::fs::read_to_string(root.join(path)).await {
            Ok(content) => content,
            Err(_) => return Ok(CommandOutcome::reply(format!("File not found: {}", path))),
        };

        let mut commands = codebase.commands.clone();
        commands.insert(
            name.to_string(),
            CommandEntry::new(path, first_line_description(&content)),
        );
        self.stores
            .codebases
            .update_codebase_commands(&codebase.id, commands)
            .await?;
        Ok(CommandOutcome::reply(format!("Registered /{} -> {}", name, path)))
    }

    async fn templates(&self) -> Result<CommandOutcome> {
        let templates = self.stores.templates.list_templates().await?;
        if templates.is_empty() {
            return Ok(CommandOutcome::reply("No templates."));
        }
        let lines: Vec<String> = templates
            .iter()
            .map(|t| {
                if t.description.is_empty() {
                    format!("/{}", t.name)
                } else {
                    format!("/{} - {}", t.name, t.description)
                }
            })
            .collect();
        Ok(CommandOutcome::reply(format!("Templates:\n{}", lines.join("\n"))))
    }

    async fn template_add(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        let (Some(name), Some(path)) = (command.arg(0), command.arg(1)) else {
            return Ok(CommandOutcome::reply("Usage: /template-add <name> <path>"));
        };
        let codebase = self.codebase_of(conversation).await?;
        let full = self.working_dir(conversation, codebase.as_ref()).join(path);
        let content = match tokio::fs::read_to_string(&full).await {
            Ok(content) => content,
            Err(_) => return Ok(CommandOutcome::reply(format!("File not found: {}", path))),
        };

        self.stores
            .templates
            .upsert_template(CommandTemplate::new(
                name,
                first_line_description(&content),
                content,
            ))
            .await?;
        Ok(CommandOutcome::reply(format!("Template /{} saved.", name)))
    }

    async fn template_delete(&self, command: &ParsedCommand) -> Result<CommandOutcome> {
        let Some(name) = command.arg(0) else {
            return Ok(CommandOutcome::reply("Usage: /template-delete <name>"));
        };
        if self.stores.templates.delete_template(name).await? {
            Ok(CommandOutcome::reply(format!("Template /{} deleted.", name)))
        } else {
            Ok(CommandOutcome::reply(format!("Template not found: {}", name)))
        }
    }

    async fn worktree(
        &self,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        const USAGE: &str = "Usage: /worktree create <branch> | list | remove";
        let Some(codebase) = self.codebase_of(conversation).await? else {
            return Ok(CommandOutcome::reply(NO_CODEBASE_FOR_COMMANDS));
        };
        let repo = PathBuf::from(&codebase.default_cwd);

        match command.arg(0) {
            Some("create") => {
                let Some(branch) = command.arg(1) else {
                    return Ok(CommandOutcome::reply(USAGE));
                };
                let path = self
                    .workspace_root
                    .join("worktrees")
                    .join(&codebase.name)
                    .join(branch.replace('/', "-"));
                let path_str = path.display().to_string();

                let exists = run_git(&repo, &["rev-parse", "--verify", "--quiet", branch])
                    .await
                    .is_ok();
                let result = if exists {
                    run_git(&repo, &["worktree", "add", &path_str, branch]).await
                } else {
                    run_git(&repo, &["worktree", "add", "-b", branch, &path_str]).await
                };
                if let Err(e) = result {
                    return Ok(CommandOutcome::reply(format!(
                        "Worktree creation failed: {}",
                        git_reason(&e)
                    )));
                }

                self.switch_context(
                    conversation,
                    ConversationUpdate::default().worktree(Some(path_str.clone())),
                )
                .await?;
                Ok(CommandOutcome::modified(format!(
                    "Worktree for {} created at {}\nSession reset.",
                    branch, path_str
                )))
            }
            Some("list") => match run_git(&repo, &["worktree", "list"]).await {
                Ok(out) => Ok(CommandOutcome::reply(format!("Worktrees:\n{}", out.trim()))),
                Err(e) => Ok(CommandOutcome::reply(format!(
                    "Could not list worktrees: {}",
                    git_reason(&e)
                ))),
            },
            Some("remove") => {
                let Some(path) = conversation.worktree_path.clone() else {
                    return Ok(CommandOutcome::reply("This conversation has no worktree."));
                };
                if let Err(e) = run_git(&repo, &["worktree", "remove", &path]).await {
                    return Ok(CommandOutcome::reply(format!(
                        "Worktree removal failed: {}",
                        git_reason(&e)
                    )));
                }
                self.switch_context(conversation, ConversationUpdate::default().worktree(None))
                    .await?;
                Ok(CommandOutcome::modified(format!(
                    "Removed worktree {}\nSession reset.",
                    path
                )))
            }
            _ => Ok(CommandOutcome::reply(USAGE)),
        }
    }

    async fn new_topic(
        &self,
        platform: &dyn Platform,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        if command.args.is_empty() {
            return Ok(CommandOutcome::reply("Usage: /new-topic <name>"));
        }
        let name = command.args.join(" ");
        match platform
            .create_topic(&conversation.platform_conversation_id, &name)
            .await?
        {
            Some(_) => Ok(CommandOutcome::reply(format!("Created topic \"{}\".", name))),
            None => Ok(CommandOutcome::reply(
                "Topics are not supported on this platform.",
            )),
        }
    }
}

const NO_CODEBASE_FOR_COMMANDS: &str =
    "No codebase configured. Use /clone <url> or /repo <name> first.";

#[async_trait]
impl CommandHandler for BuiltinCommands {
    async fn handle(
        &self,
        platform: &dyn Platform,
        conversation: &Conversation,
        command: &ParsedCommand,
    ) -> Result<CommandOutcome> {
        debug!(command = %command.command, args = command.args.len(), "Running built-in command");
        match command.command.as_str() {
            "help" => Ok(self.help()),
            "status" => self.status(conversation).await,
            "getcwd" => self.getcwd(conversation).await,
            "setcwd" => self.setcwd(conversation, command).await,
            "clone" => self.clone(conversation, command).await,
            "repos" => self.repos(conversation).await,
            "repo" => self.repo(conversation, command).await,
            "reset" => self.reset(conversation).await,
            "resume" => self.resume(conversation, command).await,
            "commands" => self.commands(conversation).await,
            "load-commands" => self.load_commands(conversation, command).await,
            "command-set" => self.command_set(conversation, command).await,
            "templates" => self.templates().await,
            "template-add" => self.template_add(conversation, command).await,
            "template-delete" => self.template_delete(command).await,
            "worktree" => self.worktree(conversation, command).await,
            "new-topic" => self.new_topic(platform, conversation, command).await,
            other => Ok(CommandOutcome::reply(format!("Unknown command: /{}", other))),
        }
    }
}

/// `https://github.com/org/app.git` -> `app`.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn first_line_description(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .unwrap_or_default()
}

/// Every `*.md` file in `root/dir`, keyed by file stem, with paths relative
/// to `root`.
async fn discover_commands(root: &Path, dir: &str) -> Result<BTreeMap<String, CommandEntry>> {
    let mut found = BTreeMap::new();
    let full = root.join(dir);
    let mut entries = match tokio::fs::read_dir(&full).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = tokio::fs::read_to_string(&path).await?;
        let relative = Path::new(dir).join(entry.file_name());
        found.insert(
            name.to_string(),
            CommandEntry::new(
                relative.display().to_string(),
                first_line_description(&content),
            ),
        );
    }
    Ok(found)
}

async fn run_git(cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(OrchestratorError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn git_reason(error: &OrchestratorError) -> String {
    match error {
        OrchestratorError::Git { stderr, .. } if !stderr.is_empty() => {
            stderr.lines().last().unwrap_or(stderr).to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name_from_url() {
        assert_eq!(
            repo_name_from_url("https://github.com/org/app.git").as_deref(),
            Some("app")
        );
        assert_eq!(
            repo_name_from_url("git@github.com:org/tool.git").as_deref(),
            Some("tool")
        );
        assert_eq!(
            repo_name_from_url("https://example.com/org/site/").as_deref(),
            Some("site")
        );
        assert_eq!(repo_name_from_url(""), None);
    }

    #[test]
    fn test_command_sets() {
        assert!(is_deterministic("help"));
        assert!(is_deterministic("worktree"));
        assert!(!is_deterministic("command-invoke"));
        assert!(!is_deterministic("plan-feature"));
        assert!(allowed_in_general_context("status"));
        assert!(!allowed_in_general_context("setcwd"));
    }

    #[test]
    fn test_first_line_description() {
        assert_eq!(first_line_description("\n# Execute a plan\nbody"), "Execute a plan");
        assert_eq!(first_line_description(""), "");
    }

    #[tokio::test]
    async fn test_discover_commands() {
        let dir = tempfile::TempDir::new().unwrap();
        let commands = dir.path().join(".claude/commands");
        std::fs::create_dir_all(&commands).unwrap();
        std::fs::write(commands.join("plan-feature.md"), "# Plan a feature\n$ARGUMENTS").unwrap();
        std::fs::write(commands.join("README.txt"), "ignored").unwrap();

        let found = discover_commands(dir.path(), DEFAULT_COMMANDS_DIR).await.unwrap();
        assert_eq!(found.len(), 1);
        let entry = &found["plan-feature"];
        assert_eq!(entry.path, ".claude/commands/plan-feature.md");
        assert_eq!(entry.description, "Plan a feature");

        let missing = discover_commands(dir.path(), "nope").await.unwrap();
        assert!(missing.is_empty());
    }
}
