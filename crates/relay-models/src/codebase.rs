//! Codebases and command templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::CodebaseId;

/// A command file registered on a codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Path relative to the conversation's working directory.
    pub path: String,
    #[serde(default)]
    pub description: String,
}

impl CommandEntry {
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
        }
    }
}

/// A registered project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebase {
    pub id: CodebaseId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    pub default_cwd: String,
    pub ai_assistant_type: String,
    /// Command name to command file.
    #[serde(default)]
    pub commands: BTreeMap<String, CommandEntry>,
    pub created_at: DateTime<Utc>,
}

impl Codebase {
    /// Look up a registered command by name.
    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }
}

/// Parameters for registering a codebase.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCodebase {
    pub name: String,
    pub repository_url: Option<String>,
    pub default_cwd: String,
    pub ai_assistant_type: String,
    pub commands: BTreeMap<String, CommandEntry>,
}

impl NewCodebase {
    pub fn new(
        name: impl Into<String>,
        default_cwd: impl Into<String>,
        ai_assistant_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            repository_url: None,
            default_cwd: default_cwd.into(),
            ai_assistant_type: ai_assistant_type.into(),
            commands: BTreeMap::new(),
        }
    }

    pub fn with_repository(mut self, url: impl Into<String>) -> Self {
        self.repository_url = Some(url.into());
        self
    }

    pub fn with_command(mut self, name: impl Into<String>, entry: CommandEntry) -> Self {
        self.commands.insert(name.into(), entry);
        self
    }

    pub fn into_codebase(self) -> Codebase {
        Codebase {
            id: CodebaseId::new(),
            name: self.name,
            repository_url: self.repository_url,
            default_cwd: self.default_cwd,
            ai_assistant_type: self.ai_assistant_type,
            commands: self.commands,
            created_at: Utc::now(),
        }
    }
}

/// A global, codebase-independent command body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Raw template text with `$1..$N` / `$ARGUMENTS` placeholders.
    pub content: String,
}

impl CommandTemplate {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            content: content.into(),
        }
    }
}
