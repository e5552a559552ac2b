//! Build a production orchestrator from runtime settings.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use relay_assistants::{AssistantBinaries, AssistantKind, AssistantRegistry};
use relay_core::{templates_dir, RelaySettings};
use relay_persistence::{seed_templates, SqliteStore, Stores};

use crate::commands::BuiltinCommands;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::research::DependencyResearch;
use crate::tool_config::McpConfigFile;

impl Orchestrator {
    /// Open the SQLite store, seed templates and wire the subprocess
    /// assistants, the built-in commands and the research advisor.
    pub async fn from_settings(settings: &RelaySettings) -> Result<Self> {
        let store = SqliteStore::open(&settings.db_path)?;
        let stores = Stores::from_backend(Arc::new(store));
        info!(db = %settings.db_path.display(), "Opened database");

        let seeded = seed_templates(stores.templates.as_ref(), &templates_dir()).await?;
        if seeded > 0 {
            info!(count = seeded, "Seeded command templates");
        }

        let default_assistant: AssistantKind = settings.default_assistant.parse()?;
        let registry = AssistantRegistry::new(AssistantBinaries {
            claude: PathBuf::from(&settings.claude_bin),
            codex: PathBuf::from(&settings.codex_bin),
        });
        let available = registry.available();
        if !available.contains(&default_assistant) {
            warn!(
                assistant = %default_assistant,
                available = ?available,
                "Default assistant binary not found on PATH"
            );
        }

        let tool_config = Arc::new(McpConfigFile::new(settings.mcp_config_path.clone()));
        let commands = Arc::new(BuiltinCommands::new(
            stores.clone(),
            tool_config.clone(),
            settings.workspace_root.clone(),
        ));

        Ok(Orchestrator::new(
            stores,
            Arc::new(registry),
            commands,
            OrchestratorConfig {
                fallback_cwd: settings.workspace_root.clone(),
                default_assistant,
            },
        )
        .with_tool_config(tool_config)
        .with_research(Arc::new(DependencyResearch::new(settings.kb_auto_research))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_from_settings_opens_database() {
        let dir = TempDir::new().unwrap();
        let settings = RelaySettings {
            db_path: dir.path().join("db").join("relay.db"),
            workspace_root: dir.path().to_path_buf(),
            ..RelaySettings::default()
        };

        assert!(Orchestrator::from_settings(&settings).await.is_ok());
        assert!(settings.db_path.exists());
    }

    #[tokio::test]
    async fn test_from_settings_rejects_unknown_assistant() {
        let dir = TempDir::new().unwrap();
        let settings = RelaySettings {
            db_path: dir.path().join("relay.db"),
            default_assistant: "gemini".to_string(),
            ..RelaySettings::default()
        };

        assert!(Orchestrator::from_settings(&settings).await.is_err());
    }
}
