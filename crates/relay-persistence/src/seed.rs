//! Load global command templates from a directory of markdown files.

use std::path::Path;
use tracing::{debug, info, warn};

use relay_models::CommandTemplate;

use crate::error::{PersistenceError, Result};
use crate::store::TemplateStore;

/// Upsert every `*.md` file in `dir` as a template named after its stem.
///
/// A missing directory is not an error; nothing is seeded. Returns the
/// number of templates written.
pub async fn seed_templates(store: &dyn TemplateStore, dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "No template directory, skipping seed");
        return Ok(0);
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| PersistenceError::ReadError {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut seeded = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| PersistenceError::ReadError {
            path: dir.to_path_buf(),
            source,
        })?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "Skipping template with non-UTF-8 name");
            continue;
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PersistenceError::ReadError {
                path: path.clone(),
                source,
            })?;
        let description = describe(&content);
        store
            .upsert_template(CommandTemplate::new(name, description, content))
            .await?;
        seeded += 1;
    }

    info!(dir = %dir.display(), count = seeded, "Seeded command templates");
    Ok(seeded)
}

/// First heading, else first non-blank line.
fn describe(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_describe() {
        assert_eq!(describe("\n# Plan a feature\n\nbody"), "Plan a feature");
        assert_eq!(describe("do the thing\nmore"), "do the thing");
        assert_eq!(describe(""), "");
    }

    #[tokio::test]
    async fn test_seed_templates_from_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("router.md"), "# Route requests\n$ARGUMENTS").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = MemoryStore::new();
        let count = seed_templates(&store, dir.path()).await.unwrap();
        assert_eq!(count, 1);

        let router = store.get_template("router").await.unwrap().unwrap();
        assert_eq!(router.description, "Route requests");
        assert!(router.content.contains("$ARGUMENTS"));
    }

    #[tokio::test]
    async fn test_seed_missing_dir_is_noop() {
        let store = MemoryStore::new();
        let count = seed_templates(&store, Path::new("/nonexistent/relay/templates"))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
