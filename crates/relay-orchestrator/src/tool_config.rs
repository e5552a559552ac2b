//! Fingerprint of the assistant's external tool configuration.
//!
//! Sessions record the hash they were opened with. Resuming a session
//! whose hash no longer matches is refused.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::warn;

/// Source of the current tool-configuration fingerprint.
pub trait ToolConfigSource: Send + Sync {
    fn config_hash(&self) -> String;
}

/// Hashes an MCP server configuration file with SHA-256.
///
/// A missing path or unreadable file hashes as empty content.
#[derive(Debug, Clone, Default)]
pub struct McpConfigFile {
    path: Option<PathBuf>,
}

impl McpConfigFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl ToolConfigSource for McpConfigFile {
    fn config_hash(&self) -> String {
        let content = match &self.path {
            Some(path) => std::fs::read(path).unwrap_or_else(|e| {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to read MCP config");
                }
                Vec::new()
            }),
            None => Vec::new(),
        };
        sha256_hex(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_tracks_file_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mcp.json");
        let source = McpConfigFile::new(Some(path.clone()));

        let empty = source.config_hash();
        assert_eq!(empty, McpConfigFile::default().config_hash());
        assert_eq!(empty.len(), 64);

        std::fs::write(&path, r#"{"mcpServers":{"a":{}}}"#).unwrap();
        let first = source.config_hash();
        assert_ne!(first, empty);
        assert_eq!(first, source.config_hash());

        std::fs::write(&path, r#"{"mcpServers":{"b":{}}}"#).unwrap();
        assert_ne!(source.config_hash(), first);
    }
}
