//! Streamed assistant output and inbound attachments.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One element of an assistant response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageChunk {
    /// Narrated assistant text.
    Assistant { content: String },
    /// The assistant invoked a tool.
    Tool {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    /// End of a turn, usually carrying the remote session handle.
    Result {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// Informational event from the assistant runtime.
    System { content: String },
    /// Model reasoning text.
    Thinking { content: String },
}

impl MessageChunk {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    pub fn tool(name: impl Into<String>, input: Option<Value>) -> Self {
        Self::Tool {
            name: name.into(),
            input,
        }
    }

    pub fn result(session_id: Option<String>) -> Self {
        Self::Result { session_id }
    }
}

/// An image sent along with a message, already saved to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub mime_type: String,
}

impl ImageAttachment {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_tagging() {
        let chunk = MessageChunk::result(Some("abc".to_string()));
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["session_id"], "abc");

        let parsed: MessageChunk =
            serde_json::from_str(r#"{"type":"tool","name":"Bash"}"#).unwrap();
        assert_eq!(parsed, MessageChunk::tool("Bash", None));
    }
}
