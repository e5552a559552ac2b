//! Claude Code client.
//!
//! Runs `claude -p` with `--output-format stream-json` and maps its events:
//! assistant text and thinking blocks, `tool_use` blocks, and the final
//! `result` event carrying the session id used for `--resume`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, trace};

use relay_models::{ImageAttachment, MessageChunk};

use crate::client::{AssistantClient, ChunkStream};
use crate::error::{AssistantError, Result};
use crate::kind::AssistantKind;
use crate::process::{ensure_installed, spawn_json_lines, LineParser};

/// Subprocess client for the `claude` CLI.
pub struct ClaudeClient {
    binary: PathBuf,
}

impl ClaudeClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn is_installed(&self) -> bool {
        ensure_installed(&self.binary).is_ok()
    }

    fn build_command(&self, cwd: &Path, resume: Option<&str>) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .current_dir(cwd)
            .arg("-p")
            .args(["--output-format", "stream-json", "--verbose"])
            .arg("--dangerously-skip-permissions");
        if let Some(id) = resume {
            command.args(["--resume", id]);
        }
        command
    }
}

/// Claude reads images from disk, so attachments are listed in the prompt.
fn prompt_with_images(prompt: &str, images: &[ImageAttachment]) -> String {
    if images.is_empty() {
        return prompt.to_string();
    }
    let mut out = String::from(prompt);
    out.push_str("\n\nAttached images:");
    for image in images {
        out.push_str(&format!("\n- {} ({})", image.path.display(), image.mime_type));
    }
    out
}

#[async_trait]
impl AssistantClient for ClaudeClient {
    fn kind(&self) -> AssistantKind {
        AssistantKind::Claude
    }

    async fn send_query(
        &self,
        prompt: &str,
        cwd: &Path,
        resume: Option<&str>,
        images: &[ImageAttachment],
    ) -> Result<ChunkStream> {
        ensure_installed(&self.binary)?;
        debug!(
            cwd = %cwd.display(),
            resume = resume.unwrap_or("-"),
            images = images.len(),
            "Starting Claude query"
        );
        spawn_json_lines(
            self.build_command(cwd, resume),
            &self.binary,
            prompt_with_images(prompt, images),
            ClaudeEvents,
        )
    }
}

/// Stateless parser for Claude's stream-json events.
pub(crate) struct ClaudeEvents;

impl LineParser for ClaudeEvents {
    fn parse_line(&mut self, line: &str) -> Result<Vec<MessageChunk>> {
        parse_claude_line(line)
    }
}

/// Map one stream-json line to chunks. Non-JSON lines are ignored.
pub fn parse_claude_line(line: &str) -> Result<Vec<MessageChunk>> {
    let Ok(event) = serde_json::from_str::<Value>(line) else {
        trace!(line = %line, "Skipping non-JSON output");
        return Ok(Vec::new());
    };

    match event.get("type").and_then(Value::as_str) {
        Some("assistant") => Ok(content_blocks(&event)),
        Some("result") => {
            let is_error = event
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_error {
                let message = event
                    .get("result")
                    .and_then(Value::as_str)
                    .or_else(|| event.get("subtype").and_then(Value::as_str))
                    .unwrap_or("unknown error");
                return Err(AssistantError::from_message(message));
            }
            let session_id = event
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(vec![MessageChunk::result(session_id)])
        }
        _ => Ok(Vec::new()),
    }
}

fn content_blocks(event: &Value) -> Vec<MessageChunk> {
    let Some(blocks) = event
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    blocks
        .iter()
        .filter_map(|block| match block.get("type").and_then(Value::as_str) {
            Some("text") => block
                .get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .map(MessageChunk::assistant),
            Some("tool_use") => block.get("name").and_then(Value::as_str).map(|name| {
                MessageChunk::tool(name, block.get("input").cloned())
            }),
            Some("thinking") => block
                .get("thinking")
                .and_then(Value::as_str)
                .map(|t| MessageChunk::Thinking {
                    content: t.to_string(),
                }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_blocks() {
        let line = json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Looking at the code."},
                {"type": "tool_use", "name": "Read", "input": {"file_path": "src/main.rs"}}
            ]}
        })
        .to_string();

        let chunks = parse_claude_line(&line).unwrap();
        assert_eq!(
            chunks,
            vec![
                MessageChunk::Thinking {
                    content: "hmm".to_string()
                },
                MessageChunk::assistant("Looking at the code."),
                MessageChunk::tool("Read", Some(json!({"file_path": "src/main.rs"}))),
            ]
        );
    }

    #[test]
    fn test_result_carries_session_id() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"session_id":"abc-123","result":"done"}"#;
        assert_eq!(
            parse_claude_line(line).unwrap(),
            vec![MessageChunk::result(Some("abc-123".to_string()))]
        );
    }

    #[test]
    fn test_error_result() {
        let line = r#"{"type":"result","subtype":"error_during_execution","is_error":true,"result":"Invalid API key"}"#;
        assert!(matches!(
            parse_claude_line(line),
            Err(AssistantError::Authentication(_))
        ));
    }

    #[test]
    fn test_ignored_lines() {
        assert!(parse_claude_line("not json").unwrap().is_empty());
        assert!(parse_claude_line(r#"{"type":"system","subtype":"init","session_id":"x"}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_prompt_with_images() {
        let prompt = prompt_with_images(
            "What is this?",
            &[ImageAttachment::new("/tmp/a.jpg", "image/jpeg")],
        );
        assert_eq!(prompt, "What is this?\n\nAttached images:\n- /tmp/a.jpg (image/jpeg)");
    }
}
