//! Codex client.
//!
//! Runs `codex exec --json` and maps its thread events. The thread id from
//! `thread.started` is the resumable session handle; it is reported in the
//! `Result` chunk emitted on `turn.completed`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, trace};

use relay_models::{ImageAttachment, MessageChunk};

use crate::client::{AssistantClient, ChunkStream};
use crate::error::{AssistantError, Result};
use crate::kind::AssistantKind;
use crate::process::{ensure_installed, spawn_json_lines, LineParser};

/// Subprocess client for the `codex` CLI.
pub struct CodexClient {
    binary: PathBuf,
}

impl CodexClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn is_installed(&self) -> bool {
        ensure_installed(&self.binary).is_ok()
    }

    fn build_command(
        &self,
        cwd: &Path,
        resume: Option<&str>,
        images: &[ImageAttachment],
    ) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .current_dir(cwd)
            .arg("exec")
            .args(["--json", "--full-auto", "--skip-git-repo-check"]);
        for image in images {
            command.arg("--image").arg(&image.path);
        }
        if let Some(id) = resume {
            command.args(["resume", id]);
        }
        // Prompt is read from stdin.
        command.arg("-");
        command
    }
}

#[async_trait]
impl AssistantClient for CodexClient {
    fn kind(&self) -> AssistantKind {
        AssistantKind::Codex
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
            "Starting Codex query"
        );
        spawn_json_lines(
            self.build_command(cwd, resume, images),
            &self.binary,
            prompt.to_string(),
            CodexEvents::new(resume),
        )
    }
}

/// Parser for Codex JSON events. Remembers the thread id.
pub struct CodexEvents {
    thread_id: Option<String>,
}

impl CodexEvents {
    pub fn new(resume: Option<&str>) -> Self {
        Self {
            thread_id: resume.map(str::to_string),
        }
    }

    /// Map one JSON line to chunks. Non-JSON lines are ignored.
    pub fn parse(&mut self, line: &str) -> Result<Vec<MessageChunk>> {
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            trace!(line = %line, "Skipping non-JSON output");
            return Ok(Vec::new());
        };
        let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

        match event.get("type").and_then(Value::as_str) {
            Some("thread.started") => {
                if let Some(id) = text(&event, "thread_id") {
                    self.thread_id = Some(id);
                }
                Ok(Vec::new())
            }
            Some("item.completed") => Ok(event
                .get("item")
                .and_then(item_chunk)
                .into_iter()
                .collect()),
            Some("turn.completed") => Ok(vec![MessageChunk::result(self.thread_id.clone())]),
            Some("turn.failed") => {
                let message = event
                    .get("error")
                    .and_then(|e| text(e, "message"))
                    .unwrap_or_else(|| "turn failed".to_string());
                Err(AssistantError::from_message(message))
            }
            Some("error") => Err(AssistantError::from_message(
                text(&event, "message").unwrap_or_else(|| "unknown error".to_string()),
            )),
            _ => Ok(Vec::new()),
        }
    }
}

impl LineParser for CodexEvents {
    fn parse_line(&mut self, line: &str) -> Result<Vec<MessageChunk>> {
        self.parse(line)
    }
}

fn item_chunk(item: &Value) -> Option<MessageChunk> {
    let field = |key: &str| item.get(key).and_then(Value::as_str);

    match field("type")? {
        "agent_message" => field("text")
            .filter(|t| !t.trim().is_empty())
            .map(MessageChunk::assistant),
        "reasoning" => field("text").map(|t| MessageChunk::Thinking {
            content: t.to_string(),
        }),
        "command_execution" => field("command")
            .map(|c| MessageChunk::tool("Bash", Some(json!({ "command": c })))),
        "file_change" => {
            let path = item
                .get("changes")
                .and_then(Value::as_array)
                .and_then(|changes| changes.first())
                .and_then(|c| c.get("path"))
                .and_then(Value::as_str)?;
            Some(MessageChunk::tool("Edit", Some(json!({ "file_path": path }))))
        }
        "mcp_tool_call" => field("tool").map(|tool| {
            MessageChunk::tool(tool, item.get("arguments").cloned())
        }),
        "web_search" => field("query")
            .map(|q| MessageChunk::tool("WebSearch", Some(json!({ "query": q })))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_reported_on_turn_completed() {
        let mut parser = CodexEvents::new(None);
        assert!(parser
            .parse(r#"{"type":"thread.started","thread_id":"th_1"}"#)
            .unwrap()
            .is_empty());
        let chunks = parser
            .parse(r#"{"type":"turn.completed","usage":{"input_tokens":10}}"#)
            .unwrap();
        assert_eq!(chunks, vec![MessageChunk::result(Some("th_1".to_string()))]);
    }

    #[test]
    fn test_resume_id_used_without_thread_started() {
        let mut parser = CodexEvents::new(Some("th_old"));
        let chunks = parser.parse(r#"{"type":"turn.completed"}"#).unwrap();
        assert_eq!(chunks, vec![MessageChunk::result(Some("th_old".to_string()))]);
    }

    #[test]
    fn test_items() {
        let mut parser = CodexEvents::new(None);
        let msg = parser
            .parse(r#"{"type":"item.completed","item":{"id":"i0","type":"agent_message","text":"Done."}}"#)
            .unwrap();
        assert_eq!(msg, vec![MessageChunk::assistant("Done.")]);

        let cmd = parser
            .parse(r#"{"type":"item.completed","item":{"id":"i1","type":"command_execution","command":"ls -la","exit_code":0}}"#)
            .unwrap();
        assert_eq!(
            cmd,
            vec![MessageChunk::tool("Bash", Some(json!({"command": "ls -la"})))]
        );

        let edit = parser
            .parse(r#"{"type":"item.completed","item":{"id":"i2","type":"file_change","changes":[{"path":"src/a.rs","kind":"update"}]}}"#)
            .unwrap();
        assert_eq!(
            edit,
            vec![MessageChunk::tool("Edit", Some(json!({"file_path": "src/a.rs"})))]
        );

        assert!(parser
            .parse(r#"{"type":"item.started","item":{"id":"i3","type":"command_execution"}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_failures() {
        let mut parser = CodexEvents::new(None);
        assert!(matches!(
            parser.parse(r#"{"type":"turn.failed","error":{"message":"429 Too Many Requests"}}"#),
            Err(AssistantError::RateLimited(_))
        ));
        assert!(matches!(
            parser.parse(r#"{"type":"error","message":"stream disconnected"}"#),
            Err(AssistantError::Process(_))
        ));
    }

    #[test]
    fn test_command_arguments() {
        let client = CodexClient::new("codex");
        let command = client.build_command(
            Path::new("/tmp"),
            Some("th_9"),
            &[ImageAttachment::new("/tmp/p.png", "image/png")],
        );
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "exec",
                "--json",
                "--full-auto",
                "--skip-git-repo-check",
                "--image",
                "/tmp/p.png",
                "resume",
                "th_9",
                "-"
            ]
        );
    }
}
