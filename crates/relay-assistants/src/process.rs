//! Run an assistant CLI and turn its JSON-lines output into chunks.

use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use relay_models::MessageChunk;

use crate::client::ChunkStream;
use crate::error::{AssistantError, Result};

/// Longest stderr excerpt carried into an error.
const MAX_STDERR_CHARS: usize = 500;

/// Converts one line of assistant output into chunks.
pub(crate) trait LineParser: Send + 'static {
    /// Parse one stdout line. Unknown events yield no chunks.
    fn parse_line(&mut self, line: &str) -> Result<Vec<MessageChunk>>;

    /// Chunks to emit once output ends.
    fn finish(&mut self) -> Vec<MessageChunk> {
        Vec::new()
    }
}

/// Fail early with a clear error when the binary is missing.
pub(crate) fn ensure_installed(binary: &Path) -> Result<()> {
    which::which(binary)
        .map(|_| ())
        .map_err(|_| AssistantError::NotInstalled {
            binary: binary.display().to_string(),
        })
}

/// Spawn `command`, write `prompt` to its stdin and stream parsed stdout.
///
/// The child is killed when the returned stream is dropped.
pub(crate) fn spawn_json_lines<P: LineParser>(
    mut command: Command,
    binary: &Path,
    prompt: String,
    parser: P,
) -> Result<ChunkStream> {
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| AssistantError::Spawn {
        binary: binary.display().to_string(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AssistantError::Process("stdout unavailable".to_string()))?;
    let stdin = child.stdin.take();
    let stderr = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf).await;
            buf
        })
    });

    if let Some(mut stdin) = stdin {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                warn!(error = %e, "Failed to write prompt to assistant");
            }
            // Dropping stdin closes the pipe so the assistant starts.
        });
    }

    let state = RunState {
        lines: BufReader::new(stdout).lines(),
        child,
        stderr,
        pending: VecDeque::new(),
        parser,
        done: false,
    };

    Ok(stream::unfold(state, next_chunk).boxed())
}

struct RunState<P> {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    pending: VecDeque<MessageChunk>,
    parser: P,
    done: bool,
}

async fn next_chunk<P: LineParser>(
    mut state: RunState<P>,
) -> Option<(Result<MessageChunk>, RunState<P>)> {
    loop {
        if let Some(chunk) = state.pending.pop_front() {
            return Some((Ok(chunk), state));
        }
        if state.done {
            return None;
        }

        match state.lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match state.parser.parse_line(&line) {
                    Ok(chunks) => state.pending.extend(chunks),
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }
            Ok(None) => {
                state.done = true;
                if let Err(e) = wait_for_exit(&mut state).await {
                    return Some((Err(e), state));
                }
                let trailing = state.parser.finish();
                state.pending.extend(trailing);
            }
            Err(e) => {
                state.done = true;
                return Some((Err(AssistantError::Io(e)), state));
            }
        }
    }
}

async fn wait_for_exit<P>(state: &mut RunState<P>) -> Result<()> {
    let status = state.child.wait().await?;
    let stderr = match state.stderr.take() {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    if status.success() {
        debug!(status = %status, "Assistant process exited");
        return Ok(());
    }

    let excerpt: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
    warn!(status = %status, stderr = %excerpt, "Assistant process failed");
    let message = if excerpt.is_empty() {
        format!("process exited with {}", status)
    } else {
        excerpt
    };
    Err(AssistantError::from_message(message))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct EchoParser;

    impl LineParser for EchoParser {
        fn parse_line(&mut self, line: &str) -> Result<Vec<MessageChunk>> {
            Ok(vec![MessageChunk::assistant(line)])
        }

        fn finish(&mut self) -> Vec<MessageChunk> {
            vec![MessageChunk::result(Some("done".to_string()))]
        }
    }

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_streams_lines_then_finish() {
        let stream = spawn_json_lines(
            sh("cat; echo; echo second"),
            Path::new("sh"),
            "first\n".to_string(),
            EchoParser,
        )
        .unwrap();

        let chunks: Vec<MessageChunk> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(
            chunks,
            vec![
                MessageChunk::assistant("first"),
                MessageChunk::assistant("second"),
                MessageChunk::result(Some("done".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let stream = spawn_json_lines(
            sh("echo 'rate limit reached' >&2; exit 3"),
            Path::new("sh"),
            String::new(),
            EchoParser,
        )
        .unwrap();

        let results: Vec<Result<MessageChunk>> = stream.collect().await;
        let last = results.last().unwrap();
        assert!(matches!(last, Err(AssistantError::RateLimited(_))));
    }

    #[test]
    fn test_missing_binary() {
        let err = ensure_installed(Path::new("relay-definitely-not-installed")).unwrap_err();
        assert!(matches!(err, AssistantError::NotInstalled { .. }));
    }
}
