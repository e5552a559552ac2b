//! The terminal as a Relay platform.

use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;

use relay_models::{PlatformType, StreamingMode};
use relay_orchestrator::{OrchestratorError, Platform};

/// Writes every orchestrator message to a terminal stream.
pub struct CliPlatform {
    mode: StreamingMode,
    out: Mutex<Box<dyn Write + Send>>,
}

impl CliPlatform {
    /// Print to stdout.
    pub fn new(mode: StreamingMode) -> Self {
        Self::with_writer(mode, Box::new(std::io::stdout()))
    }

    pub fn with_writer(mode: StreamingMode, out: Box<dyn Write + Send>) -> Self {
        Self {
            mode,
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl Platform for CliPlatform {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Cli
    }

    fn streaming_mode(&self) -> StreamingMode {
        self.mode
    }

    async fn send_message(
        &self,
        _conversation_id: &str,
        text: &str,
    ) -> relay_orchestrator::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| OrchestratorError::Platform("output lock poisoned".to_string()))?;
        writeln!(out, "{}\n", text.trim_end())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_messages_are_separated_by_blank_lines() {
        let buffer = SharedBuffer::default();
        let platform = CliPlatform::with_writer(StreamingMode::Batch, Box::new(buffer.clone()));

        platform.send_message("local", "first\n").await.unwrap();
        platform.send_message("local", "second").await.unwrap();

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "first\n\nsecond\n\n");
        assert_eq!(platform.platform_type(), PlatformType::Cli);
        assert_eq!(platform.streaming_mode(), StreamingMode::Batch);
        assert!(!platform.is_general_context("local"));
    }
}
