//! Slash-command parsing.

/// A `/command arg1 arg2` message split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Positional argument by zero-based index.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// True when the message is a slash command.
pub fn is_command(message: &str) -> bool {
    message.trim_start().starts_with('/')
}

/// Parse a slash command.
///
/// Strips one leading `/` and splits on runs of whitespace. The first token
/// is the command, kept case-sensitive; the rest are positional arguments.
/// Quotes have no meaning: `"a b"` is two arguments.
pub fn parse_command(message: &str) -> ParsedCommand {
    let trimmed = message.trim();
    let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let mut tokens = body.split_whitespace().map(str::to_string);
    let command = tokens.next().unwrap_or_default();
    ParsedCommand {
        command,
        args: tokens.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_args() {
        let parsed = parse_command("/command-invoke plan-feature  add-dark-mode\tnow");
        assert_eq!(parsed.command, "command-invoke");
        assert_eq!(parsed.args, vec!["plan-feature", "add-dark-mode", "now"]);
        assert_eq!(parsed.arg(1), Some("add-dark-mode"));
        assert_eq!(parsed.arg(5), None);
    }

    #[test]
    fn test_parse_command_without_args() {
        let parsed = parse_command("/help");
        assert_eq!(parsed.command, "help");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(parse_command("/Status").command, "Status");
    }

    #[test]
    fn test_quotes_are_not_grouping() {
        let parsed = parse_command("/setcwd \"my dir\"");
        assert_eq!(parsed.args, vec!["\"my", "dir\""]);
    }

    #[test]
    fn test_is_command() {
        assert!(is_command("/help"));
        assert!(is_command("  /help"));
        assert!(!is_command("hello /help"));
        assert!(!is_command(""));
    }
}
