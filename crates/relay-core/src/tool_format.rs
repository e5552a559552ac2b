//! Human-readable notices for assistant tool calls.

use serde_json::Value;

/// Longest detail shown for a tool input before truncation.
const MAX_DETAIL_CHARS: usize = 100;

/// Glyph prefixed to every tool notice.
pub const TOOL_GLYPH: &str = "\u{1F527}"; // 🔧

/// Format a tool call as a short notice, e.g. `🔧 BASH\n$ cargo test`.
pub fn format_tool_call(name: &str, input: Option<&Value>) -> String {
    let header = format!("{} {}", TOOL_GLYPH, name.to_uppercase());
    match input.and_then(|i| describe_input(name, i)) {
        Some(detail) => format!("{}\n{}", header, detail),
        None => header,
    }
}

fn describe_input(name: &str, input: &Value) -> Option<String> {
    let field = |key: &str| input.get(key).and_then(Value::as_str);

    let detail = match name {
        "Bash" => field("command").map(|c| format!("$ {}", c)),
        "Read" => field("file_path").map(|p| format!("Reading: {}", p)),
        "Write" => field("file_path").map(|p| format!("Writing: {}", p)),
        "Edit" | "MultiEdit" => field("file_path").map(|p| format!("Editing: {}", p)),
        "Glob" => field("pattern").map(|p| format!("Pattern: {}", p)),
        "Grep" => field("pattern").map(|p| format!("Searching: {}", p)),
        _ => None,
    };

    detail.or_else(|| {
        if input.is_null() || input.as_object().is_some_and(|o| o.is_empty()) {
            None
        } else {
            Some(input.to_string())
        }
    })
    .map(|d| truncate(&d, MAX_DETAIL_CHARS))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_tools() {
        assert_eq!(
            format_tool_call("Bash", Some(&json!({"command": "cargo test"}))),
            "\u{1F527} BASH\n$ cargo test"
        );
        assert_eq!(
            format_tool_call("Read", Some(&json!({"file_path": "src/lib.rs"}))),
            "\u{1F527} READ\nReading: src/lib.rs"
        );
        assert_eq!(
            format_tool_call("Grep", Some(&json!({"pattern": "TODO"}))),
            "\u{1F527} GREP\nSearching: TODO"
        );
    }

    #[test]
    fn test_unknown_tool_shows_truncated_json() {
        let long = "x".repeat(300);
        let notice = format_tool_call("WebFetch", Some(&json!({ "url": long })));
        let detail = notice.lines().nth(1).unwrap();
        assert!(detail.starts_with("{\"url\":"));
        assert!(detail.ends_with("..."));
        assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS + 3);
    }

    #[test]
    fn test_no_input() {
        assert_eq!(format_tool_call("TodoWrite", None), "\u{1F527} TODOWRITE");
        assert_eq!(
            format_tool_call("TodoWrite", Some(&json!({}))),
            "\u{1F527} TODOWRITE"
        );
    }
}
