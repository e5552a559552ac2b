//! Output shaping for platform delivery.
//!
//! Batch-mode platforms get one cleaned message per turn instead of a live
//! stream. Some assistants narrate tool usage inline in their text, one
//! section per call, prefixed by an indicator glyph; those sections are
//! dropped from the summary.

/// Separator placed between assistant text chunks before sectioning.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Glyphs that open an inline tool-narration section.
const TOOL_INDICATORS: [&str; 7] = [
    "\u{1F527}",         // 🔧
    "\u{1F4AD}",         // 💭
    "\u{1F4DD}",         // 📝
    "\u{270F}\u{FE0F}",  // ✏️
    "\u{1F5D1}\u{FE0F}", // 🗑️
    "\u{1F4C2}",         // 📂
    "\u{1F50D}",         // 🔍
];

/// Telegram's per-message character limit, a safe default elsewhere.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// True when a section is tool narration.
pub fn is_tool_section(section: &str) -> bool {
    let trimmed = section.trim_start();
    TOOL_INDICATORS.iter().any(|g| trimmed.starts_with(g))
        || trimmed.starts_with('\u{270F}') // ✏ without variation selector
        || trimmed.starts_with('\u{1F5D1}') // 🗑 without variation selector
}

/// Build the single batch-mode message from collected assistant chunks.
///
/// Chunks are joined with [`CHUNK_SEPARATOR`], split on blank lines, and
/// tool-narration sections are removed. When nothing survives, the joined
/// text is returned unfiltered so a non-empty response never becomes empty.
pub fn clean_batch_response(chunks: &[String]) -> String {
    let joined = chunks.join(CHUNK_SEPARATOR);
    let mut kept: Vec<&str> = Vec::new();
    for section in joined.split("\n\n") {
        if section.trim().is_empty() || is_tool_section(section) {
            continue;
        }
        // Separators only between content, never doubled.
        if is_separator(section) && kept.last().map_or(true, |last| is_separator(last)) {
            continue;
        }
        kept.push(section);
    }
    while kept.last().is_some_and(|last| is_separator(last)) {
        kept.pop();
    }

    if kept.is_empty() {
        return joined.trim().to_string();
    }
    kept.join("\n\n").trim().to_string()
}

fn is_separator(section: &str) -> bool {
    section.trim() == CHUNK_SEPARATOR.trim()
}

/// Split text into pieces of at most `max_len` characters.
///
/// Prefers breaking at a newline, then at a space, inside each window.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_len {
        let window_end = rest
            .char_indices()
            .nth(max_len)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        parts.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches(['\n', ' ']);
    }
    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tool_sections_are_removed() {
        let out = clean_batch_response(&chunks(&[
            "\u{1F527} BASH\n$ ls",
            "Here is the summary of the change.",
        ]));
        assert!(!out.contains("BASH"));
        assert!(out.contains("Here is the summary of the change."));
    }

    #[test]
    fn test_sections_inside_one_chunk() {
        let out = clean_batch_response(&chunks(&[
            "Starting.\n\n\u{1F50D} Searching: foo\n\nFound it.",
        ]));
        assert_eq!(out, "Starting.\n\nFound it.");
    }

    #[test]
    fn test_all_filtered_falls_back_to_joined_text() {
        let input = chunks(&["\u{1F527} READ\nReading: a.rs", "\u{1F4AD} thinking about it"]);
        let out = clean_batch_response(&input);
        assert_eq!(out, input.join(CHUNK_SEPARATOR));
        assert!(!out.is_empty());
    }

    #[test]
    fn test_variation_selector_glyphs() {
        assert!(is_tool_section("\u{270F}\u{FE0F} Editing: a.rs"));
        assert!(is_tool_section("  \u{1F5D1} removed"));
        assert!(!is_tool_section("Plain text"));
    }

    #[test]
    fn test_separator_kept_between_content_only() {
        let out = clean_batch_response(&chunks(&[
            "First part.",
            "\u{1F4DD} Writing: notes.md",
            "Second part.",
        ]));
        assert_eq!(out, "First part.\n\n---\n\nSecond part.");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_batch_response(&[]), "");
    }

    #[test]
    fn test_split_message_short() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn test_split_message_prefers_newlines() {
        let parts = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(parts, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_message_hard_cut() {
        let text = "x".repeat(25);
        let parts = split_message(&text, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_split_message_multibyte() {
        let text = "\u{00E9}".repeat(15);
        let parts = split_message(&text, 10);
        assert_eq!(parts[0].chars().count(), 10);
        assert_eq!(parts[1].chars().count(), 5);
    }
}
