//! Dependency research hints prepended to assistant prompts.

use regex::Regex;
use std::sync::OnceLock;

/// Supplies extra instructions derived from the user's own words.
pub trait ResearchAdvisor: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Instructions to prepend for this message, if any.
    fn instructions_for(&self, message: &str) -> Option<String>;
}

/// Never adds anything.
pub struct NoResearch;

impl ResearchAdvisor for NoResearch {
    fn is_enabled(&self) -> bool {
        false
    }

    fn instructions_for(&self, _message: &str) -> Option<String> {
        None
    }
}

/// Asks the assistant to research packages the user mentions adding.
///
/// Matches phrases like "install axum", "add serde" or "use tokio".
pub struct DependencyResearch {
    enabled: bool,
}

impl DependencyResearch {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "it", "this", "that", "these", "those", "my", "our", "your", "some", "to",
    "and", "or", "more", "new", "all", "any", "them", "for", "in", "on", "with",
];

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:install|add|use|using|integrate|upgrade to|migrate to|switch to)\s+(?:the\s+)?([a-z0-9@][a-z0-9@/._-]*[a-z0-9])",
        )
        .expect("valid dependency regex")
    })
}

/// Package names mentioned as things to add or use, in order, deduplicated.
pub fn detect_dependencies(message: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in mention_regex().captures_iter(message) {
        let name = caps[1].to_lowercase();
        if STOPWORDS.contains(&name.as_str()) || found.contains(&name) {
            continue;
        }
        found.push(name);
    }
    found
}

impl ResearchAdvisor for DependencyResearch {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn instructions_for(&self, message: &str) -> Option<String> {
        let deps = detect_dependencies(message);
        if deps.is_empty() {
            return None;
        }
        let list: Vec<String> = deps.iter().map(|d| format!("- {}", d)).collect();
        Some(format!(
            "## Dependency research\n\n\
             Before writing code, research these dependencies: check their current \
             documentation, latest stable version and recommended usage.\n\n{}",
            list.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_packages() {
        assert_eq!(
            detect_dependencies("Please install axum and use the serde crate, then add tokio"),
            vec!["axum", "serde", "tokio"]
        );
        assert_eq!(detect_dependencies("npm install @tanstack/react-query"), vec!["@tanstack/react-query"]);
    }

    #[test]
    fn test_ignores_stopwords_and_duplicates() {
        assert!(detect_dependencies("add it to the list").is_empty());
        assert_eq!(detect_dependencies("use redis, use Redis"), vec!["redis"]);
    }

    #[test]
    fn test_instructions() {
        let advisor = DependencyResearch::new(true);
        assert!(advisor.is_enabled());
        let text = advisor.instructions_for("migrate to sqlx").unwrap();
        assert!(text.contains("- sqlx"));
        assert!(advisor.instructions_for("fix the login bug").is_none());
        assert!(!NoResearch.is_enabled());
    }
}
