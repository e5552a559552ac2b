//! Placeholder substitution for command templates.
//!
//! Supported placeholders:
//!
//! - `$1`..`$N`: positional arguments, 1-indexed. Missing ones become `""`.
//! - `$ARGUMENTS`: all arguments joined by single spaces.
//! - `$NAME` (upper-case): looked up in a caller-supplied map; left as is
//!   when absent, so shell variables in command bodies survive.
//!
//! `$0` is not a placeholder. Substitution is a single left-to-right pass:
//! text inserted for one placeholder is never expanded again.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

const ARGUMENTS: &str = "ARGUMENTS";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\d+|[A-Z][A-Z0-9_]*)").expect("valid placeholder regex"))
}

/// Substitute positional placeholders and `$ARGUMENTS`.
pub fn substitute_variables(template: &str, args: &[String]) -> String {
    substitute_variables_with(template, args, &HashMap::new())
}

/// Substitute positional placeholders, `$ARGUMENTS` and named values.
///
/// The orchestrator supplies `named` from the active session's string
/// metadata, so `$LAST_COMMAND` or `$PLAN` resolve when the session has them.
pub fn substitute_variables_with(
    template: &str,
    args: &[String],
    named: &HashMap<String, String>,
) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| {
            let token = &caps[1];
            let literal = caps[0].to_string();

            if let Ok(index) = token.parse::<usize>() {
                if index == 0 {
                    return literal;
                }
                return args.get(index - 1).cloned().unwrap_or_default();
            }
            if token == ARGUMENTS {
                return args.join(" ");
            }
            named.get(token).cloned().unwrap_or(literal)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_and_arguments() {
        let out = substitute_variables(
            "Plan $1 for $2. Full: $ARGUMENTS",
            &args(&["dark-mode", "web", "now"]),
        );
        assert_eq!(out, "Plan dark-mode for web. Full: dark-mode web now");
    }

    #[test]
    fn test_missing_index_is_empty() {
        assert_eq!(substitute_variables("[$1][$5]", &args(&["a"])), "[a][]");
    }

    #[test]
    fn test_template_without_placeholders_is_unchanged() {
        let template = "Run the test suite and report failures.\nCost: 5$ per run.";
        assert_eq!(substitute_variables(template, &[]), template);
    }

    #[test]
    fn test_zero_and_unknown_names_stay_literal() {
        let out = substitute_variables("echo $0 $HOME $lower", &args(&["x"]));
        assert_eq!(out, "echo $0 $HOME $lower");
    }

    #[test]
    fn test_named_values() {
        let mut named = HashMap::new();
        named.insert("PLAN".to_string(), "plan.md".to_string());
        let out = substitute_variables_with("Execute $PLAN with $1", &args(&["fast"]), &named);
        assert_eq!(out, "Execute plan.md with fast");
    }

    #[test]
    fn test_single_pass() {
        let out = substitute_variables("$1 then $2", &args(&["$2", "b"]));
        assert_eq!(out, "$2 then b");
    }

    #[test]
    fn test_multi_digit_index() {
        let many: Vec<String> = (1..=12).map(|i| format!("a{}", i)).collect();
        assert_eq!(substitute_variables("$12/$1", &many), "a12/a1");
    }
}
