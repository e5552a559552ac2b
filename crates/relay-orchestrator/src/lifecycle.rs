//! Session lifecycle decisions.
//!
//! Given the active session (if any), the command resolved for this turn
//! and the current tool-configuration hash, decide whether to create,
//! resume or replace the session. Pure; the orchestrator applies it.

use relay_models::Session;

/// Planning command and the execute command that must start fresh after it.
pub const WORKFLOW_TRANSITIONS: [(&str, &str); 2] = [
    ("plan-feature", "execute"),
    ("plan-feature-github", "execute-github"),
];

/// Why an active session is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceReason {
    /// Planning finished; execution starts with a clean context.
    WorkflowTransition { from: String, to: String },
    /// The tool configuration changed since the session opened.
    ConfigDrift { stored: String, current: String },
}

/// What to do with the conversation's session this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDecision {
    /// No active session: open one.
    Create,
    /// Keep the active session.
    Resume,
    /// Deactivate the active session and open a new one.
    Replace(ReplaceReason),
}

/// True when `current` is the execute step paired with `previous`.
pub fn is_workflow_transition(previous: Option<&str>, current: Option<&str>) -> bool {
    match (previous, current) {
        (Some(prev), Some(cur)) => WORKFLOW_TRANSITIONS
            .iter()
            .any(|(plan, execute)| *plan == prev && *execute == cur),
        _ => false,
    }
}

/// Decide the session action for a turn.
///
/// A session without a stored hash predates stamping and is resumed.
pub fn decide_session(
    active: Option<&Session>,
    command_name: Option<&str>,
    current_hash: &str,
) -> SessionDecision {
    let Some(session) = active else {
        return SessionDecision::Create;
    };

    let previous = session.last_command();
    if is_workflow_transition(previous, command_name) {
        return SessionDecision::Replace(ReplaceReason::WorkflowTransition {
            from: previous.unwrap_or_default().to_string(),
            to: command_name.unwrap_or_default().to_string(),
        });
    }

    match session.config_hash() {
        Some(stored) if stored != current_hash => {
            SessionDecision::Replace(ReplaceReason::ConfigDrift {
                stored: stored.to_string(),
                current: current_hash.to_string(),
            })
        }
        _ => SessionDecision::Resume,
    }
}
