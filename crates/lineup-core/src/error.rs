use std::fmt;

use crate::model::item::State;
use crate::sequencer::guard::DeadlockReport;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfig,
    PlanParseError,
    ItemNotFound,
    InvalidStateTransition,
    CycleDetected,
    UnknownReference,
    DuplicateItem,
    NotReady,
    SnapshotMismatch,
    Deadlock,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::InvalidConfig => "E1003",
            Self::PlanParseError => "E1004",
            Self::ItemNotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::CycleDetected => "E2003",
            Self::UnknownReference => "E2004",
            Self::DuplicateItem => "E2005",
            Self::NotReady => "E2006",
            Self::SnapshotMismatch => "E3001",
            Self::Deadlock => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfig => "Invalid configuration value",
            Self::PlanParseError => "Plan file parse error",
            Self::ItemNotFound => "Item not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::CycleDetected => "Dependency cycle detected",
            Self::UnknownReference => "Edge references unknown item",
            Self::DuplicateItem => "Duplicate item id",
            Self::NotReady => "Item is not ready to start",
            Self::SnapshotMismatch => "Snapshot does not match plan",
            Self::Deadlock => "Remaining items can never start",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .lineup/config.toml and retry."),
            Self::InvalidConfig => {
                Some("max_attempts and jobs must be whole numbers of at least 1; run.shell must be set.")
            }
            Self::PlanParseError => {
                Some("Plan files are .json, .yaml/.yml or .toml with an `items` list.")
            }
            Self::ItemNotFound => None,
            Self::InvalidStateTransition => Some(
                "Follow valid transitions: pending -> in_progress -> done|blocked, blocked -> in_progress|failed.",
            ),
            Self::CycleDetected => Some("Remove a blocked_by link so the plan stays acyclic."),
            Self::UnknownReference => Some("Add the missing item or drop the blocked_by entry."),
            Self::DuplicateItem => Some("Give every item a unique id."),
            Self::NotReady => Some("Start only items listed by `lu ready`."),
            Self::SnapshotMismatch => {
                Some("Delete the state file or reconcile it against the current plan.")
            }
            Self::Deadlock => Some("Fix the failed blockers, then rerun with `lu run --retry-failed`."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the graph store, lifecycle transitions and the guard.
///
/// Structural errors (`Cycle`, `UnknownReference`, `DuplicateItem`) are fatal at
/// load time. `NotReady`, `UnknownItem` and `InvalidTransition` are caller errors.
/// `Deadlock` ends a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("dependency cycle detected: {}", format_cycles(.cycles))]
    Cycle { cycles: Vec<Vec<String>> },

    #[error("edge {blocker} -> {blocked} references unknown item '{missing}'")]
    UnknownReference {
        blocker: String,
        blocked: String,
        missing: String,
    },

    #[error("duplicate item id '{0}'")]
    DuplicateItem(String),

    #[error("unknown item '{0}'")]
    UnknownItem(String),

    #[error("item '{id}' is not ready: {reason}")]
    NotReady { id: String, reason: String },

    #[error("item '{id}' cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: State, to: State },

    #[error("{0}")]
    Deadlock(DeadlockReport),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("snapshot does not match plan: {0}")]
    SnapshotMismatch(String),
}

impl SequenceError {
    /// Stable machine code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Cycle { .. } => ErrorCode::CycleDetected,
            Self::UnknownReference { .. } => ErrorCode::UnknownReference,
            Self::DuplicateItem(_) => ErrorCode::DuplicateItem,
            Self::UnknownItem(_) => ErrorCode::ItemNotFound,
            Self::NotReady { .. } => ErrorCode::NotReady,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::Deadlock(_) => ErrorCode::Deadlock,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::SnapshotMismatch(_) => ErrorCode::SnapshotMismatch,
        }
    }
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|members| format!("[{}]", members.join(", ")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, SequenceError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidConfig,
            ErrorCode::PlanParseError,
            ErrorCode::ItemNotFound,
            ErrorCode::InvalidStateTransition,
            ErrorCode::CycleDetected,
            ErrorCode::UnknownReference,
            ErrorCode::DuplicateItem,
            ErrorCode::NotReady,
            ErrorCode::SnapshotMismatch,
            ErrorCode::Deadlock,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::CycleDetected.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn cycle_message_lists_every_component() {
        let err = SequenceError::Cycle {
            cycles: vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
            ],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: [a, b] [c]");
        assert_eq!(err.code(), ErrorCode::CycleDetected);
    }

    #[test]
    fn not_ready_maps_to_its_code() {
        let err = SequenceError::NotReady {
            id: "b".to_string(),
            reason: "blocked by a".to_string(),
        };
        assert_eq!(err.code().code(), "E2006");
    }
}
