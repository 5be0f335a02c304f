use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::SequenceError;

/// The five lifecycle states of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Pending,
    InProgress,
    Done,
    Blocked,
    Failed,
}

impl State {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }

    /// `Done` and `Failed` never change once reached.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `pending -> in_progress`
    /// - `in_progress -> done`
    /// - `in_progress -> blocked`
    /// - `blocked -> in_progress` (retry)
    /// - `blocked -> failed` (retries exhausted)
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Blocked)
                | (Self::Blocked, Self::InProgress)
                | (Self::Blocked, Self::Failed)
        )
    }
}

/// One schedulable unit of work and its lifecycle bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub state: State,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WorkItem {
    /// Create a fresh `Pending` item with no attempts.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: State::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    /// Move to `target`, enforcing the lifecycle table.
    ///
    /// `last_error` only survives in `Blocked` and `Failed`; entering any other
    /// state clears it.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidTransition`] if the table forbids the move.
    pub fn transition(&mut self, target: State) -> Result<(), SequenceError> {
        if !self.state.can_transition_to(target) {
            return Err(SequenceError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        if !matches!(target, State::Blocked | State::Failed) {
            self.last_error = None;
        }
        Ok(())
    }

    /// Returns `true` if `last_error` is consistent with `state`.
    #[must_use]
    pub const fn error_matches_state(&self) -> bool {
        self.last_error.is_none() || matches!(self.state, State::Blocked | State::Failed)
    }
}

/// A directed dependency: `blocker` must reach `Done` before `blocked` starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockingEdge {
    pub blocker: String,
    pub blocked: String,
}

impl BlockingEdge {
    pub fn new(blocker: impl Into<String>, blocked: impl Into<String>) -> Self {
        Self {
            blocker: blocker.into(),
            blocked: blocked.into(),
        }
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for BlockingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.blocker, self.blocked)
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}

impl FromStr for State {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseEnumError {
                expected: "state",
                got: s.to_string(),
            }),
        }
    }
}
