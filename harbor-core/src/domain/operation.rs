//! Operation domain types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier returned by the job broker when an action is submitted
///
/// Harbor never generates these; it only uses them as keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OperationHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OperationHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Terminal outcome of a broker sub-action
///
/// `code` is the HTTP status the platform answered the sub-action with and
/// `body` is its payload, passed through to callers unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub code: u16,
    pub body: serde_json::Value,
}

impl OperationOutcome {
    pub fn new(code: u16, body: serde_json::Value) -> Self {
        Self { code, body }
    }

    /// Whether the sub-action answered with a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Disposition of a tracked operation
///
/// States only move forward: `Pending` -> `Running` -> `Resolved` | `Forwarded`.
/// A first poll may skip `Running` when the result is already available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    /// Registered, no poll executed yet
    Pending,
    /// At least one poll observed the operation still in progress
    Running,
    /// Terminal outcome captured
    Resolved { result: OperationOutcome },
    /// The answer lives under another handle created by a chained action
    Forwarded { forward_to: OperationHandle },
}

impl OperationState {
    fn rank(&self) -> u8 {
        match self {
            OperationState::Pending => 0,
            OperationState::Running => 1,
            OperationState::Resolved { .. } | OperationState::Forwarded { .. } => 2,
        }
    }

    /// Whether moving from `self` to `next` respects forward-only ordering
    pub fn can_transition_to(&self, next: &OperationState) -> bool {
        next.rank() > self.rank()
    }

    /// Whether no further polling will happen for this handle
    pub fn is_settled(&self) -> bool {
        self.rank() == 2
    }

    /// Short lowercase label used in logs and status responses
    pub fn label(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::Running => "running",
            OperationState::Resolved { .. } => "resolved",
            OperationState::Forwarded { .. } => "forwarded",
        }
    }
}
