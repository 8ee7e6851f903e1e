//! Raw operation results as reported by the job broker

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of a broker operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerState {
    Running,
    Success,
    Failure,
    /// Any state this gateway does not know about; treated as still running
    #[serde(other)]
    Unknown,
}

impl BrokerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BrokerState::Success | BrokerState::Failure)
    }
}

/// The `operation` block of a broker result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOperation {
    pub state: BrokerState,
    /// Remaining fields, kept for diagnostics and pass-through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `GET /v1/operations/{id}`
///
/// `details` maps sub-action keys (e.g. `post_project_<cluster>`) to either a
/// `{code, body}` pair or to a map of named `{code, body}` pairs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawOperationResult {
    #[serde(default)]
    pub operation: Option<BrokerOperation>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl RawOperationResult {
    /// Broker state, if the broker reported one
    pub fn state(&self) -> Option<BrokerState> {
        self.operation.as_ref().map(|op| op.state)
    }

    /// Whether the broker considers the whole operation finished
    pub fn is_finished(&self) -> bool {
        self.state().is_some_and(BrokerState::is_terminal)
    }
}

/// Body returned by broker submission endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub operation_id: super::operation::OperationHandle,
}
