//! Operation tracking DTOs

use serde::{Deserialize, Serialize};

use crate::domain::operation::OperationHandle;

/// How a submitting request wants to be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// Wait (bounded) for the operation to resolve
    #[default]
    Sync,
    /// Answer immediately with the operation handle
    Async,
}

/// Query parameters accepted by every submitting route
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub mode: SubmitMode,
}

/// Body of a `202 Accepted` answer: the operation is still in flight
///
/// `operation_id` is the handle the client asked about (or was given);
/// `current` is the live handle polling is happening on when the operation
/// has been forwarded to a chained action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationProgress {
    pub operation_id: OperationHandle,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<OperationHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl OperationProgress {
    pub fn running(operation_id: OperationHandle) -> Self {
        Self {
            operation_id,
            state: "running".to_string(),
            current: None,
            last_polled_at: None,
        }
    }
}
