//! Error types for the broker client

use harbor_core::domain::operation::OperationOutcome;
use serde_json::json;
use thiserror::Error;

/// Result type alias for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur when talking to the job broker
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker answered with a non-2xx status
    #[error("Broker rejected request (status {status}): {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, JSON when the broker sent JSON
        body: serde_json::Value,
    },

    /// Failed to parse a broker response
    #[error("Failed to parse broker response: {0}")]
    Parse(String),

    /// Token acquisition failed
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

impl BrokerError {
    /// Create a rejection from status code and raw body text
    pub fn rejected(status: u16, body: &str) -> Self {
        let body = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::Value::String(body.to_string()));
        Self::Rejected { status, body }
    }

    /// Whether a later attempt might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Auth(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::Parse(_) => false,
        }
    }

    /// Terminal outcome recorded for an operation that failed with this error
    ///
    /// Rejections pass the broker's own status and body through; everything
    /// else becomes a 502 since there is no upstream payload to forward.
    pub fn to_outcome(&self) -> OperationOutcome {
        match self {
            Self::Rejected { status, body } => OperationOutcome::new(*status, body.clone()),
            other => OperationOutcome::new(502, json!({ "error": other.to_string() })),
        }
    }
}
