//! Scripted broker for exercising the polling layer without a network

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use harbor_broker::{BrokerError, OperationBroker};
use harbor_core::domain::action::BrokerAction;
use harbor_core::domain::broker::RawOperationResult;
use harbor_core::domain::operation::OperationHandle;
use serde_json::{Value, json};

/// One scripted broker answer
#[derive(Debug, Clone)]
pub enum Scripted {
    Result(RawOperationResult),
    Unavailable,
    Rejected(u16, Value),
}

impl Scripted {
    fn into_error(self) -> BrokerError {
        match self {
            Scripted::Rejected(status, body) => BrokerError::Rejected { status, body },
            _ => BrokerError::Unavailable("connection refused".to_string()),
        }
    }
}

/// Builds a broker result with the given state and details
pub fn raw(state: &str, details: Value) -> RawOperationResult {
    serde_json::from_value(json!({
        "operation": { "state": state },
        "details": details,
    }))
    .unwrap()
}

/// Broker double answering from per-handle scripts
///
/// Submissions pop from a queue. Fetches walk the handle's script and keep
/// repeating its last entry once exhausted.
#[derive(Debug, Default)]
pub struct MockBroker {
    submissions: Mutex<VecDeque<Result<OperationHandle, Scripted>>>,
    scripts: Mutex<HashMap<OperationHandle, VecDeque<Scripted>>>,
    projects: Mutex<Vec<String>>,
    submitted: Mutex<Vec<BrokerAction>>,
    fetches: Mutex<HashMap<OperationHandle, usize>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_submission(&self, result: Result<&str, Scripted>) {
        self.submissions
            .lock()
            .unwrap()
            .push_back(result.map(OperationHandle::from));
    }

    pub fn script(&self, handle: &str, answers: Vec<Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(OperationHandle::from(handle), answers.into());
    }

    pub fn set_projects(&self, projects: &[&str]) {
        *self.projects.lock().unwrap() = projects.iter().map(|p| p.to_string()).collect();
    }

    /// Every action submitted so far, in order
    pub fn submitted(&self) -> Vec<BrokerAction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, handle: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(&OperationHandle::from(handle))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl OperationBroker for MockBroker {
    async fn submit(&self, action: &BrokerAction) -> harbor_broker::Result<OperationHandle> {
        self.submitted.lock().unwrap().push(action.clone());

        match self.submissions.lock().unwrap().pop_front() {
            Some(Ok(handle)) => Ok(handle),
            Some(Err(scripted)) => Err(scripted.into_error()),
            None => Err(BrokerError::Unavailable("no submission scripted".to_string())),
        }
    }

    async fn fetch(&self, handle: &OperationHandle) -> harbor_broker::Result<RawOperationResult> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(handle.clone())
            .or_default() += 1;

        let answer = {
            let mut scripts = self.scripts.lock().unwrap();
            let Some(script) = scripts.get_mut(handle) else {
                return Err(BrokerError::Rejected {
                    status: 404,
                    body: json!({ "message": "operation not found" }),
                });
            };
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };

        match answer {
            Some(Scripted::Result(raw)) => Ok(raw),
            Some(other) => Err(other.into_error()),
            None => Err(BrokerError::Unavailable("empty script".to_string())),
        }
    }

    async fn list_projects(&self, _cluster: &str) -> harbor_broker::Result<Vec<String>> {
        Ok(self.projects.lock().unwrap().clone())
    }
}
