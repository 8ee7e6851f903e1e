//! Operation poller
//!
//! Drives one poll loop per tracked operation handle. Each loop sleeps for
//! the poll interval, runs a single tick to completion (fetch, extract,
//! decide, possibly chain) and only then schedules the next sleep, so two
//! ticks for the same handle never overlap.
//!
//! A tick ends in one of four ways:
//! - the outcome is not there yet: keep polling
//! - a terminal outcome: resolve the handle
//! - a successful step with a dependent action: submit it, forward the
//!   handle to the new one and start polling that instead
//! - a budget ran out: resolve the handle with a gateway-generated failure

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use harbor_broker::{BrokerError, OperationBroker};
use harbor_core::domain::action::BrokerAction;
use harbor_core::domain::broker::RawOperationResult;
use harbor_core::domain::operation::{OperationHandle, OperationOutcome};
use serde_json::json;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::service::extractor::{Extraction, extract};
use crate::service::table::{OperationTable, TrackError};

/// Polling cadence and budgets
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between the end of one tick and the start of the next
    pub interval: Duration,
    /// Budget for a whole chain, measured from the first submission
    pub timeout: Duration,
    /// Extra polls granted once the broker finished without the expected key
    pub missing_detail_grace_polls: u32,
    /// Consecutive failed fetches tolerated before giving up
    pub max_fetch_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(600),
            missing_detail_grace_polls: 1,
            max_fetch_failures: 30,
        }
    }
}

/// Per-loop counters, reset when a loop starts
#[derive(Debug, Default)]
struct PollProgress {
    fetch_failures: u32,
    keyless_terminal_polls: u32,
    last_error: Option<BrokerError>,
}

/// What the loop does after a tick
#[derive(Debug, PartialEq, Eq)]
enum Tick {
    Continue,
    Finished,
}

/// Submits broker actions and polls them to resolution
#[derive(Clone)]
pub struct OperationPoller {
    broker: Arc<dyn OperationBroker>,
    table: Arc<OperationTable>,
    config: PollConfig,
}

impl OperationPoller {
    /// Creates a new operation poller
    pub fn new(
        broker: Arc<dyn OperationBroker>,
        table: Arc<OperationTable>,
        config: PollConfig,
    ) -> Self {
        Self {
            broker,
            table,
            config,
        }
    }

    pub fn table(&self) -> &Arc<OperationTable> {
        &self.table
    }

    pub fn broker(&self) -> &Arc<dyn OperationBroker> {
        &self.broker
    }

    /// Submits an action and starts tracking the returned handle
    ///
    /// Submission errors are returned to the caller as-is; once a handle
    /// exists, every later failure is recorded as the handle's outcome.
    pub async fn submit_and_track(
        &self,
        action: BrokerAction,
    ) -> Result<OperationHandle, BrokerError> {
        let handle = self.broker.submit(&action).await?;
        info!("Submitted {} as operation {}", action.name(), handle);

        let deadline = Instant::now() + self.config.timeout;
        if let Err(TrackError::AlreadyTracked(handle)) =
            self.track(handle.clone(), action, deadline).await
        {
            warn!("Broker returned already tracked operation {}", handle);
        }

        Ok(handle)
    }

    /// Registers a handle and spawns its poll loop
    ///
    /// Fails without spawning anything if the handle is already tracked.
    pub async fn track(
        &self,
        handle: OperationHandle,
        action: BrokerAction,
        deadline: Instant,
    ) -> Result<(), TrackError> {
        let cancel = self.table.register(handle.clone(), action.name()).await?;

        tokio::spawn(self.clone().poll_task(handle, action, deadline, cancel));

        Ok(())
    }

    /// Boxed poll loop
    ///
    /// Chaining makes the loop re-enter `track`, so its future type is
    /// recursive and must be erased before it can be spawned.
    fn poll_task(
        self,
        handle: OperationHandle,
        action: BrokerAction,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            self.poll_loop(handle, action, deadline, cancel).await;
        })
    }

    /// Starts polling a chained action and forwards `parent` to it
    pub async fn register_follow_up(
        &self,
        parent: &OperationHandle,
        child: OperationHandle,
        action: BrokerAction,
        deadline: Instant,
    ) {
        if let Err(e) = self.track(child.clone(), action, deadline).await {
            warn!("Follow-up of {}: {}", parent, e);
        }

        if !self.table.forward(parent, &child).await {
            error!("Failed to forward operation {} to {}", parent, child);
        }
    }

    async fn poll_loop(
        &self,
        handle: OperationHandle,
        action: BrokerAction,
        deadline: Instant,
        cancel: CancellationToken,
    ) {
        debug!("Polling operation {} ({})", handle, action.name());
        let mut progress = PollProgress::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Poll loop for {} cancelled", handle);
                    return;
                }
                _ = time::sleep(self.config.interval) => {}
            }

            if self.tick(&handle, &action, deadline, &mut progress).await == Tick::Finished {
                return;
            }
        }
    }

    async fn tick(
        &self,
        handle: &OperationHandle,
        action: &BrokerAction,
        deadline: Instant,
        progress: &mut PollProgress,
    ) -> Tick {
        let raw = match self.broker.fetch(handle).await {
            Ok(raw) => {
                progress.fetch_failures = 0;
                progress.last_error = None;
                raw
            }
            Err(e) => {
                progress.fetch_failures += 1;
                warn!(
                    "Poll {} of operation {} failed ({}/{}): {}",
                    action.name(),
                    handle,
                    progress.fetch_failures,
                    self.config.max_fetch_failures,
                    e
                );

                if !e.is_retryable() || progress.fetch_failures >= self.config.max_fetch_failures {
                    self.table.resolve(handle, e.to_outcome()).await;
                    return Tick::Finished;
                }

                progress.last_error = Some(e);
                return self.check_deadline(handle, deadline, progress).await;
            }
        };

        let key = action.action_key();
        match extract(&raw, &key) {
            Extraction::Available(outcome) => {
                self.settle(handle, action, outcome, deadline).await;
                Tick::Finished
            }
            Extraction::NotYetAvailable { broker_finished } => {
                self.table.mark_polled(handle).await;

                if broker_finished {
                    progress.keyless_terminal_polls += 1;
                    if progress.keyless_terminal_polls > self.config.missing_detail_grace_polls {
                        warn!(
                            "Operation {} finished without reporting {}",
                            handle, key
                        );
                        self.table
                            .resolve(handle, missing_detail_outcome(handle, &key.to_string(), &raw))
                            .await;
                        return Tick::Finished;
                    }
                }

                debug!("Operation {} not ready yet ({})", handle, key);
                self.check_deadline(handle, deadline, progress).await
            }
        }
    }

    /// Resolves the handle or chains the dependent action
    async fn settle(
        &self,
        handle: &OperationHandle,
        action: &BrokerAction,
        outcome: OperationOutcome,
        deadline: Instant,
    ) {
        let Some(next) = action.follow_up(&outcome) else {
            self.table.resolve(handle, outcome).await;
            return;
        };

        match self.broker.submit(&next).await {
            Ok(child) => {
                info!(
                    "Operation {} chained {} as operation {}",
                    handle,
                    next.name(),
                    child
                );
                self.register_follow_up(handle, child, next, deadline).await;
            }
            Err(e) => {
                warn!("Submitting {} after {} failed: {}", next.name(), handle, e);
                self.table.resolve(handle, e.to_outcome()).await;
            }
        }
    }

    async fn check_deadline(
        &self,
        handle: &OperationHandle,
        deadline: Instant,
        progress: &PollProgress,
    ) -> Tick {
        if Instant::now() < deadline {
            return Tick::Continue;
        }

        warn!("Operation {} ran out of its polling budget", handle);
        let outcome = match &progress.last_error {
            Some(e) if !matches!(e, BrokerError::Rejected { .. }) => e.to_outcome(),
            _ => timed_out_outcome(handle, self.config.timeout),
        };
        self.table.resolve(handle, outcome).await;
        Tick::Finished
    }
}

/// Outcome for a broker operation that ended without the expected sub-action
fn missing_detail_outcome(
    handle: &OperationHandle,
    key: &str,
    raw: &RawOperationResult,
) -> OperationOutcome {
    OperationOutcome::new(
        502,
        json!({
            "error": format!("operation {} finished without reporting {}", handle, key),
            "operation": raw.operation,
        }),
    )
}

/// Outcome for an operation chain that outlived its budget
fn timed_out_outcome(handle: &OperationHandle, timeout: Duration) -> OperationOutcome {
    OperationOutcome::new(
        504,
        json!({
            "error": format!(
                "operation {} did not complete within {}s",
                handle,
                timeout.as_secs()
            ),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::table::Lookup;
    use crate::testing::{MockBroker, Scripted, raw};
    use harbor_core::domain::action::RoleGrant;
    use harbor_core::domain::operation::OperationState;

    fn poller(broker: Arc<MockBroker>) -> OperationPoller {
        OperationPoller::new(broker, Arc::new(OperationTable::new()), PollConfig::default())
    }

    fn handle(id: &str) -> OperationHandle {
        OperationHandle::from(id)
    }

    fn create_demo() -> BrokerAction {
        BrokerAction::CreateProject {
            cluster: "clusterA".to_string(),
            project: "demo".to_string(),
            owner: Some(RoleGrant::new("alice", "edit")),
        }
    }

    fn delete_demo() -> BrokerAction {
        BrokerAction::DeleteProject {
            cluster: "clusterA".to_string(),
            project: "demo".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chained_project_creation_resolves_to_role_binding() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.queue_submission(Ok("op-2"));
        broker.script(
            "op-1",
            vec![
                Scripted::Result(raw("running", json!({}))),
                Scripted::Result(raw(
                    "success",
                    json!({
                        "post_project_clusterA": { "code": 201, "body": { "metadata": { "name": "demo" } } }
                    }),
                )),
            ],
        );
        let binding = json!({ "kind": "RoleBinding", "metadata": { "name": "edit", "namespace": "demo" } });
        broker.script(
            "op-2",
            vec![Scripted::Result(raw(
                "success",
                json!({
                    "post_rolebinding_clusterA": { "User-alice-edit": { "code": 200, "body": binding } }
                }),
            ))],
        );

        let poller = poller(broker.clone());
        let table = poller.table().clone();
        let op1 = poller.submit_and_track(create_demo()).await.unwrap();
        assert_eq!(op1, handle("op-1"));

        // First poll: still running
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(
            table.snapshot(&op1).await.unwrap().state,
            OperationState::Running
        );

        // Second poll: project created, role binding submitted as op-2
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            table.snapshot(&op1).await.unwrap().state,
            OperationState::Forwarded {
                forward_to: handle("op-2")
            }
        );
        match table.lookup(&op1).await.unwrap() {
            Lookup::InFlight { current, .. } => assert_eq!(current, handle("op-2")),
            other => panic!("unexpected lookup: {:?}", other),
        }
        assert_eq!(
            broker.submitted()[1],
            BrokerAction::AddRoleBinding {
                cluster: "clusterA".to_string(),
                project: "demo".to_string(),
                grant: RoleGrant::new("alice", "edit"),
            }
        );

        // Third poll, on op-2: role binding done
        time::sleep(Duration::from_secs(1)).await;
        let expected = Lookup::Resolved(OperationOutcome::new(200, binding));
        assert_eq!(table.lookup(&op1).await.unwrap(), expected);
        assert_eq!(table.lookup(&handle("op-2")).await.unwrap(), expected);
        assert_eq!(table.lookup(&op1).await.unwrap(), expected);

        assert_eq!(broker.fetch_count("op-1"), 2);
        assert_eq!(broker.fetch_count("op-2"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_leg_delete_resolves_without_forwarding() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-7"));
        broker.script(
            "op-7",
            vec![Scripted::Result(raw(
                "success",
                json!({ "delete_project_clusterA": { "code": 200, "body": { "status": "Success" } } }),
            ))],
        );

        let poller = poller(broker.clone());
        let op = poller.submit_and_track(delete_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        let expected = Lookup::Resolved(OperationOutcome::new(200, json!({ "status": "Success" })));
        assert_eq!(lookup, expected);
        assert_eq!(poller.table().lookup(&op).await.unwrap(), expected);
        assert_eq!(broker.submitted().len(), 1);
        assert_eq!(poller.table().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_resolves_without_chaining() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.script(
            "op-1",
            vec![Scripted::Result(raw(
                "failure",
                json!({ "post_project_clusterA": { "code": 409, "body": { "reason": "AlreadyExists" } } }),
            ))],
        );

        let poller = poller(broker.clone());
        let op = poller.submit_and_track(create_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(
            lookup,
            Lookup::Resolved(OperationOutcome::new(409, json!({ "reason": "AlreadyExists" })))
        );
        assert_eq!(broker.submitted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_follow_up_resolves_parent_with_rejection() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.queue_submission(Err(Scripted::Rejected(403, json!({ "message": "forbidden" }))));
        broker.script(
            "op-1",
            vec![Scripted::Result(raw(
                "success",
                json!({ "post_project_clusterA": { "code": 201, "body": { "metadata": { "name": "demo" } } } }),
            ))],
        );

        let poller = poller(broker.clone());
        let op = poller.submit_and_track(create_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(
            lookup,
            Lookup::Resolved(OperationOutcome::new(403, json!({ "message": "forbidden" })))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_result_without_key_resolves_after_grace_poll() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.script("op-1", vec![Scripted::Result(raw("success", json!({})))]);

        let poller = poller(broker.clone());
        let op = poller.submit_and_track(delete_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        match lookup {
            Lookup::Resolved(outcome) => {
                assert_eq!(outcome.code, 502);
                assert_eq!(outcome.body["operation"]["state"], "success");
            }
            other => panic!("unexpected lookup: {:?}", other),
        }
        // One poll plus one grace poll
        assert_eq!(broker.fetch_count("op-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_failures_keep_polling() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.script(
            "op-1",
            vec![
                Scripted::Unavailable,
                Scripted::Unavailable,
                Scripted::Result(raw(
                    "success",
                    json!({ "delete_project_clusterA": { "code": 200, "body": {} } }),
                )),
            ],
        );

        let poller = poller(broker.clone());
        let op = poller.submit_and_track(delete_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(lookup, Lookup::Resolved(OperationOutcome::new(200, json!({}))));
        assert_eq!(broker.fetch_count("op-1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_broker_resolves_after_failure_budget() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.script("op-1", vec![Scripted::Unavailable]);

        let config = PollConfig {
            max_fetch_failures: 3,
            ..PollConfig::default()
        };
        let poller = OperationPoller::new(broker.clone(), Arc::new(OperationTable::new()), config);
        let op = poller.submit_and_track(delete_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        match lookup {
            Lookup::Resolved(outcome) => assert_eq!(outcome.code, 502),
            other => panic!("unexpected lookup: {:?}", other),
        }
        assert_eq!(broker.fetch_count("op-1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_operation_times_out() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.script("op-1", vec![Scripted::Result(raw("running", json!({})))]);

        let config = PollConfig {
            timeout: Duration::from_secs(10),
            ..PollConfig::default()
        };
        let poller = OperationPoller::new(broker.clone(), Arc::new(OperationTable::new()), config);
        let op = poller.submit_and_track(delete_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(60))
            .await
            .unwrap();

        match lookup {
            Lookup::Resolved(outcome) => {
                assert_eq!(outcome.code, 504);
                assert!(outcome.body["error"].as_str().unwrap().contains("10s"));
            }
            other => panic!("unexpected lookup: {:?}", other),
        }
        assert_eq!(broker.fetch_count("op-1"), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_tracking_never_doubles_polls() {
        let broker = Arc::new(MockBroker::new());
        broker.script("op-1", vec![Scripted::Result(raw("running", json!({})))]);

        let poller = poller(broker.clone());
        let deadline = Instant::now() + Duration::from_secs(600);
        assert!(poller.track(handle("op-1"), delete_demo(), deadline).await.is_ok());
        assert_eq!(
            poller.track(handle("op-1"), delete_demo(), deadline).await,
            Err(TrackError::AlreadyTracked(handle("op-1")))
        );

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(broker.fetch_count("op-1"), 1);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(broker.fetch_count("op-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_is_returned_to_caller() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Err(Scripted::Unavailable));

        let poller = poller(broker.clone());
        let err = poller.submit_and_track(delete_demo()).await.unwrap_err();

        assert!(matches!(err, BrokerError::Unavailable(_)));
        assert!(poller.table().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_operation_resolves_without_retrying() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.script(
            "op-1",
            vec![Scripted::Rejected(404, json!({ "message": "operation not found" }))],
        );

        let poller = poller(broker.clone());
        let op = poller.submit_and_track(delete_demo()).await.unwrap();
        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(
            lookup,
            Lookup::Resolved(OperationOutcome::new(404, json!({ "message": "operation not found" })))
        );
        assert_eq!(broker.fetch_count("op-1"), 1);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_chained_tracking_runs_on_worker_threads() {
        let broker = Arc::new(MockBroker::new());
        broker.queue_submission(Ok("op-1"));
        broker.queue_submission(Ok("op-2"));
        broker.script(
            "op-1",
            vec![Scripted::Result(raw(
                "success",
                json!({ "post_project_clusterA": { "code": 201, "body": { "metadata": { "name": "demo" } } } }),
            ))],
        );
        broker.script(
            "op-2",
            vec![Scripted::Result(raw(
                "success",
                json!({ "post_rolebinding_clusterA": { "User-alice-edit": { "code": 200, "body": {} } } }),
            ))],
        );

        let config = PollConfig {
            interval: Duration::from_millis(10),
            ..PollConfig::default()
        };
        let poller = OperationPoller::new(broker.clone(), Arc::new(OperationTable::new()), config);

        let submission = poller.submit_and_track(create_demo());
        assert_send(&submission);
        let op = submission.await.unwrap();

        let lookup = poller
            .table()
            .wait_for(&op, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(lookup, Lookup::Resolved(OperationOutcome::new(200, json!({}))));
    }
}
