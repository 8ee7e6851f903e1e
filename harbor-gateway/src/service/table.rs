//! Operation table
//!
//! Process-wide record of every operation handle the gateway tracks. The
//! table is constructed once at startup and shared (behind an `Arc`) by the
//! HTTP layer, the poller and the sweeper.
//!
//! Each handle is written by exactly one poll loop. Readers follow
//! forwarding pointers until they reach a resolved or live record.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use harbor_core::domain::operation::{OperationHandle, OperationOutcome, OperationState};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Upper bound on forwarding hops a lookup follows
pub const MAX_FORWARD_HOPS: usize = 32;

/// Errors raised when registering a handle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("operation {0} is already tracked")]
    AlreadyTracked(OperationHandle),
}

/// Errors raised when looking a handle up
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("operation {0} not found")]
    NotFound(OperationHandle),

    #[error("operation {0} forwards through more than {MAX_FORWARD_HOPS} hops")]
    ForwardLoop(OperationHandle),
}

/// What a lookup found at the end of a forwarding chain
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Still in flight; `current` is the handle polling happens on
    InFlight {
        current: OperationHandle,
        state: OperationState,
        last_polled_at: Option<DateTime<Utc>>,
    },
    /// Terminal outcome of the chain
    Resolved(OperationOutcome),
}

/// How long settled entries are kept
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Maximum lifetime of a resolved entry
    pub result_retention: Duration,
    /// Lifetime of a resolved entry after it was first looked up
    pub read_retention: Duration,
}

/// One tracked operation
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub handle: OperationHandle,
    /// Name of the broker action this handle was submitted for
    pub action: &'static str,
    pub state: OperationState,
    pub created_at: DateTime<Utc>,
    /// Last time a poll observed the operation still in progress
    pub last_polled_at: Option<DateTime<Utc>>,
    settled_at: Option<Instant>,
    first_read_at: Option<Instant>,
    cancel: CancellationToken,
}

impl OperationRecord {
    fn new(handle: OperationHandle, action: &'static str) -> Self {
        Self {
            handle,
            action,
            state: OperationState::Pending,
            created_at: Utc::now(),
            last_polled_at: None,
            settled_at: None,
            first_read_at: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Moves to `next` if that respects forward-only ordering
    fn transition(&mut self, next: OperationState) -> bool {
        if !self.state.can_transition_to(&next) {
            warn!(
                "Refusing {} -> {} transition for operation {}",
                self.state.label(),
                next.label(),
                self.handle
            );
            return false;
        }

        self.state = next;
        if self.state.is_settled() {
            self.settled_at = Some(Instant::now());
            self.cancel.cancel();
        }
        true
    }

    /// Only resolved records expire on their own
    fn is_expired(&self, now: Instant, policy: &RetentionPolicy) -> bool {
        let (OperationState::Resolved { .. }, Some(settled_at)) = (&self.state, self.settled_at)
        else {
            return false;
        };

        let read_expired = self
            .first_read_at
            .is_some_and(|read_at| now >= read_at + policy.read_retention);

        read_expired || now >= settled_at + policy.result_retention
    }
}

/// In-memory table of tracked operations
#[derive(Debug)]
pub struct OperationTable {
    records: RwLock<HashMap<OperationHandle, OperationRecord>>,
    /// Bumped on every settlement so waiters can re-check their chain
    changes: watch::Sender<u64>,
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTable {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Starts tracking a handle
    ///
    /// Returns the cancellation token of the handle's poll loop; it fires
    /// once the record settles. At most one record, and therefore one poll
    /// loop, exists per handle.
    pub async fn register(
        &self,
        handle: OperationHandle,
        action: &'static str,
    ) -> Result<CancellationToken, TrackError> {
        let mut records = self.records.write().await;

        if records.contains_key(&handle) {
            return Err(TrackError::AlreadyTracked(handle));
        }

        let record = OperationRecord::new(handle.clone(), action);
        let cancel = record.cancel.clone();
        records.insert(handle, record);

        Ok(cancel)
    }

    /// Records a poll that found the operation still in progress
    pub async fn mark_polled(&self, handle: &OperationHandle) {
        let mut records = self.records.write().await;

        if let Some(record) = records.get_mut(handle) {
            record.last_polled_at = Some(Utc::now());
            if record.state == OperationState::Pending {
                record.transition(OperationState::Running);
            }
        }
    }

    /// Captures the terminal outcome of a handle
    ///
    /// The outcome is written once; later calls leave it untouched and
    /// return `false`.
    pub async fn resolve(&self, handle: &OperationHandle, outcome: OperationOutcome) -> bool {
        let code = outcome.code;
        let resolved = {
            let mut records = self.records.write().await;
            match records.get_mut(handle) {
                Some(record) => record.transition(OperationState::Resolved { result: outcome }),
                None => false,
            }
        };

        if resolved {
            info!("Operation {} resolved with status {}", handle, code);
            self.notify();
        }
        resolved
    }

    /// Redirects lookups of `parent` to `child`
    ///
    /// Used when a successful step chains a dependent broker action. The
    /// child should be registered before the parent is forwarded so readers
    /// never meet a dangling pointer.
    pub async fn forward(&self, parent: &OperationHandle, child: &OperationHandle) -> bool {
        let forwarded = {
            let mut records = self.records.write().await;
            match records.get_mut(parent) {
                Some(record) => record.transition(OperationState::Forwarded {
                    forward_to: child.clone(),
                }),
                None => false,
            }
        };

        if forwarded {
            info!("Operation {} forwarded to {}", parent, child);
            self.notify();
        }
        forwarded
    }

    /// Follows the forwarding chain of `handle` to its end
    ///
    /// Reaching a resolved record marks it as read, which starts its read
    /// retention window. Repeated lookups keep returning the same outcome.
    /// Only the first read of a resolved record takes the write lock.
    pub async fn lookup(&self, handle: &OperationHandle) -> Result<Lookup, LookupError> {
        let (lookup, unread) = {
            let records = self.records.read().await;
            follow_chain(&records, handle)?
        };

        if let Some(end) = unread {
            if let Some(record) = self.records.write().await.get_mut(&end) {
                record.first_read_at.get_or_insert_with(Instant::now);
            }
        }

        Ok(lookup)
    }

    /// Waits up to `timeout` for the chain of `handle` to resolve
    ///
    /// Returns the last lookup, which is still in flight if the wait elapsed.
    pub async fn wait_for(
        &self,
        handle: &OperationHandle,
        timeout: Duration,
    ) -> Result<Lookup, LookupError> {
        let deadline = Instant::now() + timeout;
        let mut changes = self.changes.subscribe();

        loop {
            changes.borrow_and_update();
            let lookup = self.lookup(handle).await?;

            if matches!(lookup, Lookup::Resolved(_)) {
                return Ok(lookup);
            }

            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                _ => return Ok(lookup),
            }
        }
    }

    /// Copy of a single record, without following forwarding
    pub async fn snapshot(&self, handle: &OperationHandle) -> Option<OperationRecord> {
        self.records.read().await.get(handle).cloned()
    }

    /// Number of tracked handles
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Removes expired entries
    ///
    /// Resolved entries expire per `policy`; forwarded entries are removed
    /// once the record they point to is gone. Returns the number removed.
    pub async fn evict_expired(&self, now: Instant, policy: &RetentionPolicy) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();

        records.retain(|_, record| !record.is_expired(now, policy));

        // Dropping a forward target can orphan the entry pointing at it
        loop {
            let orphaned: Vec<OperationHandle> = records
                .values()
                .filter_map(|record| match &record.state {
                    OperationState::Forwarded { forward_to } if !records.contains_key(forward_to) => {
                        Some(record.handle.clone())
                    }
                    _ => None,
                })
                .collect();

            if orphaned.is_empty() {
                break;
            }
            for handle in orphaned {
                records.remove(&handle);
            }
        }

        let evicted = before - records.len();
        if evicted > 0 {
            info!("Evicted {} expired operation(s)", evicted);
        }
        evicted
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// Walks forwarding pointers from `handle`
///
/// Also returns the end record's handle when it is resolved but was never
/// read before.
fn follow_chain(
    records: &HashMap<OperationHandle, OperationRecord>,
    handle: &OperationHandle,
) -> Result<(Lookup, Option<OperationHandle>), LookupError> {
    let mut current = handle;

    for _ in 0..=MAX_FORWARD_HOPS {
        let record = records
            .get(current)
            .ok_or_else(|| LookupError::NotFound(current.clone()))?;

        match &record.state {
            OperationState::Forwarded { forward_to } => current = forward_to,
            OperationState::Resolved { result } => {
                let unread = record.first_read_at.is_none().then(|| current.clone());
                return Ok((Lookup::Resolved(result.clone()), unread));
            }
            state => {
                let lookup = Lookup::InFlight {
                    current: current.clone(),
                    state: state.clone(),
                    last_polled_at: record.last_polled_at,
                };
                return Ok((lookup, None));
            }
        }
    }

    Err(LookupError::ForwardLoop(handle.clone()))
}
