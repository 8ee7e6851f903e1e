//! Periodic eviction of settled operations

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::service::table::{OperationTable, RetentionPolicy};

/// Spawns a background task evicting expired entries every `interval`
pub fn spawn_sweeper(
    table: Arc<OperationTable>,
    policy: RetentionPolicy,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let evicted = table.evict_expired(Instant::now(), &policy).await;
            if evicted > 0 {
                debug!(
                    "Sweeper evicted {} operation(s), {} still tracked",
                    evicted,
                    table.len().await
                );
            }
        }
    })
}
