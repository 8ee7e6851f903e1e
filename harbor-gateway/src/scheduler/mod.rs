//! Scheduler layer for the gateway
//!
//! This layer drives every tracked broker operation to resolution. It
//! owns the per-handle poll loops, chains dependent actions and sweeps
//! settled operations out of the table once nobody needs them.

pub mod poller;
pub mod sweeper;

pub use poller::{OperationPoller, PollConfig};
pub use sweeper::spawn_sweeper;
