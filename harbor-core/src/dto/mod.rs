//! Data Transfer Objects for gateway clients
//!
//! Request and response bodies exchanged between the gateway and the UI or
//! automation clients (including the Harbor CLI).

pub mod operation;
pub mod project;
