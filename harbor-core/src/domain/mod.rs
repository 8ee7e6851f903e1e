//! Core domain types
//!
//! These types describe asynchronous broker operations as the gateway tracks
//! them. They are shared between the broker client (which produces them) and
//! the gateway (which polls, forwards and resolves them).

pub mod action;
pub mod broker;
pub mod operation;
