//! Harbor Core
//!
//! Core types shared by the Harbor gateway, its broker client and the CLI.
//!
//! This crate contains:
//! - Domain types: operation handles, tracked operation state, broker actions
//!   and the raw operation results reported by the job broker
//! - DTOs: request and response bodies exchanged with gateway clients

pub mod domain;
pub mod dto;
