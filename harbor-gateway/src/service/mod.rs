//! Service Module
//!
//! Business logic layer for the gateway.
//! The operation table and extractor hold the tracking state and result
//! parsing; the tenant service turns HTTP requests into tracked broker
//! actions.

pub mod extractor;
pub mod table;
pub mod tenant;

// Re-export for convenience
pub use tenant as tenant_service;
