//! # tollgate-core
//!
//! Shared domain types for the tollgate gateway.
//!
//! The dashboard's collaborators (the bridged runtime, the backend
//! service, the realtime channel) all speak JSON. This crate gives
//! every external entity a typed record with required fields, so
//! malformed payloads fail at the boundary instead of propagating
//! undefined fields through the gateway.

#![deny(unsafe_code)]

pub mod models;

pub use models::{
    AlertSeverity, ClientAccount, Execution, ExecutionStatus, Invoice, InvoiceStatus,
    Notification, Operator, decode,
};
