//! # tollgate-supervisor
//!
//! Child process supervision for the gateway: spawns the backend and
//! frontend, forwards their output through tracing, probes readiness
//! by polling their listening ports, and kills both on shutdown. There
//! is deliberately no restart policy.

#![deny(unsafe_code)]

pub mod errors;
pub mod process;
pub mod supervisor;

pub use errors::{Result, SupervisorError};
pub use process::{ManagedProcess, ProcessRole, ProcessSpec, ProcessState};
pub use supervisor::Supervisor;
