//! # tollgate-bridge
//!
//! Subprocess RPC bridge: runs interpreter work units and parses their
//! stdout as JSON.
//!
//! Two execution models are provided:
//! - [`Bridge`] spawns a fresh interpreter per invocation
//! - [`BridgeWorker`] keeps one interpreter alive and multiplexes
//!   requests over line-delimited JSON with correlation ids

#![deny(unsafe_code)]

pub mod errors;
pub mod runner;
pub mod worker;

pub use errors::{BridgeError, Result};
pub use runner::{Bridge, BridgeConfig};
pub use worker::BridgeWorker;
