//! # tollgate-realtime
//!
//! WebSocket client connection manager with reconnection backoff.
//!
//! A [`RealtimeManager`] owns at most one transport at a time and
//! drives it through an observable state machine: `Disconnected`,
//! `Connecting`, `Connected`, `Reconnecting`. Consecutive failures back
//! off exponentially until a configurable ceiling, after which the
//! manager gives up.

#![deny(unsafe_code)]

pub mod backoff;
pub mod endpoint;
pub mod manager;

pub use backoff::reconnect_delay;
pub use endpoint::endpoint_from_origin;
pub use manager::{ConnectionState, RealtimeConfig, RealtimeManager};
