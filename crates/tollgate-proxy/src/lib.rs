//! # tollgate-proxy
//!
//! The public face of the gateway: one port serving API traffic and
//! static assets. Paths under the API prefix are forwarded to the
//! backend upstream, transparently for both plain HTTP and WebSocket
//! upgrades. Every other path is served from the static root with an
//! `index.html` fallback for client-side routes.

#![deny(unsafe_code)]

pub mod errors;
pub mod server;
pub mod upstream;
pub mod ws;

pub use errors::{ProxyError, Result};
pub use server::{AppState, ProxyConfig, ProxyServer};
