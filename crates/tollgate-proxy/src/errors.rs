//! Proxy error types.

use thiserror::Error;

/// Errors produced while running the public listener.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Binding or serving the public socket failed.
    #[error("proxy listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
