//! Bridge error types.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while invoking interpreter work units.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The interpreter process could not be started at all.
    #[error("failed to spawn interpreter: {0}")]
    SpawnFailure(#[source] std::io::Error),

    /// The process ran but produced nothing on stdout.
    #[error("interpreter produced no output: {detail}")]
    EmptyOutput {
        /// Stderr contents when available, otherwise a generic note.
        detail: String,
    },

    /// Stdout was non-empty but was not a valid JSON document.
    #[error("interpreter output is not valid JSON: {message}")]
    Parse {
        /// Underlying parse error.
        message: String,
        /// Leading portion of the offending output, for diagnostics.
        fragment: String,
    },

    /// The invocation did not finish within the configured limit.
    #[error("invocation timed out after {limit:?}")]
    Timeout {
        /// The configured limit that was exceeded.
        limit: Duration,
    },

    /// The work unit itself reported an error.
    #[error("work unit failed: {0}")]
    Remote(String),

    /// The bridge or worker shut down before a response arrived.
    #[error("bridge closed before a response arrived")]
    Closed,

    /// Reading the process output failed.
    #[error("failed to collect interpreter output: {0}")]
    Output(#[source] std::io::Error),
}

/// Convenience result alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
