//! Supervisor error types.

use std::time::Duration;

use thiserror::Error;

use crate::process::ProcessRole;

/// Errors produced while starting or supervising child processes.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The child executable could not be started.
    #[error("failed to spawn {role}: {source}")]
    Spawn {
        /// Which child failed.
        role: ProcessRole,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The child exited before its listening port opened.
    #[error("{role} exited with code {code:?} before becoming ready")]
    ExitedEarly {
        /// Which child exited.
        role: ProcessRole,
        /// Exit code when the platform reports one.
        code: Option<i32>,
    },

    /// The child never opened its listening port in time.
    #[error("{role} did not open port {port} within {waited:?}")]
    ReadyTimeout {
        /// Which child timed out.
        role: ProcessRole,
        /// Port that never opened.
        port: u16,
        /// How long the supervisor waited.
        waited: Duration,
    },

    /// Polling the child's status failed.
    #[error("failed to poll {role}: {source}")]
    Poll {
        /// Which child was being polled.
        role: ProcessRole,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;
