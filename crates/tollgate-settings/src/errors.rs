//! Settings error types.

use thiserror::Error;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contained invalid JSON or an invalid value.
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
