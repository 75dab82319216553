//! Error types for intake-core

use thiserror::Error;

/// Result type alias using intake-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in intake-core operations
///
/// A write rejected by the logical clock is not an error; it is reported as
/// [`crate::models::WriteOutcome::Stale`].
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error (connection loss, constraint violation, lock wait timeout)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored or supplied client clock could not be parsed
    #[error("Invalid client clock: {0}")]
    InvalidClock(String),

    /// Media could not be claimed by a photo section
    #[error("Cannot claim media {media_id}: {reason}")]
    MediaClaim {
        /// Media that failed to be claimed
        media_id: String,
        /// Why the claim was refused
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking database task failed to complete
    #[error("Database task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Task(error.to_string())
    }
}
