//! Error types for ludosync-core

use thiserror::Error;

/// Result type alias using ludosync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ludosync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The server rejected a diff save; the client must retry with a full save
    #[error("manual synchronization required")]
    ManualSyncRequired,

    /// The server rejected a save; the client has fallen behind and must fetch
    #[error("force fetch required")]
    ForceFetchRequired,

    /// Non-success HTTP response with a best-effort extracted message
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure (connection, timeout, body read)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Entity not found in the local store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attachment storage error
    #[error("Attachment storage error: {0}")]
    Attachment(String),
}

impl Error {
    /// Whether this failure is the structured conflict telling the caller to
    /// downgrade a diff save to a full save.
    #[must_use]
    pub const fn is_manual_sync_required(&self) -> bool {
        matches!(self, Self::ManualSyncRequired)
    }
}
