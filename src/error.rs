//! Error types for the cadence bot.

/// Top-level error type for bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// The persisted progress record could not be read, parsed or written.
    #[error("state unavailable: {0}")]
    StateUnavailable(String),

    /// Another writer saved the progress record after it was loaded.
    #[error("state conflict: loaded revision {expected}, found revision {found} on disk")]
    StateConflict {
        /// Revision the in-memory record was loaded at.
        expected: u64,
        /// Revision currently persisted.
        found: u64,
    },

    /// Task plan failed validation (gap, bad key, empty).
    #[error("invalid task plan: {0}")]
    InvalidPlan(String),

    /// Messaging provider rejected or could not deliver a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bot task stopped before answering a request.
    #[error("bot task is shut down")]
    Shutdown,
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;
