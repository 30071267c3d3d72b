//! Error types for the conversation store.

use thiserror::Error;

/// Conversation store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// User label cap reached; the edit was discarded.
    #[error("label capacity exceeded: at most {limit} user labels")]
    LabelCapacityExceeded {
        /// Configured cap on live user labels.
        limit: usize,
    },
    /// A stored or restored document could not be interpreted.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Base64 payload inside a binary-safe document was malformed.
    #[error("encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Remote lookup through the transport failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Backend adapter reported a failure of its own.
    #[error("backend error: {0}")]
    Backend(String),
    /// The event channel was closed.
    #[error("event channel closed")]
    ChannelClosed,
}

impl StoreError {
    /// Whether the error came from the persistence layer.
    ///
    /// The in-memory mirror stays authoritative when this is true.
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::TokioSqlite(_) | Self::Backend(_) | Self::Io(_)
        )
    }

    /// Whether the error is a rejected edit rather than a failure.
    #[must_use]
    pub const fn is_capacity(&self) -> bool {
        matches!(self, Self::LabelCapacityExceeded { .. })
    }
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
