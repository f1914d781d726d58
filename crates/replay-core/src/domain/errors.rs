//! Error types and their operational classification.

use thiserror::Error;

use super::ids::MutationId;
use super::mutation::MutationType;

/// How a sync failure should be treated by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Worth retrying later (network, 5xx).
    Transient,
    /// Retrying cannot help (4xx, malformed payload).
    Permanent,
    /// Concurrent edit; resolution is delegated to the sync engine.
    Conflict,
}

/// A malformed intent, rejected before it ever reaches the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{mutation_type} mutation is missing required field `{field}`")]
    MissingField {
        mutation_type: MutationType,
        field: &'static str,
    },

    #[error("update mutation must change at least one field")]
    EmptyChanges,

    #[error("payload could not be encoded: {0}")]
    Encode(String),
}

/// Errors surfaced by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("mutation not found: {0}")]
    NotFound(MutationId),

    #[error("mutation already queued: {0}")]
    DuplicateId(MutationId),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failures of the key-value substrate.
///
/// Never propagated out of a queue operation; the store logs them and keeps
/// running in memory.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded while writing `{key}`")]
    QuotaExceeded { key: String },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A typed failure reported by the sync engine for one mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl SyncError {
    /// Classify an HTTP-style status code.
    ///
    /// 409 is a conflict, other 4xx are client errors, everything else
    /// (5xx, unknown codes) is treated as a retryable server error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            409 => Self::Conflict(message),
            400..=499 => Self::Client { status, message },
            _ => Self::Server { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Server { .. } => ErrorKind::Transient,
            Self::Client { .. } | Self::Validation(_) => ErrorKind::Permanent,
            Self::Conflict(_) => ErrorKind::Conflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
