//! Error types for the document storage adapter.
//!
//! [`DocumentStorageError`] covers connection lifecycle failures, malformed
//! stored records and violated write invariants. It converts into the
//! canonical [`StorageError`] for callers that only speak that type.

use std::time::Duration;

use authstore_storage::StorageError;
use thiserror::Error;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, DocumentStorageError>;

/// Errors reported by the document storage adapter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentStorageError {
    /// No connection has been established yet.
    #[error("Storage layer not initialized")]
    NotInitialized,

    /// Storage access has been administratively disabled; callers treat the
    /// store as unavailable.
    #[error("Storage layer disabled")]
    Disabled,

    /// The database kept refusing connections for the whole retry window.
    #[error("{message} (waited {waited:?})")]
    InitializationTimeout {
        /// How long the connection manager kept retrying.
        waited: Duration,
        /// Operator-facing description.
        message: String,
    },

    /// Connecting failed for a reason other than the database being down.
    #[error("Failed to initialize storage: {message}")]
    Initialization {
        /// Description of the failure.
        message: String,
        /// The underlying client error, if any.
        #[source]
        source: Option<StorageError>,
    },

    /// A stored record is missing a field or has the wrong type.
    #[error("Malformed record: {message}")]
    MalformedRecord {
        /// Which field failed and how.
        message: String,
        /// The decoding error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A keyed insert failed for a reason other than the key existing.
    #[error("Write failed for {key}")]
    WriteConflict {
        /// Document key of the failed write.
        key: String,
        /// The underlying client error.
        #[source]
        source: StorageError,
    },

    /// A record that must exist could not be read back.
    #[error("Failed to read back {key}")]
    ReadFailure {
        /// Document key of the missing record.
        key: String,
    },

    /// A write appeared to succeed but the stored state contradicts it.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the document-store client.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DocumentStorageError {
    pub(crate) fn initialization(message: impl Into<String>, source: StorageError) -> Self {
        Self::Initialization { message: message.into(), source: Some(source) }
    }

    pub(crate) fn malformed(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedRecord { message: message.into(), source: Some(source) }
    }
}

impl From<DocumentStorageError> for StorageError {
    fn from(err: DocumentStorageError) -> Self {
        match err {
            DocumentStorageError::Storage(source) => source,
            DocumentStorageError::WriteConflict { source, .. } => source,
            DocumentStorageError::InitializationTimeout { message, .. } => {
                StorageError::connection_refused(message)
            },
            DocumentStorageError::Initialization { message, source: Some(source) } => {
                StorageError::internal_with_source(message, source)
            },
            DocumentStorageError::MalformedRecord { message, source: Some(source) } => {
                StorageError::serialization_with_source(message, source)
            },
            DocumentStorageError::MalformedRecord { message, source: None } => {
                StorageError::serialization(message)
            },
            DocumentStorageError::ReadFailure { key } => StorageError::not_found(key),
            other => StorageError::internal(other.to_string()),
        }
    }
}
