//! Storage error types and result alias.
//!
//! This module defines the canonical errors a document-store client reports.
//! Client implementations map their internal failures onto these variants so
//! the adapter layer can reason about them without knowing the driver.
//!
//! # Error Types
//!
//! - [`StorageError::NotFound`] - Document does not exist
//! - [`StorageError::AlreadyExists`] - Keyed insert found an existing document
//! - [`StorageError::BucketNotFound`] - The configured bucket does not exist (yet)
//! - [`StorageError::Connection`] - Network or connection-related failures
//! - [`StorageError::Serialization`] - Document encoding/decoding failures
//! - [`StorageError::Internal`] - Driver-specific internal errors
//! - [`StorageError::Timeout`] - Operation exceeded time limit
//!
//! # Example
//!
//! ```
//! use authstore_storage::{StorageError, StorageResult};
//!
//! fn lookup(key: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(key))
//! }
//! ```

use std::{fmt, sync::Arc};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Classification of a connection failure.
///
/// The connection manager only retries the classes that mean "the database
/// process is not accepting connections yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionFailure {
    /// The remote end refused the connection.
    Refused,
    /// The stream closed before a complete response was read.
    PrematureEndOfStream,
    /// Any other transport failure (DNS, TLS, authentication handshake, ...).
    Other,
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => write!(f, "connection refused"),
            Self::PrematureEndOfStream => write!(f, "prematurely reached end of stream"),
            Self::Other => write!(f, "connection failure"),
        }
    }
}

/// Errors that can occur during document-store operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// debugging tools to display the full error context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The requested document was not found.
    #[error("Document not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A keyed insert was rejected because a document already occupies the key.
    #[error("Document already exists: {key}")]
    AlreadyExists {
        /// The key that is already occupied.
        key: String,
    },

    /// The bucket does not exist on the cluster.
    #[error("Bucket doesn't exist: {bucket}")]
    BucketNotFound {
        /// Name of the missing bucket.
        bucket: String,
    },

    /// Connection or network error.
    #[error("Connection error ({kind}): {message}")]
    Connection {
        /// Failure class, used to decide whether a startup retry is worthwhile.
        kind: ConnectionFailure,
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Serialization or deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal client error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `AlreadyExists` error for the given key.
    #[must_use]
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Creates a new `BucketNotFound` error.
    #[must_use]
    pub fn bucket_not_found(bucket: impl Into<String>) -> Self {
        Self::BucketNotFound { bucket: bucket.into() }
    }

    /// Creates a new `Connection` error of the given class.
    #[must_use]
    pub fn connection(kind: ConnectionFailure, message: impl Into<String>) -> Self {
        Self::Connection { kind, message: message.into(), source: None }
    }

    /// Creates a `Connection` error for a refused connection.
    #[must_use]
    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::connection(ConnectionFailure::Refused, message)
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        kind: ConnectionFailure,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { kind, message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` if the error means the database is not accepting
    /// connections yet.
    ///
    /// Only refused connections and prematurely closed streams qualify. Every
    /// other failure, timeouts included, indicates a problem that waiting
    /// will not fix.
    #[must_use]
    pub fn is_not_yet_reachable(&self) -> bool {
        matches!(
            self,
            Self::Connection {
                kind: ConnectionFailure::Refused | ConnectionFailure::PrematureEndOfStream,
                ..
            }
        )
    }
}
