//! Document-store client traits.
//!
//! These traits are the seam between the storage adapter and the database
//! driver. The adapter never talks to a driver directly: it asks a
//! [`Connector`] for a [`Cluster`], asks the cluster for a [`Bucket`], and
//! issues keyed and predicate operations against the bucket.
//!
//! ```text
//! Connector ──connect──► Cluster ──bucket(name)──► Bucket
//!                          │                         │
//!                        close                get / insert / upsert / find
//! ```
//!
//! Implementations are expected to be thread-safe once constructed; the
//! adapter shares a single cluster and bucket handle between all callers.
//! See [`MemoryConnector`](crate::MemoryConnector) for a reference
//! implementation.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::{
    error::StorageResult,
    types::{Cas, Document, Filter, KeyedDocument},
};

/// Parameters needed to open a cluster connection.
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Connection string, `scheme://host[:port]`.
    pub connection_string: String,
    /// User name presented to the cluster.
    pub user: String,
    /// Password presented to the cluster.
    pub password: Zeroizing<String>,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("connection_string", &self.connection_string)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens cluster connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to the cluster described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`](crate::StorageError::Connection)
    /// when the cluster cannot be reached. Credentials are not necessarily
    /// verified here; bad credentials may only surface on the first query.
    async fn connect(&self, settings: &ConnectionSettings) -> StorageResult<Arc<dyn Cluster>>;
}

/// A live connection to a database cluster.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Returns a handle to the named bucket.
    ///
    /// The handle is returned immediately; use [`Bucket::wait_until_ready`]
    /// to confirm the bucket can serve requests.
    fn bucket(&self, name: &str) -> Arc<dyn Bucket>;

    /// Releases the connection. Operations on handles derived from this
    /// cluster fail afterwards.
    async fn close(&self) -> StorageResult<()>;
}

/// A named data container within a cluster.
///
/// Collections are addressed by name on every call.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Returns the bucket name.
    fn name(&self) -> &str;

    /// Waits until the bucket can serve requests.
    ///
    /// # Errors
    ///
    /// - [`StorageError::BucketNotFound`](crate::StorageError::BucketNotFound) if the bucket does
    ///   not exist
    /// - [`StorageError::Timeout`](crate::StorageError::Timeout) if it is not ready within
    ///   `timeout`
    async fn wait_until_ready(&self, timeout: Duration) -> StorageResult<()>;

    /// Reads a document by key.
    ///
    /// Returns `Ok(None)` if no document is stored under `key`.
    async fn get(&self, collection: &str, key: &str) -> StorageResult<Option<Document>>;

    /// Inserts a document only if `key` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists)
    /// if a document already occupies `key`; the stored document is left
    /// untouched.
    async fn insert(&self, collection: &str, key: &str, document: Document) -> StorageResult<Cas>;

    /// Inserts or replaces the document stored under `key`.
    async fn upsert(&self, collection: &str, key: &str, document: Document) -> StorageResult<Cas>;

    /// Returns every document in `collection` matching `filter`.
    ///
    /// Scans may be served from an index that lags behind keyed writes, so a
    /// document inserted moments ago is not guaranteed to appear.
    async fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<KeyedDocument>>;
}
