//! In-memory document cluster.
//!
//! This module provides [`MemoryCluster`], an in-memory stand-in for a
//! document database deployment, and [`MemoryConnector`], a [`Connector`]
//! that opens connections to it. Both are suitable for development and tests.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Keyed insert-if-absent**: [`Bucket::insert`] is atomic per key
//! - **Fault injection**: refuse connections, script connect, readiness or
//!   insert failures, return `Cas(0)` from inserts, report buckets as missing
//!
//! # Example
//!
//! ```
//! use authstore_storage::{ConnectionSettings, Connector, MemoryCluster, MemoryConnector};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cluster = MemoryCluster::new();
//!     cluster.create_bucket("supertokens");
//!
//!     let connector = MemoryConnector::new(cluster.clone());
//!     connector.refuse_next(1);
//!
//!     let settings = ConnectionSettings {
//!         connection_string: "couchbase://localhost".into(),
//!         user: "Administrator".into(),
//!         password: "password".to_owned().into(),
//!     };
//!     assert!(connector.connect(&settings).await.is_err());
//!     assert!(connector.connect(&settings).await.is_ok());
//!     assert_eq!(connector.attempts(), 2);
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the last handle is dropped
//! - Predicate scans see keyed writes immediately, unlike an index-backed
//!   query service

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::{
    cluster::{Bucket, Cluster, ConnectionSettings, Connector},
    error::{ConnectionFailure, StorageError, StorageResult},
    types::{Cas, Document, Filter, KeyedDocument},
};

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

#[derive(Default)]
struct ClusterData {
    buckets: RwLock<BTreeMap<String, Collections>>,
    next_cas: AtomicU64,
    readiness_faults: Mutex<VecDeque<StorageError>>,
    insert_faults: Mutex<VecDeque<StorageError>>,
    zero_cas_inserts: AtomicU32,
}

/// In-memory document database deployment.
///
/// `MemoryCluster` is cheaply cloneable via [`Arc`]; all clones share the
/// same buckets. Connections opened through [`MemoryConnector`] see the same
/// data, and closing a connection leaves the data in place.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    data: Arc<ClusterData>,
}

impl MemoryCluster {
    /// Creates an empty cluster with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the named bucket if it does not exist.
    pub fn create_bucket(&self, name: impl Into<String>) {
        self.data.buckets.write().entry(name.into()).or_default();
    }

    /// Returns `true` if the named bucket exists.
    #[must_use]
    pub fn has_bucket(&self, name: &str) -> bool {
        self.data.buckets.read().contains_key(name)
    }

    /// Makes the next readiness wait on any bucket fail with `error`.
    ///
    /// Faults queue up; each readiness wait consumes one.
    pub fn fail_next_readiness(&self, error: StorageError) {
        self.data.readiness_faults.lock().push_back(error);
    }

    /// Makes the next keyed insert on any bucket fail with `error`.
    pub fn fail_next_insert(&self, error: StorageError) {
        self.data.insert_faults.lock().push_back(error);
    }

    /// Makes the next `count` keyed inserts store their document but return
    /// `Cas(0)`.
    pub fn zero_cas_on_next_inserts(&self, count: u32) {
        self.data.zero_cas_inserts.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns the number of documents stored in a collection.
    #[must_use]
    pub fn document_count(&self, bucket: &str, collection: &str) -> usize {
        self.data
            .buckets
            .read()
            .get(bucket)
            .and_then(|collections| collections.get(collection))
            .map_or(0, BTreeMap::len)
    }

    fn next_cas(&self) -> Cas {
        Cas(self.data.next_cas.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// [`Connector`] that opens connections to a [`MemoryCluster`].
///
/// Faults are consumed in order: refused connections first, then scripted
/// errors, then a successful connection.
pub struct MemoryConnector {
    cluster: MemoryCluster,
    refuse_remaining: AtomicU32,
    scripted_faults: Mutex<VecDeque<StorageError>>,
    attempts: AtomicU32,
    connections: Mutex<Vec<Arc<AtomicBool>>>,
}

impl MemoryConnector {
    /// Creates a connector for `cluster`.
    #[must_use]
    pub fn new(cluster: MemoryCluster) -> Self {
        Self {
            cluster,
            refuse_remaining: AtomicU32::new(0),
            scripted_faults: Mutex::new(VecDeque::new()),
            attempts: AtomicU32::new(0),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Refuses the next `count` connection attempts.
    pub fn refuse_next(&self, count: u32) {
        self.refuse_remaining.store(count, Ordering::SeqCst);
    }

    /// Fails the next connection attempt (after any refusals) with `error`.
    pub fn fail_next(&self, error: StorageError) {
        self.scripted_faults.lock().push_back(error);
    }

    /// Returns the number of connection attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of connections that have not been closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.connections.lock().iter().filter(|closed| !closed.load(Ordering::SeqCst)).count()
    }

    /// Returns the cluster this connector connects to.
    #[must_use]
    pub fn cluster(&self) -> &MemoryCluster {
        &self.cluster
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    #[tracing::instrument(skip(self, settings), fields(connection_string = %settings.connection_string))]
    async fn connect(&self, settings: &ConnectionSettings) -> StorageResult<Arc<dyn Cluster>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refuse_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StorageError::connection_refused(format!(
                "Connection refused: {}",
                settings.connection_string
            )));
        }

        if let Some(error) = self.scripted_faults.lock().pop_front() {
            return Err(error);
        }

        let closed = Arc::new(AtomicBool::new(false));
        self.connections.lock().push(Arc::clone(&closed));
        Ok(Arc::new(MemoryConnection { cluster: self.cluster.clone(), closed }))
    }
}

struct MemoryConnection {
    cluster: MemoryCluster,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Cluster for MemoryConnection {
    fn bucket(&self, name: &str) -> Arc<dyn Bucket> {
        Arc::new(MemoryBucket {
            name: name.to_owned(),
            cluster: self.cluster.clone(),
            closed: Arc::clone(&self.closed),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryBucket {
    name: String,
    cluster: MemoryCluster,
    closed: Arc<AtomicBool>,
}

impl MemoryBucket {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::connection(
                ConnectionFailure::Other,
                "cluster connection closed",
            ));
        }
        Ok(())
    }

    fn with_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut BTreeMap<String, Document>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.ensure_open()?;
        let mut buckets = self.cluster.data.buckets.write();
        let collections = buckets
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::bucket_not_found(self.name.clone()))?;
        f(collections.entry(collection.to_owned()).or_default())
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn wait_until_ready(&self, _timeout: Duration) -> StorageResult<()> {
        self.ensure_open()?;
        if let Some(error) = self.cluster.data.readiness_faults.lock().pop_front() {
            return Err(error);
        }
        if !self.cluster.has_bucket(&self.name) {
            return Err(StorageError::bucket_not_found(self.name.clone()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, collection: &str, key: &str) -> StorageResult<Option<Document>> {
        self.ensure_open()?;
        let buckets = self.cluster.data.buckets.read();
        let collections = buckets
            .get(&self.name)
            .ok_or_else(|| StorageError::bucket_not_found(self.name.clone()))?;
        Ok(collections.get(collection).and_then(|docs| docs.get(key)).cloned())
    }

    #[tracing::instrument(skip(self, document))]
    async fn insert(&self, collection: &str, key: &str, document: Document) -> StorageResult<Cas> {
        if let Some(error) = self.cluster.data.insert_faults.lock().pop_front() {
            return Err(error);
        }
        self.with_collection(collection, |docs| {
            if docs.contains_key(key) {
                return Err(StorageError::already_exists(key));
            }
            docs.insert(key.to_owned(), document);
            let zero_cas = self
                .cluster
                .data
                .zero_cas_inserts
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                .is_ok();
            Ok(if zero_cas { Cas(0) } else { self.cluster.next_cas() })
        })
    }

    #[tracing::instrument(skip(self, document))]
    async fn upsert(&self, collection: &str, key: &str, document: Document) -> StorageResult<Cas> {
        self.with_collection(collection, |docs| {
            docs.insert(key.to_owned(), document);
            Ok(self.cluster.next_cas())
        })
    }

    #[tracing::instrument(skip(self, filter))]
    async fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<KeyedDocument>> {
        self.ensure_open()?;
        let buckets = self.cluster.data.buckets.read();
        let collections = buckets
            .get(&self.name)
            .ok_or_else(|| StorageError::bucket_not_found(self.name.clone()))?;
        Ok(collections
            .get(collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .filter(|(_, document)| filter.matches(document))
            .map(|(key, document)| KeyedDocument { key: key.clone(), document: document.clone() })
            .collect())
    }
}
