//! Owning context of the document store connection.
//!
//! A [`StorageContext`] holds everything one host process needs to talk to
//! the database: its configuration, the connector, the published cluster
//! and bucket handles, and the initialization state. Nothing is stored in
//! globals; the context is passed explicitly to every operation.
//!
//! Creating a context also yields its [`StartupToken`]. The token is the
//! capability to run [`StorageContext::init_pool`]; whoever holds it is the
//! designated startup context.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwapOption;
use authstore_storage::{Bucket, Cluster, Connector};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::config::DocumentStoreConfig;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Initialization progress of a [`StorageContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    /// No connection exists and none is being established.
    Uninitialized,
    /// `init_pool` is connecting or waiting to retry.
    Initializing,
    /// Handles are published and usable.
    Ready,
}

/// Value carried by the readiness latch.
///
/// `aborts` counts failed initializations and closes so waiters can tell
/// "not ready yet" apart from "gave up".
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lifecycle {
    pub(crate) state: InitializationState,
    pub(crate) aborts: u64,
}

/// The published cluster and bucket handles.
pub(crate) struct PoolHandles {
    pub(crate) cluster: Arc<dyn Cluster>,
    pub(crate) bucket: Arc<dyn Bucket>,
}

/// Capability to initialize one [`StorageContext`].
///
/// Returned once by [`StorageContext::new`]. It cannot be cloned, and a token
/// minted for one context is rejected by every other context.
#[derive(Debug)]
pub struct StartupToken {
    pub(crate) context_id: u64,
}

/// Owner of the document store connection for one host process.
pub struct StorageContext {
    pub(crate) id: u64,
    pub(crate) config: DocumentStoreConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) enabled: AtomicBool,
    pub(crate) shutdown: CancellationToken,
    pub(crate) handles: ArcSwapOption<PoolHandles>,
    pub(crate) lifecycle_lock: Mutex<()>,
    pub(crate) lifecycle: watch::Sender<Lifecycle>,
}

impl StorageContext {
    /// Creates a context and the token that authorizes its initialization.
    ///
    /// No connection is attempted until [`init_pool`](Self::init_pool) runs.
    #[must_use]
    pub fn new(
        config: DocumentStoreConfig,
        connector: Arc<dyn Connector>,
    ) -> (Arc<Self>, StartupToken) {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (lifecycle, _) = watch::channel(Lifecycle {
            state: InitializationState::Uninitialized,
            aborts: 0,
        });

        let context = Arc::new(Self {
            id,
            config,
            connector,
            enabled: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            handles: ArcSwapOption::empty(),
            lifecycle_lock: Mutex::new(()),
            lifecycle,
        });

        (context, StartupToken { context_id: id })
    }

    /// Returns the process identity of this context.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DocumentStoreConfig {
        &self.config
    }

    /// Returns `true` unless storage has been administratively disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns a token that is cancelled by [`shutdown`](Self::shutdown).
    ///
    /// Signal handlers can hold a clone of it to observe an in-progress
    /// initialization being aborted.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn set_state(&self, state: InitializationState) {
        self.lifecycle.send_modify(|lifecycle| lifecycle.state = state);
    }

    pub(crate) fn abort_lifecycle(&self) {
        self.lifecycle.send_modify(|lifecycle| {
            lifecycle.state = InitializationState::Uninitialized;
            lifecycle.aborts += 1;
        });
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("id", &self.id)
            .field("bucket", &self.config.bucket_name())
            .field("enabled", &self.is_enabled())
            .field("state", &self.lifecycle.borrow().state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use authstore_storage::{MemoryCluster, MemoryConnector};

    use super::*;

    fn config() -> DocumentStoreConfig {
        DocumentStoreConfig::builder()
            .connection_uri("couchbase://localhost")
            .build()
            .expect("valid config")
    }

    #[test]
    fn test_contexts_get_distinct_identities() {
        let connector = Arc::new(MemoryConnector::new(MemoryCluster::new()));
        let (a, token_a) = StorageContext::new(config(), connector.clone());
        let (b, token_b) = StorageContext::new(config(), connector);

        assert_ne!(a.id(), b.id());
        assert_eq!(token_a.context_id, a.id());
        assert_eq!(token_b.context_id, b.id());
    }

    #[test]
    fn test_new_context_is_uninitialized_and_enabled() {
        let connector = Arc::new(MemoryConnector::new(MemoryCluster::new()));
        let (context, _token) = StorageContext::new(config(), connector);

        assert!(context.is_enabled());
        assert_eq!(context.lifecycle.borrow().state, InitializationState::Uninitialized);
        assert!(context.handles.load().is_none());
        assert!(!context.shutdown_token().is_cancelled());
    }

    #[test]
    fn test_debug_omits_credentials() {
        let config = DocumentStoreConfig::builder()
            .connection_uri("couchbase://localhost")
            .password("s3cret")
            .build()
            .expect("valid config");
        let connector = Arc::new(MemoryConnector::new(MemoryCluster::new()));
        let (context, _token) = StorageContext::new(config, connector);

        let rendered = format!("{context:?}");
        assert!(!rendered.contains("s3cret"), "{rendered}");
        assert!(rendered.contains("supertokens"));
    }
}
