//! Shared test utilities for the document storage adapter.
//!
//! Helpers build configurations with short retry timings and contexts backed
//! by an in-memory cluster. Feature-gated behind `testutil` to keep them out
//! of production builds.
//!
//! ```toml
//! [dev-dependencies]
//! authstore-storage-document = { workspace = true, features = ["testutil"] }
//! ```

use std::{sync::Arc, time::Duration};

use authstore_storage::{MemoryCluster, MemoryConnector};

use crate::{
    config::{ConnectionRetryConfig, DocumentStoreConfig},
    context::{StartupToken, StorageContext},
};

/// Bucket name used by the helpers.
pub const TEST_BUCKET: &str = "supertokens";

/// Signing-key collection name under [`test_config`], which sets no prefix.
pub const TEST_JWT_COLLECTION: &str = "jwt_signing_keys";

/// Retry timing for tests: `max_wait` and `retry_interval` as given, 1s
/// readiness wait.
///
/// # Panics
///
/// Panics if either duration is zero.
#[must_use]
pub fn test_retry_config(max_wait: Duration, retry_interval: Duration) -> ConnectionRetryConfig {
    ConnectionRetryConfig::builder()
        .max_wait(max_wait)
        .retry_interval(retry_interval)
        .readiness_timeout(Duration::from_secs(1))
        .build()
        .expect("valid retry config")
}

/// Configuration pointing at `couchbase://localhost` with the given retry timing.
///
/// # Panics
///
/// Panics if the builder rejects the configuration.
#[must_use]
pub fn test_config(retry: ConnectionRetryConfig) -> DocumentStoreConfig {
    DocumentStoreConfig::builder()
        .connection_uri("couchbase://localhost")
        .bucket_name(TEST_BUCKET)
        .retry(retry)
        .build()
        .expect("valid config")
}

/// In-memory cluster with [`TEST_BUCKET`] created, and a connector for it.
#[must_use]
pub fn memory_connector() -> Arc<MemoryConnector> {
    let cluster = MemoryCluster::new();
    cluster.create_bucket(TEST_BUCKET);
    Arc::new(MemoryConnector::new(cluster))
}

/// Uninitialized context over `connector`.
#[must_use]
pub fn test_context(
    connector: Arc<MemoryConnector>,
    retry: ConnectionRetryConfig,
) -> (Arc<StorageContext>, StartupToken) {
    StorageContext::new(test_config(retry), connector)
}

/// Initialized context over a fresh in-memory cluster.
///
/// # Panics
///
/// Panics if initialization fails.
pub async fn ready_context() -> (Arc<StorageContext>, Arc<MemoryConnector>) {
    let connector = memory_connector();
    let (context, token) = test_context(Arc::clone(&connector), ConnectionRetryConfig::default());
    context.init_pool(&token).await.expect("init_pool should succeed");
    (context, connector)
}
