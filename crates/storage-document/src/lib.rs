//! Document-database storage adapter for authstore.
//!
//! This crate connects the authentication core to a document database
//! cluster through the client traits of [`authstore_storage`]. It owns the
//! connection lifecycle and implements the signing-key queries that need
//! more than a single keyed call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Authentication core                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  queries::jwt_signing   (read-all, upsert-if-absent)        │
//! │  mapper                 (document ⇄ JwtSigningKeyInfo)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StorageContext         (init_pool, accessors, close)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Connector │ Cluster │ Bucket   (authstore-storage traits)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use authstore_storage::{MemoryCluster, MemoryConnector, auth::JwtSigningKeyInfo};
//! use authstore_storage_document::{
//!     DocumentStoreConfig, StorageContext, set_jwt_signing_key_info_if_no_key_for_algorithm_exists,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = MemoryCluster::new();
//!     cluster.create_bucket("supertokens");
//!
//!     let config = DocumentStoreConfig::builder().connection_uri("couchbase://localhost").build()?;
//!     let (context, token) = StorageContext::new(config, Arc::new(MemoryConnector::new(cluster)));
//!     context.init_pool(&token).await?;
//!
//!     let key = JwtSigningKeyInfo::new("k1", 1_700_000_000_000, "RS256", "public|private");
//!     assert!(set_jwt_signing_key_info_if_no_key_for_algorithm_exists(&context, &key).await?);
//!
//!     context.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Startup
//!
//! The database may come up after this process. [`StorageContext::init_pool`]
//! retries refused connections at a fixed interval for up to
//! [`ConnectionRetryConfig::max_wait`], logging the remaining time on every
//! retry, instead of failing on the first attempt.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
pub mod mapper;
mod pool;
pub mod queries;
mod retry;

/// Shared test utilities for the document storage adapter.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

/// Configuration types and default constants.
pub use config::{
    ConnectionRetryConfig, DEFAULT_BUCKET_NAME, DEFAULT_HOST, DEFAULT_MAX_WAIT, DEFAULT_PASSWORD,
    DEFAULT_READINESS_TIMEOUT, DEFAULT_RETRY_INTERVAL, DEFAULT_SCHEME, DEFAULT_USER,
    DocumentStoreConfig,
};
/// Connection owner and startup capability.
pub use context::{InitializationState, StartupToken, StorageContext};
/// Adapter error types and result alias.
pub use error::{DocumentStorageError, Result};
/// Signing-key queries.
pub use queries::{
    SetKeyOutcome, get_jwt_signing_keys, set_jwt_signing_key_if_absent,
    set_jwt_signing_key_info_if_no_key_for_algorithm_exists,
};
