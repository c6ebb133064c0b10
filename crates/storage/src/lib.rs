//! Document-store abstraction shared by authstore storage adapters.
//!
//! This crate provides the client traits a storage adapter talks to, the
//! canonical [`StorageError`] type, and the authentication records the
//! adapters persist.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Authentication core                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │              authstore-storage-document                     │
//! │   connection lifecycle │ row mapping │ signing-key queries  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  authstore-storage                          │
//! │          Connector │ Cluster │ Bucket traits                │
//! ├──────────────────┬──────────────────────────────────────────┤
//! │  MemoryCluster   │        database driver                   │
//! │  (testing)       │        (production)                      │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use authstore_storage::{
//!     Bucket, Cluster, ConnectionSettings, Connector, Filter, MemoryCluster, MemoryConnector,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = MemoryCluster::new();
//!     cluster.create_bucket("supertokens");
//!
//!     let connector = MemoryConnector::new(cluster);
//!     let settings = ConnectionSettings {
//!         connection_string: "couchbase://localhost".into(),
//!         user: "Administrator".into(),
//!         password: "password".to_owned().into(),
//!     };
//!     let bucket = connector.connect(&settings).await?.bucket("supertokens");
//!
//!     let doc = json!({"algorithm": "RS256"}).as_object().cloned().unwrap_or_default();
//!     bucket.insert("jwt_signing_keys", "jwt_k1", doc).await?;
//!
//!     let found = bucket.find("jwt_signing_keys", &Filter::all().eq("algorithm", "RS256")).await?;
//!     assert_eq!(found.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Implementing a Driver
//!
//! 1. Implement [`Connector`], [`Cluster`] and [`Bucket`]
//! 2. Map driver errors to [`StorageError`], classifying connection failures with
//!    [`ConnectionFailure`] so startup retries can tell "not up yet" from "broken"
//! 3. Report a missing bucket as [`StorageError::BucketNotFound`]
//!
//! See the [`memory`] module source for a reference implementation.

#![deny(unsafe_code)]

pub mod auth;
pub mod cluster;
pub mod error;
pub mod memory;
pub mod types;

pub use cluster::{Bucket, Cluster, ConnectionSettings, Connector};
pub use error::{BoxError, ConnectionFailure, StorageError, StorageResult};
pub use memory::{MemoryCluster, MemoryConnector};
pub use types::{Cas, Document, Filter, KeyedDocument};
pub use zeroize::Zeroizing;
