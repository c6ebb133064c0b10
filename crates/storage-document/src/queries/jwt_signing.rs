//! JWT signing-key queries.
//!
//! The store has no atomic "insert unless a document matching this predicate
//! exists" primitive, only keyed insert-if-absent. Setting a key for an
//! algorithm therefore runs three steps:
//!
//! 1. **Query**: scan for records with the same algorithm. If any exist, the newest one is
//!    compared with the caller's record and nothing is written.
//! 2. **Insert**: keyed insert under `jwt_<key_id>`. A concurrent writer using the same key id
//!    is rejected here.
//! 3. **Reconcile**: if the insert lost that race, read the winner back by key and compare.
//!
//! The keyed read in step 3 is the source of truth. The scan in step 1 may
//! lag behind keyed writes, so two writers with different key ids can both
//! pass it; that window is accepted.

use authstore_storage::{Filter, KeyedDocument, StorageError, auth::JwtSigningKeyInfo};

use crate::{
    context::StorageContext,
    error::{DocumentStorageError, Result},
    mapper::{decode_signing_key, encode_signing_key, jwt_document_key},
};

/// How a conditional signing-key write resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetKeyOutcome {
    /// The caller's record was inserted.
    Inserted,
    /// A record for the algorithm already existed; nothing was written.
    AlgorithmAlreadyPresent {
        /// The newest stored record for the algorithm.
        stored: JwtSigningKeyInfo,
    },
    /// Another writer inserted the same key id first.
    LostInsertRace {
        /// The record that won.
        stored: JwtSigningKeyInfo,
    },
}

impl SetKeyOutcome {
    /// Returns `true` if the stored record equals `intended`.
    ///
    /// A lost race can still yield `true` when the winner wrote an identical
    /// record.
    #[must_use]
    pub fn stored_matches(&self, intended: &JwtSigningKeyInfo) -> bool {
        match self {
            Self::Inserted => true,
            Self::AlgorithmAlreadyPresent { stored } | Self::LostInsertRace { stored } => {
                stored == intended
            },
        }
    }
}

/// Returns every stored signing key, most recent first.
///
/// # Errors
///
/// Returns an error if the pool is not usable, the scan fails, or a stored
/// record is malformed.
#[tracing::instrument(skip(context))]
pub async fn get_jwt_signing_keys(context: &StorageContext) -> Result<Vec<JwtSigningKeyInfo>> {
    let bucket = context.bucket()?;
    let collection = context.config().jwt_signing_keys_collection();

    let documents = bucket.find(&collection, &Filter::all()).await?;
    let mut keys = decode_all(&documents)?;
    sort_newest_first(&mut keys);
    Ok(keys)
}

/// Stores `key` unless a key for its algorithm already exists.
///
/// # Errors
///
/// - [`DocumentStorageError::WriteConflict`] if the insert fails for a reason other than the
///   key existing
/// - [`DocumentStorageError::ReadFailure`] if the reconciliation read finds nothing
/// - [`DocumentStorageError::InvariantViolation`] if the insert returns no revision or the
///   inserted record does not decode back to `key`
#[tracing::instrument(skip(context, key), fields(key_id = %key.key_id, algorithm = %key.algorithm))]
pub async fn set_jwt_signing_key_if_absent(
    context: &StorageContext,
    key: &JwtSigningKeyInfo,
) -> Result<SetKeyOutcome> {
    let bucket = context.bucket()?;
    let collection = context.config().jwt_signing_keys_collection();

    let existing = bucket
        .find(&collection, &Filter::all().eq("algorithm", key.algorithm.as_str()))
        .await?;
    let mut existing = decode_all(&existing)?;
    sort_newest_first(&mut existing);
    if let Some(stored) = existing.into_iter().next() {
        tracing::debug!(stored_key_id = %stored.key_id, "Signing key for algorithm already present");
        return Ok(SetKeyOutcome::AlgorithmAlreadyPresent { stored });
    }

    let document_key = jwt_document_key(&key.key_id);
    let document = encode_signing_key(key);

    match bucket.insert(&collection, &document_key, document.clone()).await {
        Ok(cas) if !cas.is_valid() => Err(DocumentStorageError::InvariantViolation(format!(
            "insert of signing key {document_key} returned revision {cas}"
        ))),
        Ok(_) => {
            let inserted = decode_signing_key(&document)?;
            if inserted != *key {
                return Err(DocumentStorageError::InvariantViolation(format!(
                    "inserted signing key {document_key} does not match the requested key"
                )));
            }
            tracing::debug!("Signing key inserted");
            Ok(SetKeyOutcome::Inserted)
        },
        Err(StorageError::AlreadyExists { .. }) => {
            let Some(stored) = bucket.get(&collection, &document_key).await? else {
                return Err(DocumentStorageError::ReadFailure { key: document_key });
            };
            let stored = decode_signing_key(&stored)?;
            tracing::debug!(matches = stored == *key, "Lost signing key insert race");
            Ok(SetKeyOutcome::LostInsertRace { stored })
        },
        Err(source) => Err(DocumentStorageError::WriteConflict { key: document_key, source }),
    }
}

/// Stores `key` unless a key for its algorithm already exists, and reports
/// whether the stored record equals `key`.
///
/// # Errors
///
/// Same as [`set_jwt_signing_key_if_absent`].
pub async fn set_jwt_signing_key_info_if_no_key_for_algorithm_exists(
    context: &StorageContext,
    key: &JwtSigningKeyInfo,
) -> Result<bool> {
    let outcome = set_jwt_signing_key_if_absent(context, key).await?;
    Ok(outcome.stored_matches(key))
}

fn decode_all(documents: &[KeyedDocument]) -> Result<Vec<JwtSigningKeyInfo>> {
    documents.iter().map(|keyed| decode_signing_key(&keyed.document)).collect()
}

fn sort_newest_first(keys: &mut [JwtSigningKeyInfo]) {
    keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.key_id.cmp(&b.key_id)));
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use authstore_storage::{
        Bucket, Cluster, ConnectionFailure, Document, MemoryCluster, MemoryConnector, Zeroizing,
        auth::KeyMaterial,
    };

    use super::*;
    use crate::{
        config::ConnectionRetryConfig,
        testutil::{self, TEST_BUCKET},
    };

    async fn ready_context() -> (Arc<StorageContext>, MemoryCluster) {
        let (context, connector) = testutil::ready_context().await;
        (context, connector.cluster().clone())
    }

    #[test]
    fn test_stored_matches() {
        let key = JwtSigningKeyInfo::new("k1", 1, "RS256", "a|b");
        let other = JwtSigningKeyInfo::new("k0", 0, "RS256", "c|d");

        assert!(SetKeyOutcome::Inserted.stored_matches(&key));
        assert!(SetKeyOutcome::LostInsertRace { stored: key.clone() }.stored_matches(&key));
        assert!(!SetKeyOutcome::AlgorithmAlreadyPresent { stored: other }.stored_matches(&key));
    }

    #[test]
    fn test_sort_newest_first_breaks_ties_by_id() {
        let mut keys = vec![
            JwtSigningKeyInfo::new("b", 1, "HS256", "s"),
            JwtSigningKeyInfo::new("c", 5, "HS256", "s"),
            JwtSigningKeyInfo::new("a", 1, "HS256", "s"),
        ];
        sort_newest_first(&mut keys);

        let ids: Vec<_> = keys.iter().map(|k| k.key_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_insert_into_empty_collection() {
        let (context, cluster) = ready_context().await;
        let key = JwtSigningKeyInfo::new("k1", 100, "RS256", "pub|priv");

        let outcome = set_jwt_signing_key_if_absent(&context, &key).await.unwrap();

        assert_eq!(outcome, SetKeyOutcome::Inserted);
        assert_eq!(cluster.document_count(TEST_BUCKET, "jwt_signing_keys"), 1);
        assert_eq!(get_jwt_signing_keys(&context).await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_lost_race_reads_back_winner() {
        let (context, _cluster) = ready_context().await;
        let bucket = context.bucket().unwrap();
        let winner = JwtSigningKeyInfo::new("k1", 100, "RS256", "winner|key");
        // Present under the derived key but invisible to the algorithm scan.
        let mut document = encode_signing_key(&winner);
        document.insert("algorithm".into(), "RS256 ".into());
        bucket.insert("jwt_signing_keys", "jwt_k1", document).await.unwrap();

        let intended = JwtSigningKeyInfo::new("k1", 200, "RS256", "loser|key");
        let outcome = set_jwt_signing_key_if_absent(&context, &intended).await.unwrap();

        match outcome {
            SetKeyOutcome::LostInsertRace { stored } => {
                assert_eq!(stored.key_string(), "winner|key");
                assert_ne!(stored, intended);
            },
            other => panic!("expected lost race, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_existing_record_is_reported() {
        let (context, _cluster) = ready_context().await;
        let bucket = context.bucket().unwrap();
        let mut document = Document::new();
        document.insert("algorithm".into(), "RS256".into());
        bucket.upsert("jwt_signing_keys", "jwt_bad", document).await.unwrap();

        let key = JwtSigningKeyInfo::new("k1", 1, "RS256", "a|b");
        let err = set_jwt_signing_key_if_absent(&context, &key).await.unwrap_err();

        assert!(matches!(err, DocumentStorageError::MalformedRecord { .. }));
    }

    #[tokio::test]
    async fn test_insert_failure_is_write_conflict() {
        let (context, cluster) = ready_context().await;
        cluster.fail_next_insert(StorageError::timeout());

        let key = JwtSigningKeyInfo::new("k1", 1, "RS256", "a|b");
        let err = set_jwt_signing_key_if_absent(&context, &key).await.unwrap_err();

        assert!(matches!(
            err,
            DocumentStorageError::WriteConflict { ref key, source: StorageError::Timeout }
                if key == "jwt_k1"
        ));
        assert_eq!(cluster.document_count(TEST_BUCKET, "jwt_signing_keys"), 0);
    }

    #[tokio::test]
    async fn test_missing_record_after_conflict_is_read_failure() {
        let (context, cluster) = ready_context().await;
        cluster.fail_next_insert(StorageError::already_exists("jwt_k1"));

        let key = JwtSigningKeyInfo::new("k1", 1, "RS256", "a|b");
        let err = set_jwt_signing_key_if_absent(&context, &key).await.unwrap_err();

        assert!(matches!(err, DocumentStorageError::ReadFailure { ref key } if key == "jwt_k1"));
    }

    #[tokio::test]
    async fn test_inserted_record_that_decodes_differently_is_invariant_violation() {
        let (context, _cluster) = ready_context().await;
        // Tagged symmetric, but the separator makes it decode as asymmetric.
        let key = JwtSigningKeyInfo {
            key_id: "k1".into(),
            created_at: 1,
            algorithm: "HS256".into(),
            material: KeyMaterial::Symmetric(Zeroizing::new("a|b".into())),
        };

        let err = set_jwt_signing_key_if_absent(&context, &key).await.unwrap_err();

        assert!(matches!(err, DocumentStorageError::InvariantViolation(_)), "{err}");
    }

    #[tokio::test]
    async fn test_insert_without_revision_is_invariant_violation() {
        let (context, cluster) = ready_context().await;
        cluster.zero_cas_on_next_inserts(1);

        let key = JwtSigningKeyInfo::new("k1", 1, "RS256", "a|b");
        let err = set_jwt_signing_key_if_absent(&context, &key).await.unwrap_err();

        assert!(
            matches!(err, DocumentStorageError::InvariantViolation(ref m) if m.contains("jwt_k1")),
            "{err}"
        );
        let next = JwtSigningKeyInfo::new("k2", 2, "HS256", "secret");
        assert!(
            set_jwt_signing_key_info_if_no_key_for_algorithm_exists(&context, &next)
                .await
                .expect("next insert gets a revision")
        );
    }

    #[tokio::test]
    async fn test_scan_failure_propagates() {
        let (context, _cluster) = ready_context().await;
        context.cluster().unwrap().close().await.unwrap();

        let key = JwtSigningKeyInfo::new("k1", 1, "RS256", "a|b");
        let err = set_jwt_signing_key_if_absent(&context, &key).await.unwrap_err();

        assert!(matches!(
            err,
            DocumentStorageError::Storage(StorageError::Connection {
                kind: ConnectionFailure::Other,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_queries_require_initialized_pool() {
        let connector = Arc::new(MemoryConnector::new(MemoryCluster::new()));
        let (context, _token) = testutil::test_context(connector, ConnectionRetryConfig::default());

        assert!(matches!(
            get_jwt_signing_keys(&context).await,
            Err(DocumentStorageError::NotInitialized)
        ));
    }
}
