//! Conversion between stored documents and signing-key records.

use authstore_storage::{Document, auth::JwtSigningKeyInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DocumentStorageError, Result};

/// Prefix of the document key a signing key is stored under.
pub const JWT_KEY_PREFIX: &str = "jwt_";

/// On-disk shape of a signing-key document.
#[derive(Debug, Serialize, Deserialize)]
struct SigningKeyRow {
    #[serde(alias = "_id")]
    id: String,
    key_string: String,
    created_at: i64,
    algorithm: String,
}

/// Returns the document key for a signing key id.
#[must_use]
pub fn jwt_document_key(key_id: &str) -> String {
    format!("{JWT_KEY_PREFIX}{key_id}")
}

/// Decodes a stored document into a signing-key record.
///
/// The key material is classified with
/// [`KeyMaterial::classify`](authstore_storage::auth::KeyMaterial::classify).
///
/// # Errors
///
/// Returns [`DocumentStorageError::MalformedRecord`] if a field is missing or
/// has the wrong type.
pub fn decode_signing_key(document: &Document) -> Result<JwtSigningKeyInfo> {
    let row = SigningKeyRow::deserialize(Value::Object(document.clone()))
        .map_err(|err| DocumentStorageError::malformed("invalid signing key document", err))?;
    Ok(JwtSigningKeyInfo::new(row.id, row.created_at, row.algorithm, row.key_string))
}

/// Encodes a signing-key record as a document.
#[must_use]
pub fn encode_signing_key(key: &JwtSigningKeyInfo) -> Document {
    let mut document = Document::new();
    document.insert("id".into(), Value::from(key.key_id.clone()));
    document.insert("key_string".into(), Value::from(key.key_string()));
    document.insert("created_at".into(), Value::from(key.created_at));
    document.insert("algorithm".into(), Value::from(key.algorithm.clone()));
    document
}
