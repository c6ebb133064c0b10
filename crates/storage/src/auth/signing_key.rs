//! JWT signing key type.

use std::fmt;

use zeroize::Zeroizing;

/// Characters that only appear in composite (asymmetric) key encodings.
pub const ASYMMETRIC_KEY_SEPARATORS: [char; 2] = ['|', ';'];

/// Key material of a signing key.
///
/// Asymmetric keys are stored as a composite string in which the public and
/// private halves are joined with `|` or `;`. Symmetric secrets never contain
/// those characters, which is what [`KeyMaterial::classify`] relies on.
///
/// The string is wrapped in [`Zeroizing`] so it is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// A shared secret (HMAC family).
    Symmetric(Zeroizing<String>),
    /// A composite public/private key encoding.
    Asymmetric(Zeroizing<String>),
}

impl KeyMaterial {
    /// Classifies a stored key string.
    ///
    /// A string containing `|` or `;` is asymmetric; anything else is
    /// symmetric. This is a content heuristic, not a schema guarantee, and
    /// stored data depends on it staying exactly this rule.
    ///
    /// ```
    /// use authstore_storage::auth::KeyMaterial;
    ///
    /// assert!(KeyMaterial::classify("pub|priv").is_asymmetric());
    /// assert!(!KeyMaterial::classify("c2VjcmV0").is_asymmetric());
    /// ```
    #[must_use]
    pub fn classify(key_string: impl Into<String>) -> Self {
        let key_string = Zeroizing::new(key_string.into());
        if key_string.contains(ASYMMETRIC_KEY_SEPARATORS) {
            Self::Asymmetric(key_string)
        } else {
            Self::Symmetric(key_string)
        }
    }

    /// Returns `true` for composite asymmetric key material.
    #[must_use]
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, Self::Asymmetric(_))
    }

    /// Returns the stored key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Symmetric(s) | Self::Asymmetric(s) => s.as_str(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric(_) => f.write_str("Symmetric(<redacted>)"),
            Self::Asymmetric(_) => f.write_str("Asymmetric(<redacted>)"),
        }
    }
}

/// A JWT signing key as persisted by the storage layer.
///
/// `created_at` is only used to find the most recently added key. It says
/// nothing about the validity or lifetime of the key: keys supplied by users
/// may carry any creation time.
///
/// Equality compares every field, key material included. Two records with
/// the same `key_id` but different material are different records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JwtSigningKeyInfo {
    /// Key identifier, unique within the signing-key collection.
    pub key_id: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// JWT algorithm name, e.g. `RS256`.
    pub algorithm: String,
    /// Key material.
    pub material: KeyMaterial,
}

impl JwtSigningKeyInfo {
    /// Creates a record, classifying `key_string` with [`KeyMaterial::classify`].
    #[must_use]
    pub fn new(
        key_id: impl Into<String>,
        created_at: i64,
        algorithm: impl Into<String>,
        key_string: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            created_at,
            algorithm: algorithm.into(),
            material: KeyMaterial::classify(key_string),
        }
    }

    /// Returns the stored key string.
    #[must_use]
    pub fn key_string(&self) -> &str {
        self.material.as_str()
    }
}
