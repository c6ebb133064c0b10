//! Authentication records shared between the core and storage adapters.
//!
//! Signing keys are the only record with non-trivial storage semantics: a
//! node that needs a key for an algorithm inserts one only if no other node
//! has done so already, then compares what ended up stored against what it
//! tried to write.
//!
//! # Examples
//!
//! ```
//! use authstore_storage::auth::{JwtSigningKeyInfo, KeyMaterial};
//!
//! let key = JwtSigningKeyInfo::new("d-1700000000", 1_700_000_000_000, "RS256", "pub|priv");
//! assert!(matches!(key.material, KeyMaterial::Asymmetric(_)));
//! ```

mod signing_key;

pub use signing_key::{ASYMMETRIC_KEY_SEPARATORS, JwtSigningKeyInfo, KeyMaterial};
