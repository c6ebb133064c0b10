//! Typed queries layered on the connection manager's bucket handle.
//!
//! Query-level errors are never retried here; they propagate to the caller.

pub mod jwt_signing;

pub use jwt_signing::{
    SetKeyOutcome, get_jwt_signing_keys, set_jwt_signing_key_if_absent,
    set_jwt_signing_key_info_if_no_key_for_algorithm_exists,
};
