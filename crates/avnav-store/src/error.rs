//! Store errors.
//!
//! All failures are local to the call that raised them. A failed leaf write
//! never affects other keys.

use thiserror::Error;

/// Errors returned by registry, write and query operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Key fails the character or segment check.
    #[error("key {key} does not match pattern {pattern}")]
    InvalidKey { key: String, pattern: &'static str },

    /// Key overlaps an already registered descriptor.
    #[error("key {key} conflicts with {existing} registered by {owner}")]
    KeyConflict {
        key: String,
        existing: String,
        owner: String,
    },

    /// Write to a key nobody registered.
    #[error("key {0} is not registered in store")]
    KeyNotAllowed(String),

    /// A scalar and a nested structure share the same path.
    #[error("inconsistent data, found value and nested entries below {0}")]
    InconsistentData(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
