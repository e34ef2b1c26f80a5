//! # Error Types
//!
//! Errors raised while constructing or validating core values. All errors
//! use `thiserror` and carry enough context to locate the offending input.

use thiserror::Error;

/// Top-level error type for `zkid-core`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A number parsed from text or bytes is not below the BN254 modulus.
    #[error("value is not a valid field element: {0}")]
    NotInField(String),

    /// Text that should hold a decimal integer does not.
    #[error("invalid decimal integer: {0:?}")]
    InvalidDecimal(String),

    /// Hex decoding failed or produced the wrong length.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    /// Identifier bytes are malformed or carry a bad checksum.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// DID string is malformed.
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    /// Core claim bytes or slot data are malformed.
    #[error("invalid claim: {0}")]
    InvalidClaim(String),

    /// Merkle proof is internally inconsistent.
    #[error("invalid merkle proof: {0}")]
    InvalidProof(String),

    /// Tree state roots do not hash to the declared state.
    #[error("tree state mismatch: declared {declared}, computed {computed}")]
    StateMismatch {
        /// State carried by the value.
        declared: String,
        /// Poseidon of the three roots.
        computed: String,
    },

    /// Poseidon hasher rejected the input arity.
    #[error("poseidon error: {0}")]
    Poseidon(String),

    /// Sparse Merkle tree operation failed.
    #[error("merkle tree error: {0}")]
    Tree(#[from] TreeError),
}

/// Error in sparse Merkle tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The key path collides with another leaf deeper than the tree allows.
    #[error("reached maximum tree level {0}")]
    MaxLevelReached(usize),

    /// The key is already present.
    #[error("entry with key {0} already exists")]
    EntryExists(String),

    /// A node referenced by the tree is missing from storage.
    #[error("node {0} not found")]
    NodeNotFound(String),

    /// A non-existence proof cannot reference the queried key itself.
    #[error("non-existence proof aux node has the queried key")]
    AuxKeyMatches,
}
