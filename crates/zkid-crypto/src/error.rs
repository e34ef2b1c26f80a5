//! Error types for cryptographic operations.

use thiserror::Error;
use zkid_core::CoreError;

/// Error in cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Coordinates are not a point of the prime-order subgroup.
    #[error("invalid curve point: {0}")]
    InvalidPoint(String),

    /// Signature bytes are malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Secret scalar is zero or out of range.
    #[error("invalid secret scalar: {0}")]
    InvalidScalar(String),

    /// Hashing or field conversion failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}
