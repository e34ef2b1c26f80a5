//! Errors from credential parsing, revocation resolution and circuit claim
//! assembly.

use thiserror::Error;
use zkid_core::CoreError;
use zkid_crypto::CryptoError;

use crate::circuit_claim::ProofType;

/// Errors from credential operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VcError {
    /// The credential lacks a field a circuit needs.
    #[error("credential is missing {0}")]
    MissingField(&'static str),

    /// The credential is malformed.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The signature proof's issuer data has no inclusion proof.
    #[error("issuer auth credential must have a mtp proof")]
    IssuerAuthMissingMtp,

    /// The signature proof's issuer data has no auth core claim.
    #[error("issuer auth credential must have a core claim proof")]
    IssuerAuthMissingCoreClaim,

    /// Neither an inclusion nor a signature proof is attached.
    #[error("claim has no MTP or signature proof")]
    NoProof,

    /// The requested proof type is not attached to the credential.
    #[error("credential has no {0} proof")]
    RequestedProofUnavailable(ProofType),

    /// The status collaborator could not resolve a revocation status.
    #[error("revocation status unavailable: {0}")]
    StatusResolution(String),

    /// Every candidate credential is revoked.
    #[error("all claims are revoked")]
    AllClaimsRevoked,

    /// Field or identifier conversion failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Signature decoding failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
