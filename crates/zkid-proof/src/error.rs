//! # Error Types
//!
//! [`GenerationError`] follows the failure taxonomy of proof generation:
//! request validation, resolution of credentials and identities, circuit
//! claim assembly, circuit marshaling, and collaborator failures. Every
//! variant is fatal for the attempt; nothing here is retried.

use thiserror::Error;
use zkid_core::CoreError;
use zkid_vc::VcError;
use zkid_zkp::{CircuitError, ProverError};

use crate::ports::PortError;

/// Error while generating circuit inputs or a proof.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The request was rejected before any cryptographic work.
    #[error("invalid proof request: {0}")]
    Validation(String),

    /// A credential or identity could not be resolved.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// The circuit claim could not be assembled from the credential.
    #[error("credential: {0}")]
    Claim(VcError),

    /// Circuit inputs failed to validate or marshal.
    #[error("circuit inputs: {0}")]
    Circuit(#[from] CircuitError),

    /// A collaborator port failed.
    #[error("{port} failed: {source}")]
    Collaborator {
        /// Port name as reported by the implementation.
        port: String,
        /// Underlying error.
        #[source]
        source: PortError,
    },

    /// The prover failed.
    #[error(transparent)]
    Prover(#[from] ProverError),
}

impl GenerationError {
    /// Validation failure from any displayable cause.
    pub fn validation(cause: impl std::fmt::Display) -> Self {
        Self::Validation(cause.to_string())
    }

    /// Collaborator failure tagged with the port's name.
    pub fn collaborator(port: &str, source: PortError) -> Self {
        Self::Collaborator {
            port: port.to_string(),
            source,
        }
    }

    /// Whether the error was raised before any cryptographic work.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<VcError> for GenerationError {
    fn from(err: VcError) -> Self {
        match err {
            VcError::AllClaimsRevoked | VcError::StatusResolution(_) => Self::Resolution(err.to_string()),
            VcError::RequestedProofUnavailable(_) => Self::Validation(err.to_string()),
            other => Self::Claim(other),
        }
    }
}

impl From<CoreError> for GenerationError {
    fn from(err: CoreError) -> Self {
        Self::Circuit(CircuitError::Core(err))
    }
}
