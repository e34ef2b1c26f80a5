//! # Prover Trait
//!
//! [`ZkProver`] is the proving interface consumed by protocol handlers:
//! `generate` turns marshaled circuit inputs into a Groth16 proof with its
//! public signals, `verify` checks one.
//!
//! ## Verification is a predicate
//!
//! `verify` never fails. Implementations provide `try_verify`; the
//! provided `verify` logs any error at `warn` and returns `false`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::circuits::CircuitId;
use crate::storage::StorageError;
use crate::witness::WitnessError;

/// Groth16 proof in snarkjs JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofData {
    /// G1 point `[x, y, "1"]`.
    pub pi_a: Vec<String>,
    /// G2 point `[[x0, x1], [y0, y1], ["1", "0"]]`.
    pub pi_b: Vec<Vec<String>>,
    /// G1 point `[x, y, "1"]`.
    pub pi_c: Vec<String>,
    /// Always `groth16`.
    pub protocol: String,
    /// Always `bn128`.
    #[serde(default = "default_curve")]
    pub curve: String,
}

fn default_curve() -> String {
    "bn128".into()
}

/// A proof together with its public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    /// The proof.
    pub proof: ProofData,
    /// Public signals as decimal strings, in circuit order.
    pub pub_signals: Vec<String>,
}

/// Error during proof generation.
#[derive(Error, Debug)]
pub enum ProverError {
    /// Loading circuit artifacts failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Witness computation failed.
    #[error(transparent)]
    Witness(#[from] WitnessError),

    /// The proving key could not be decoded.
    #[error("invalid proving key: {0}")]
    ProvingKey(String),

    /// The witness does not fit the proving key's constraint system.
    #[error("witness has {got} signals, the proving key expects {expected}")]
    WitnessShape {
        /// Variables of the constraint system.
        expected: usize,
        /// Signals in the witness.
        got: usize,
    },

    /// The Groth16 prover failed.
    #[error("groth16 proving failed: {0}")]
    Proving(String),
}

/// Error during proof verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Loading the verification key failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The verification key is malformed.
    #[error("invalid verification key: {0}")]
    VerificationKey(String),

    /// The proof is malformed.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The public signals do not fit the verification key.
    #[error("invalid public signals: {0}")]
    PublicSignals(String),

    /// The pairing check could not be evaluated.
    #[error("verification failed: {0}")]
    Pairing(String),
}

/// Groth16 proving over stored circuit artifacts.
pub trait ZkProver: Send + Sync {
    /// Name of the prover for logs.
    fn prover_name(&self) -> &str;

    /// Prove `circuit` over marshaled `inputs`.
    fn generate(&self, inputs: &[u8], circuit: CircuitId) -> Result<ZkProof, ProverError>;

    /// Verify `proof` for `circuit`, surfacing errors.
    fn try_verify(&self, proof: &ZkProof, circuit: CircuitId) -> Result<bool, VerifyError>;

    /// Verify `proof` for `circuit`. Any error yields `false`.
    fn verify(&self, proof: &ZkProof, circuit: CircuitId) -> bool {
        match self.try_verify(proof, circuit) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(prover = self.prover_name(), circuit = %circuit, error = %e, "proof verification errored");
                false
            }
        }
    }
}
