//! # Native Prover
//!
//! [`NativeProver`] implements [`ZkProver`] in process: circuit artifacts
//! come from a [`CircuitStorage`], the witness from a fresh
//! [`WitnessEngine`] per call, and the proof from the arkworks Groth16
//! backend.
//!
//! ## Pipeline
//!
//! `generate`: load artifacts → compute witness → encode `.wtns` →
//! decode the proving key into a [`CurveSession`] → prove. `verify`: load
//! the verification key → decode it into a session → pairing check. Each
//! session is dropped before the call returns, including on failure.

use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::circuits::CircuitId;
use crate::groth16::{self, ProvingMaterial};
use crate::session::SessionTracker;
use crate::storage::CircuitStorage;
use crate::traits::{ProverError, VerifyError, ZkProof, ZkProver};
use crate::witness::{wtns, WitnessEngine};

/// Short SHA-256 fingerprint of an artifact for logs.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

/// In-process Groth16 prover.
pub struct NativeProver {
    storage: Arc<dyn CircuitStorage>,
    sessions: SessionTracker,
}

impl NativeProver {
    /// Prover over `storage`.
    pub fn new(storage: Arc<dyn CircuitStorage>) -> Self {
        Self {
            storage,
            sessions: SessionTracker::new(),
        }
    }

    /// Curve sessions currently held. Zero whenever no call is in flight.
    pub fn live_sessions(&self) -> usize {
        self.sessions.live_sessions()
    }

    /// Tracker shared by this prover's sessions.
    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }
}

impl ZkProver for NativeProver {
    fn prover_name(&self) -> &str {
        "native-groth16"
    }

    fn generate(&self, inputs: &[u8], circuit: CircuitId) -> Result<ZkProof, ProverError> {
        let started = Instant::now();
        let data = self.storage.load_circuit_data(circuit)?;
        let wasm = data.wasm()?;
        let zkey = data.proving_key()?;
        debug!(
            circuit = %circuit,
            storage = self.storage.storage_name(),
            wasm = %fingerprint(wasm),
            zkey = %fingerprint(zkey),
            "circuit artifacts loaded"
        );

        let witness = WitnessEngine::calculate(wasm, inputs)?;
        let witness_ms = started.elapsed().as_millis() as u64;
        let wtns_bytes = wtns::write(&witness);
        debug!(circuit = %circuit, witness_size = witness.len(), wtns_len = wtns_bytes.len(), witness_ms, "witness computed");

        let material = self.sessions.acquire(circuit, ProvingMaterial::from_zkey(zkey)?);
        let witness = wtns::read(&wtns_bytes)?;
        let proof = groth16::prove(&material, &witness, &mut rand::rngs::OsRng)?;
        info!(
            circuit = %circuit,
            public_signals = material.num_public(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "proof generated"
        );
        Ok(proof)
    }

    fn try_verify(&self, proof: &ZkProof, circuit: CircuitId) -> Result<bool, VerifyError> {
        let vk_json = self.storage.load_verification_key(circuit)?;
        let vk = self.sessions.acquire(circuit, groth16::parse_verifying_key(&vk_json)?);
        let valid = groth16::verify(&vk, proof)?;
        debug!(circuit = %circuit, vk = %fingerprint(&vk_json), valid, "proof verified");
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CircuitData, MemoryCircuitStorage};
    use crate::traits::ProofData;

    fn prover_with(data: Option<CircuitData>) -> NativeProver {
        let storage = MemoryCircuitStorage::new();
        if let Some(data) = data {
            storage.save_circuit_data(&data).unwrap();
        }
        NativeProver::new(Arc::new(storage))
    }

    fn proof() -> ZkProof {
        ZkProof {
            proof: ProofData {
                pi_a: vec!["1".into(), "2".into(), "1".into()],
                pi_b: vec![vec!["0".into(), "0".into()], vec!["1".into(), "0".into()], vec!["0".into(), "0".into()]],
                pi_c: vec!["1".into(), "2".into(), "1".into()],
                protocol: "groth16".into(),
                curve: "bn128".into(),
            },
            pub_signals: vec![],
        }
    }

    #[test]
    fn missing_artifacts_fail_generate() {
        let prover = prover_with(None);
        assert!(matches!(
            prover.generate(b"{}", CircuitId::AuthV2),
            Err(ProverError::Storage(_))
        ));
        let no_zkey = CircuitData {
            proving_key: None,
            ..CircuitData::new(CircuitId::AuthV2, vec![], vec![], vec![])
        };
        let prover = prover_with(Some(no_zkey));
        let err = prover.generate(b"{}", CircuitId::AuthV2).unwrap_err();
        assert!(err.to_string().contains("proving key"));
        assert_eq!(prover.live_sessions(), 0);
    }

    #[test]
    fn broken_wasm_is_a_witness_error() {
        let prover = prover_with(Some(CircuitData::new(CircuitId::AuthV2, b"junk".to_vec(), vec![], vec![])));
        assert!(matches!(
            prover.generate(b"{}", CircuitId::AuthV2),
            Err(ProverError::Witness(_))
        ));
    }

    #[test]
    fn verify_without_artifacts_is_false() {
        let prover = prover_with(None);
        assert!(!prover.verify(&proof(), CircuitId::AtomicQueryV3));
        assert_eq!(prover.live_sessions(), 0);
    }

    #[test]
    fn verify_with_corrupt_key_is_false_and_releases() {
        let prover = prover_with(Some(CircuitData::new(
            CircuitId::AuthV2,
            vec![],
            vec![],
            br#"{"protocol":"groth16"}"#.to_vec(),
        )));
        assert!(!prover.verify(&proof(), CircuitId::AuthV2));
        assert!(prover.try_verify(&proof(), CircuitId::AuthV2).is_err());
        assert_eq!(prover.live_sessions(), 0);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint(b""), "e3b0c44298fc1c14");
    }
}
