//! End-to-end runs over a compiled circom 2 circuit: `c <== a * b` with
//! one public output. The fixtures are the snarkjs artifacts
//! (`multiplier.wasm`, a Groth16 `.zkey` and its verification key) for
//! `multiplier.circom`.

use std::sync::Arc;

use ark_bn254::Fr;
use num_bigint::BigInt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use zkid_zkp::groth16::{self, ProvingMaterial};
use zkid_zkp::witness::engine::signal_address;
use zkid_zkp::witness::wtns;
use zkid_zkp::{
    CircuitData, CircuitId, CircuitStorage, MemoryCircuitStorage, NativeProver, ProverError, Witness, WitnessEngine,
    WitnessError, ZkProver,
};

const WASM: &[u8] = include_bytes!("fixtures/multiplier/multiplier.wasm");
const ZKEY: &[u8] = include_bytes!("fixtures/multiplier/multiplier.zkey");
const VK: &[u8] = include_bytes!("fixtures/multiplier/verification_key.json");

fn expected_witness() -> Vec<Fr> {
    [1u64, 33, 3, 11].into_iter().map(Fr::from).collect()
}

fn prover() -> NativeProver {
    let storage = MemoryCircuitStorage::new();
    storage
        .save_circuit_data(&CircuitData::new(CircuitId::AuthV2, WASM.to_vec(), ZKEY.to_vec(), VK.to_vec()))
        .unwrap();
    NativeProver::new(Arc::new(storage))
}

#[test]
fn engine_reports_circuit_sizes() {
    let engine = WitnessEngine::new(WASM).unwrap();
    assert_eq!(engine.input_size(), 2);
    assert_eq!(engine.witness_size(), 4);
}

#[test]
fn signal_addresses_are_fnv1a_halves() {
    assert_eq!(signal_address("a"), (0xaf63_dc4c, 0x8601_ec8c));
}

#[test]
fn computes_the_witness_from_json_inputs() {
    let witness = WitnessEngine::calculate(WASM, br#"{"a": 3, "b": 11}"#).unwrap();
    assert_eq!(witness.values(), expected_witness().as_slice());
}

#[test]
fn computes_the_witness_signal_by_signal() {
    let mut engine = WitnessEngine::new(WASM).unwrap();
    engine.set_input("a", &json!("3")).unwrap();
    engine.set_signal("b", 0, &BigInt::from(11)).unwrap();
    let witness = engine.compute().unwrap();
    assert_eq!(witness.len(), 4);
    assert_eq!(witness.values(), expected_witness().as_slice());
}

#[test]
fn negative_inputs_reduce_into_the_field() {
    let witness = WitnessEngine::calculate(WASM, br#"{"a": -1, "b": 5}"#).unwrap();
    assert_eq!(witness.values()[1], -Fr::from(5u64));
    assert_eq!(witness.values()[2], -Fr::from(1u64));
}

#[test]
fn missing_inputs_block_compute() {
    let mut engine = WitnessEngine::new(WASM).unwrap();
    engine.set_inputs(br#"{"a": 3}"#).unwrap();
    assert_eq!(
        engine.compute().unwrap_err(),
        WitnessError::IncompleteInputs { expected: 2, set: 1 }
    );
}

#[test]
fn input_shape_is_checked_against_the_circuit() {
    let mut engine = WitnessEngine::new(WASM).unwrap();
    assert_eq!(
        engine.set_input("a", &json!([3, 4])).unwrap_err(),
        WitnessError::InputSize {
            name: "a".into(),
            expected: 1,
            got: 2,
        }
    );
    assert_eq!(
        engine.set_signal("b", 1, &BigInt::from(11)).unwrap_err(),
        WitnessError::InputSize {
            name: "b".into(),
            expected: 1,
            got: 2,
        }
    );
}

#[test]
fn unknown_signals_are_rejected() {
    let mut engine = WitnessEngine::new(WASM).unwrap();
    let err = engine.set_input("z", &json!(1)).unwrap_err();
    assert!(
        matches!(err, WitnessError::SignalNotFound(_) | WitnessError::Exception { code: 1, .. }),
        "{err:?}"
    );
}

#[test]
fn wtns_count_equals_witness_size() {
    let engine = WitnessEngine::new(WASM).unwrap();
    let size = engine.witness_size();
    let witness = WitnessEngine::calculate(WASM, br#"{"a": 3, "b": 11}"#).unwrap();
    let bytes = wtns::write(&witness);
    let count = u32::from_le_bytes([bytes[60], bytes[61], bytes[62], bytes[63]]) as usize;
    assert_eq!(count, size);
    assert_eq!(wtns::read(&bytes).unwrap().values(), witness.values());
}

#[test]
fn zkey_describes_the_circuit() {
    let material = ProvingMaterial::from_zkey(ZKEY).unwrap();
    assert_eq!(material.num_variables(), 4);
    assert_eq!(material.num_public(), 1);
}

#[test]
fn groth16_proof_verifies_against_the_snarkjs_key() {
    let material = ProvingMaterial::from_zkey(ZKEY).unwrap();
    let witness = Witness::from_values(expected_witness());
    let mut rng = StdRng::seed_from_u64(7);
    let proof = groth16::prove(&material, &witness, &mut rng).unwrap();
    assert_eq!(proof.pub_signals, vec!["33".to_string()]);

    let vk = groth16::parse_verifying_key(VK).unwrap();
    assert!(groth16::verify(&vk, &proof).unwrap());

    let mut tampered = proof.clone();
    tampered.pub_signals = vec!["34".to_string()];
    assert!(!groth16::verify(&vk, &tampered).unwrap());
}

#[test]
fn wrong_witness_length_is_a_prover_error() {
    let material = ProvingMaterial::from_zkey(ZKEY).unwrap();
    let short = Witness::from_values(expected_witness()[..3].to_vec());
    let mut rng = StdRng::seed_from_u64(7);
    assert!(matches!(
        groth16::prove(&material, &short, &mut rng),
        Err(ProverError::WitnessShape { expected: 4, got: 3 })
    ));
}

#[test]
fn key_without_the_constant_signal_is_a_prover_error() {
    let mut material = ProvingMaterial::from_zkey(ZKEY).unwrap();
    material.matrices.num_witness_variables += material.matrices.num_instance_variables;
    material.matrices.num_instance_variables = 0;
    let witness = Witness::from_values(expected_witness());
    let mut rng = StdRng::seed_from_u64(7);
    assert!(matches!(
        groth16::prove(&material, &witness, &mut rng),
        Err(ProverError::ProvingKey(_))
    ));
}

#[test]
fn native_prover_generates_and_verifies() {
    let prover = prover();
    let proof = prover.generate(br#"{"a": 3, "b": 11}"#, CircuitId::AuthV2).unwrap();
    assert_eq!(proof.pub_signals, vec!["33".to_string()]);
    assert_eq!(proof.proof.protocol, "groth16");
    assert!(prover.verify(&proof, CircuitId::AuthV2));

    let mut tampered = proof.clone();
    tampered.pub_signals[0] = "34".into();
    assert!(!prover.verify(&tampered, CircuitId::AuthV2));
    assert_eq!(prover.live_sessions(), 0);
}

#[test]
fn native_prover_surfaces_witness_failures() {
    let prover = prover();
    assert!(matches!(
        prover.generate(br#"{"a": 3}"#, CircuitId::AuthV2),
        Err(ProverError::Witness(WitnessError::IncompleteInputs { expected: 2, set: 1 }))
    ));
    assert_eq!(prover.live_sessions(), 0);
}
