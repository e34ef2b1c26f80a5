//! # Groth16 over BN254
//!
//! Proving uses a circom `.zkey` (decoded by `ark-circom`) together with a
//! computed witness and the circom R1CS-to-QAP reduction. Proofs and
//! verification keys use the snarkjs JSON layout so proofs interoperate
//! with snarkjs and the iden3 verifier contracts.
//!
//! Points read from JSON are checked to be on the curve and in the prime
//! order subgroup before use.

use std::io::Cursor;

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_circom::{read_zkey, CircomReduction};
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{prepare_verifying_key, Groth16, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintMatrices;
use ark_std::rand::{CryptoRng, RngCore};
use ark_std::UniformRand;
use num_bigint::BigUint;
use serde::Deserialize;

use crate::traits::{ProofData, ProverError, VerifyError, ZkProof};
use crate::witness::Witness;

/// Decoded `.zkey`: proving key and constraint matrices.
pub struct ProvingMaterial {
    /// Groth16 proving key.
    pub key: ProvingKey<Bn254>,
    /// R1CS matrices of the circuit.
    pub matrices: ConstraintMatrices<Fr>,
}

impl ProvingMaterial {
    /// Decode a circom `.zkey`.
    pub fn from_zkey(zkey: &[u8]) -> Result<Self, ProverError> {
        let (key, matrices) =
            read_zkey(&mut Cursor::new(zkey)).map_err(|e| ProverError::ProvingKey(e.to_string()))?;
        Ok(Self { key, matrices })
    }

    /// Variables the witness must assign, including the constant 1.
    pub fn num_variables(&self) -> usize {
        self.matrices.num_instance_variables + self.matrices.num_witness_variables
    }

    /// Public signals of the circuit.
    pub fn num_public(&self) -> usize {
        self.matrices.num_instance_variables.saturating_sub(1)
    }
}

/// Prove with `material` over `witness`.
pub fn prove<R: RngCore + CryptoRng>(
    material: &ProvingMaterial,
    witness: &Witness,
    rng: &mut R,
) -> Result<ZkProof, ProverError> {
    let expected = material.num_variables();
    if witness.len() != expected {
        return Err(ProverError::WitnessShape {
            expected,
            got: witness.len(),
        });
    }
    let m = &material.matrices;
    let public = witness.values().get(1..m.num_instance_variables).ok_or_else(|| {
        ProverError::ProvingKey(format!(
            "{} instance variables do not include the constant signal",
            m.num_instance_variables
        ))
    })?;
    let r = Fr::rand(rng);
    let s = Fr::rand(rng);
    let proof = Groth16::<Bn254, CircomReduction>::create_proof_with_reduction_and_matrices(
        &material.key,
        r,
        s,
        m,
        m.num_instance_variables,
        m.num_constraints,
        witness.values(),
    )
    .map_err(|e| ProverError::Proving(e.to_string()))?;
    let pub_signals = public.iter().map(fr_to_decimal).collect();
    Ok(ZkProof {
        proof: proof_to_json(&proof),
        pub_signals,
    })
}

/// snarkjs verification key JSON.
#[derive(Debug, Clone, Deserialize)]
struct VerificationKeyJson {
    protocol: String,
    #[serde(rename = "nPublic")]
    n_public: Option<usize>,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

/// Parse a snarkjs verification key.
pub fn parse_verifying_key(json: &[u8]) -> Result<VerifyingKey<Bn254>, VerifyError> {
    let raw: VerificationKeyJson =
        serde_json::from_slice(json).map_err(|e| VerifyError::VerificationKey(e.to_string()))?;
    if raw.protocol != "groth16" {
        return Err(VerifyError::VerificationKey(format!("protocol {}", raw.protocol)));
    }
    if raw.ic.is_empty() {
        return Err(VerifyError::VerificationKey("empty IC".into()));
    }
    if let Some(n) = raw.n_public {
        if n + 1 != raw.ic.len() {
            return Err(VerifyError::VerificationKey(format!(
                "nPublic {n} does not match {} IC points",
                raw.ic.len()
            )));
        }
    }
    let key_err = VerifyError::VerificationKey;
    Ok(VerifyingKey {
        alpha_g1: g1(&raw.vk_alpha_1).map_err(key_err)?,
        beta_g2: g2(&raw.vk_beta_2).map_err(key_err)?,
        gamma_g2: g2(&raw.vk_gamma_2).map_err(key_err)?,
        delta_g2: g2(&raw.vk_delta_2).map_err(key_err)?,
        gamma_abc_g1: raw.ic.iter().map(|p| g1(p)).collect::<Result<_, _>>().map_err(key_err)?,
    })
}

/// Verify `proof` against `vk`.
pub fn verify(vk: &VerifyingKey<Bn254>, proof: &ZkProof) -> Result<bool, VerifyError> {
    if proof.proof.protocol != "groth16" {
        return Err(VerifyError::InvalidProof(format!("protocol {}", proof.proof.protocol)));
    }
    let decoded = proof_from_json(&proof.proof)?;
    let expected = vk.gamma_abc_g1.len().saturating_sub(1);
    if proof.pub_signals.len() != expected {
        return Err(VerifyError::PublicSignals(format!(
            "{} signals for a key with {expected} public inputs",
            proof.pub_signals.len()
        )));
    }
    let inputs = proof
        .pub_signals
        .iter()
        .map(|s| fr_from_decimal(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(VerifyError::PublicSignals)?;
    let pvk = prepare_verifying_key(vk);
    Groth16::<Bn254>::verify_proof(&pvk, &decoded, &inputs).map_err(|e| VerifyError::Pairing(e.to_string()))
}

/// snarkjs JSON of a proof.
pub fn proof_to_json(proof: &Proof<Bn254>) -> ProofData {
    ProofData {
        pi_a: g1_to_json(&proof.a),
        pi_b: g2_to_json(&proof.b),
        pi_c: g1_to_json(&proof.c),
        protocol: "groth16".into(),
        curve: "bn128".into(),
    }
}

/// Decode and check the points of a snarkjs proof.
pub fn proof_from_json(data: &ProofData) -> Result<Proof<Bn254>, VerifyError> {
    Ok(Proof {
        a: g1(&data.pi_a).map_err(VerifyError::InvalidProof)?,
        b: g2(&data.pi_b).map_err(VerifyError::InvalidProof)?,
        c: g1(&data.pi_c).map_err(VerifyError::InvalidProof)?,
    })
}

fn decimal<F: PrimeField>(text: &str) -> Result<F, String> {
    let value: BigUint = text.parse().map_err(|_| format!("{text:?} is not a decimal integer"))?;
    let modulus = BigUint::from_bytes_le(&F::MODULUS.to_bytes_le());
    if value >= modulus {
        return Err(format!("{text} is not in the field"));
    }
    Ok(F::from_le_bytes_mod_order(&value.to_bytes_le()))
}

fn to_decimal<F: PrimeField>(value: &F) -> String {
    BigUint::from_bytes_le(&value.into_bigint().to_bytes_le()).to_string()
}

fn fr_from_decimal(text: &str) -> Result<Fr, String> {
    decimal::<Fr>(text)
}

fn fr_to_decimal(value: &Fr) -> String {
    to_decimal(value)
}

fn coords<'a>(point: &'a [String], what: &str) -> Result<(&'a str, &'a str, &'a str), String> {
    match point {
        [x, y, z] => Ok((x.as_str(), y.as_str(), z.as_str())),
        [x, y] => Ok((x.as_str(), y.as_str(), "1")),
        _ => Err(format!("{what} point has {} coordinates", point.len())),
    }
}

fn g1(point: &[String]) -> Result<G1Affine, String> {
    let (x, y, z) = coords(point, "G1")?;
    match z {
        "0" => return Ok(G1Affine::identity()),
        "1" => {}
        _ => return Err("G1 point is not normalized".into()),
    }
    let p = G1Affine::new_unchecked(decimal::<Fq>(x)?, decimal::<Fq>(y)?);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G1 point is not on the curve".into());
    }
    Ok(p)
}

fn fq2(pair: &[String]) -> Result<Fq2, String> {
    match pair {
        [c0, c1] => Ok(Fq2::new(decimal::<Fq>(c0)?, decimal::<Fq>(c1)?)),
        _ => Err(format!("Fq2 element has {} components", pair.len())),
    }
}

fn g2(point: &[Vec<String>]) -> Result<G2Affine, String> {
    let (x, y, z) = match point {
        [x, y, z] => (x, y, Some(z)),
        [x, y] => (x, y, None),
        _ => return Err(format!("G2 point has {} coordinates", point.len())),
    };
    match z.map(|z| fq2(z)).transpose()? {
        Some(z) if z == Fq2::from(0u64) => return Ok(G2Affine::identity()),
        Some(z) if z != Fq2::from(1u64) => return Err("G2 point is not normalized".into()),
        _ => {}
    }
    let p = G2Affine::new_unchecked(fq2(x)?, fq2(y)?);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err("G2 point is not on the curve".into());
    }
    Ok(p)
}

fn g1_to_json(p: &G1Affine) -> Vec<String> {
    if p.infinity {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![to_decimal(&p.x), to_decimal(&p.y), "1".into()]
}

fn g2_to_json(p: &G2Affine) -> Vec<Vec<String>> {
    if p.infinity {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![
        vec![to_decimal(&p.x.c0), to_decimal(&p.x.c1)],
        vec![to_decimal(&p.y.c0), to_decimal(&p.y.c1)],
        vec!["1".into(), "0".into()],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generator_points_round_trip_through_json() {
        let g = G1Affine::generator();
        assert_eq!(g1(&g1_to_json(&g)).unwrap(), g);
        let h = G2Affine::generator();
        assert_eq!(g2(&g2_to_json(&h)).unwrap(), h);
        assert_eq!(g1_to_json(&g), strings(&["1", "2", "1"]));
    }

    #[test]
    fn off_curve_points_are_rejected() {
        assert!(g1(&strings(&["1", "3", "1"])).is_err());
        assert!(g1(&strings(&["1", "2", "5"])).is_err());
        assert!(g1(&strings(&["1"])).is_err());
    }

    #[test]
    fn identity_encoding() {
        assert!(g1(&strings(&["0", "1", "0"])).unwrap().infinity);
    }

    #[test]
    fn field_parsing_rejects_out_of_range() {
        let p = "21888242871839275222246405745257275088548364400416034343698204186575808495617";
        assert!(fr_from_decimal(p).is_err());
        assert!(fr_from_decimal("-1").is_err());
        assert_eq!(fr_from_decimal("42").unwrap(), Fr::from(42u64));
        assert_eq!(fr_to_decimal(&Fr::from(42u64)), "42");
    }

    fn vk_json(ic: usize) -> serde_json::Value {
        let g = g1_to_json(&G1Affine::generator());
        let h = g2_to_json(&G2Affine::generator());
        serde_json::json!({
            "protocol": "groth16",
            "curve": "bn128",
            "nPublic": ic - 1,
            "vk_alpha_1": g,
            "vk_beta_2": h,
            "vk_gamma_2": h,
            "vk_delta_2": h,
            "IC": vec![g.clone(); ic],
        })
    }

    #[test]
    fn verification_key_parses() {
        let vk = parse_verifying_key(&serde_json::to_vec(&vk_json(4)).unwrap()).unwrap();
        assert_eq!(vk.gamma_abc_g1.len(), 4);
    }

    #[test]
    fn verification_key_counts_must_agree() {
        let mut json = vk_json(4);
        json["nPublic"] = serde_json::json!(5);
        assert!(parse_verifying_key(&serde_json::to_vec(&json).unwrap()).is_err());
        json["protocol"] = serde_json::json!("plonk");
        assert!(parse_verifying_key(&serde_json::to_vec(&json).unwrap()).is_err());
    }

    #[test]
    fn signal_count_must_match_the_key() {
        let vk = parse_verifying_key(&serde_json::to_vec(&vk_json(3)).unwrap()).unwrap();
        let proof = ZkProof {
            proof: ProofData {
                pi_a: g1_to_json(&G1Affine::generator()),
                pi_b: g2_to_json(&G2Affine::generator()),
                pi_c: g1_to_json(&G1Affine::generator()),
                protocol: "groth16".into(),
                curve: "bn128".into(),
            },
            pub_signals: strings(&["1"]),
        };
        assert!(matches!(verify(&vk, &proof), Err(VerifyError::PublicSignals(_))));
        let two = ZkProof {
            pub_signals: strings(&["1", "2"]),
            ..proof
        };
        assert!(!verify(&vk, &two).unwrap());
    }
}
