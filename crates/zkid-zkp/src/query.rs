//! # Query Hashing
//!
//! A verifier's query (claim schema, slot or claim path, operator, values)
//! is committed in-circuit as a single `circuitQueryHash` public signal.
//! Off-circuit code computes the same hash to check that a proof answers
//! the query that was asked.
//!
//! ## Hash shapes
//!
//! Both shapes start from the value commitment
//! `valueHash = SpongePoseidon(pad64(values), frame 6)`.
//!
//! - V2: `Poseidon(schema, slotIndex, operator, claimPathKey, claimPathNotExists, valueHash)`.
//! - V3: `first = Poseidon(schema, slotIndex, operator, claimPathKey, merklized, valueHash)`,
//!   then `Poseidon(first, valueArraySize, isRevocationChecked, verifierID, nullifierSessionID, 0)`.
//!
//! The two schemes are separate functions and are never interchangeable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zkid_core::{poseidon, Hash, Proof, SchemaHash};

use crate::error::CircuitError;

/// Size of every query value array.
pub const VALUE_ARRAY_SIZE: usize = 64;

/// Sponge frame used for the value commitment.
pub const VALUE_SPONGE_FRAME: usize = 6;

/// Query comparison operator with its circuit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Operator {
    /// Always true.
    Noop = 0,
    /// Equal.
    Eq = 1,
    /// Less than.
    Lt = 2,
    /// Greater than.
    Gt = 3,
    /// Member of the value set.
    In = 4,
    /// Not a member of the value set.
    Nin = 5,
    /// Not equal.
    Ne = 6,
    /// Less than or equal.
    Lte = 7,
    /// Greater than or equal.
    Gte = 8,
    /// Inside `[values[0], values[1]]`.
    Between = 9,
    /// Outside `[values[0], values[1]]`.
    NonBetween = 10,
    /// Field presence equals `values[0]`.
    Exists = 11,
    /// Selective disclosure.
    Sd = 16,
    /// Nullifier output.
    Nullify = 17,
}

impl Operator {
    /// Every operator, by code.
    pub const ALL: [Operator; 14] = [
        Operator::Noop,
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::In,
        Operator::Nin,
        Operator::Ne,
        Operator::Lte,
        Operator::Gte,
        Operator::Between,
        Operator::NonBetween,
        Operator::Exists,
        Operator::Sd,
        Operator::Nullify,
    ];

    /// Circuit code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Operator for a circuit code.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Query-language key, e.g. `$eq`.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Noop => "$noop",
            Operator::Eq => "$eq",
            Operator::Lt => "$lt",
            Operator::Gt => "$gt",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Ne => "$ne",
            Operator::Lte => "$lte",
            Operator::Gte => "$gte",
            Operator::Between => "$between",
            Operator::NonBetween => "$nonbetween",
            Operator::Exists => "$exists",
            Operator::Sd => "$sd",
            Operator::Nullify => "$nullify",
        }
    }

    /// Whether the circuit compares nothing for this operator, so values
    /// are cleared.
    pub fn discloses_or_skips(self) -> bool {
        matches!(self, Operator::Sd | Operator::Noop)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CircuitError::InvalidInput(format!("unknown query operator {s:?}")))
    }
}

impl Serialize for Operator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Proof of a merklized credential field: the claim path key, its value,
/// and the proof against the credential's merklized root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueProof {
    /// Claim path key.
    pub path: Hash,
    /// Field value; zero when the path is absent.
    pub value: Hash,
    /// Inclusion or non-inclusion proof of the path.
    pub mtp: Proof,
}

/// One circuit query.
///
/// `values` holds the actual operands; marshaling zero-pads them to
/// [`VALUE_ARRAY_SIZE`] and rejects longer lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Claim slot for non-merklized fields; 0 for merklized ones.
    pub slot_index: u64,
    /// Operands.
    pub values: Vec<Hash>,
    /// Operator.
    pub operator: Operator,
    /// Claim path proof for merklized fields.
    pub value_proof: Option<ValueProof>,
}

impl Query {
    /// Query over a non-merklized slot.
    pub fn slot(slot_index: u64, operator: Operator, values: Vec<Hash>) -> Self {
        Self {
            slot_index,
            values,
            operator,
            value_proof: None,
        }
    }

    /// Query over a merklized claim path.
    pub fn merklized(operator: Operator, values: Vec<Hash>, value_proof: ValueProof) -> Self {
        Self {
            slot_index: 0,
            values,
            operator,
            value_proof: Some(value_proof),
        }
    }

    /// Whether the query targets a merklized path.
    pub fn is_merklized(&self) -> bool {
        self.value_proof.is_some()
    }

    /// Claim path key, or zero for slot queries.
    pub fn claim_path_key(&self) -> Hash {
        self.value_proof.as_ref().map_or(Hash::ZERO, |vp| vp.path)
    }

    /// 1 when a merklized path is proven absent.
    pub fn claim_path_not_exists(&self) -> u64 {
        match &self.value_proof {
            Some(vp) if !vp.mtp.existence() => 1,
            _ => 0,
        }
    }

    /// Values as the padded circuit array.
    pub fn padded_values(&self) -> Result<Vec<Hash>, CircuitError> {
        pad_values(&self.values, VALUE_ARRAY_SIZE)
    }

    /// V2 query hash for this query.
    pub fn hash_v2(&self, schema: &SchemaHash) -> Result<Hash, CircuitError> {
        query_hash_v2(
            &self.values,
            schema.to_hash(),
            self.slot_index,
            self.operator,
            self.claim_path_key(),
            self.claim_path_not_exists(),
        )
    }

    /// V3 query hash for this query.
    pub fn hash_v3(
        &self,
        schema: &SchemaHash,
        merklized: bool,
        is_revocation_checked: bool,
        verifier_id: Hash,
        nullifier_session_id: Hash,
    ) -> Result<Hash, CircuitError> {
        query_hash_v3(
            &self.values,
            schema.to_hash(),
            self.slot_index,
            self.operator,
            self.claim_path_key(),
            self.values.len(),
            u64::from(merklized),
            u64::from(is_revocation_checked),
            verifier_id,
            nullifier_session_id,
        )
    }
}

/// Zero-pad `values` to `size`, failing when they do not fit.
pub fn pad_values(values: &[Hash], size: usize) -> Result<Vec<Hash>, CircuitError> {
    if values.len() > size {
        return Err(CircuitError::TooManyValues {
            got: values.len(),
            max: size,
        });
    }
    let mut out = values.to_vec();
    out.resize(size, Hash::ZERO);
    Ok(out)
}

/// Sponge commitment of the padded value array.
pub fn value_hash(values: &[Hash]) -> Result<Hash, CircuitError> {
    let padded = pad_values(values, VALUE_ARRAY_SIZE)?;
    Ok(poseidon::sponge_hash(&padded, VALUE_SPONGE_FRAME)?)
}

/// V2 query hash.
pub fn query_hash_v2(
    values: &[Hash],
    schema: Hash,
    slot_index: u64,
    operator: Operator,
    claim_path_key: Hash,
    claim_path_not_exists: u64,
) -> Result<Hash, CircuitError> {
    let values_hash = value_hash(values)?;
    Ok(poseidon::hash(&[
        schema,
        Hash::from_u64(slot_index),
        Hash::from_u64(operator.code()),
        claim_path_key,
        Hash::from_u64(claim_path_not_exists),
        values_hash,
    ])?)
}

/// V3 query hash.
#[allow(clippy::too_many_arguments)]
pub fn query_hash_v3(
    values: &[Hash],
    schema: Hash,
    slot_index: u64,
    operator: Operator,
    claim_path_key: Hash,
    value_array_size: usize,
    merklized: u64,
    is_revocation_checked: u64,
    verifier_id: Hash,
    nullifier_session_id: Hash,
) -> Result<Hash, CircuitError> {
    let first = query_hash_first_stage(values, schema, slot_index, operator, claim_path_key, merklized)?;
    Ok(poseidon::hash(&[
        first,
        Hash::from_u64(value_array_size as u64),
        Hash::from_u64(is_revocation_checked),
        verifier_id,
        nullifier_session_id,
        Hash::ZERO,
    ])?)
}

/// Linked multi-query hash of one query: the V3 first stage bound to the
/// value array size.
pub fn query_hash_linked(
    values: &[Hash],
    schema: Hash,
    slot_index: u64,
    operator: Operator,
    claim_path_key: Hash,
    merklized: u64,
) -> Result<Hash, CircuitError> {
    let first = query_hash_first_stage(values, schema, slot_index, operator, claim_path_key, merklized)?;
    Ok(poseidon::hash(&[first, Hash::from_u64(values.len() as u64)])?)
}

fn query_hash_first_stage(
    values: &[Hash],
    schema: Hash,
    slot_index: u64,
    operator: Operator,
    claim_path_key: Hash,
    merklized: u64,
) -> Result<Hash, CircuitError> {
    let values_hash = value_hash(values)?;
    Ok(poseidon::hash(&[
        schema,
        Hash::from_u64(slot_index),
        Hash::from_u64(operator.code()),
        claim_path_key,
        Hash::from_u64(merklized),
        values_hash,
    ])?)
}

/// Check that a proof's `circuitQueryHash` commits to `expected`.
pub fn verify_circuit_query_hash(signal: &Hash, expected: &Hash) -> Result<(), CircuitError> {
    if signal != expected {
        return Err(CircuitError::InvalidPubSignals(format!(
            "circuitQueryHash {signal} does not match the requested query {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schema() -> SchemaHash {
        SchemaHash::from_hex("2e2d1c11ad3e500de68d7ce16a0a559e").unwrap()
    }

    #[test]
    fn operator_codes_match_circuits() {
        assert_eq!(Operator::Noop.code(), 0);
        assert_eq!(Operator::Exists.code(), 11);
        assert_eq!(Operator::Sd.code(), 16);
        assert_eq!(Operator::Nullify.code(), 17);
        assert_eq!(Operator::from_code(9), Some(Operator::Between));
        assert_eq!(Operator::from_code(12), None);
        assert_eq!("$nonbetween".parse::<Operator>().unwrap(), Operator::NonBetween);
        assert!("$like".parse::<Operator>().is_err());
    }

    #[test]
    fn padding_never_truncates() {
        let too_many: Vec<Hash> = (0..65).map(Hash::from_u64).collect();
        assert_eq!(
            pad_values(&too_many, VALUE_ARRAY_SIZE).unwrap_err(),
            CircuitError::TooManyValues { got: 65, max: 64 }
        );
        let exact: Vec<Hash> = (0..64).map(Hash::from_u64).collect();
        assert_eq!(pad_values(&exact, VALUE_ARRAY_SIZE).unwrap(), exact);
    }

    #[test]
    fn too_many_values_fail_hashing() {
        let values: Vec<Hash> = (0..65).map(Hash::from_u64).collect();
        let err = query_hash_v2(&values, schema().to_hash(), 2, Operator::In, Hash::ZERO, 0).unwrap_err();
        assert!(matches!(err, CircuitError::TooManyValues { .. }));
    }

    #[test]
    fn v2_hash_is_six_input_poseidon() {
        let values = [Hash::from_u64(840)];
        let vh = poseidon::sponge_hash(&pad_values(&values, 64).unwrap(), 6).unwrap();
        let expected = poseidon::hash(&[
            schema().to_hash(),
            Hash::from_u64(2),
            Hash::from_u64(1),
            Hash::ZERO,
            Hash::ZERO,
            vh,
        ])
        .unwrap();
        let query = Query::slot(2, Operator::Eq, values.to_vec());
        assert_eq!(query.hash_v2(&schema()).unwrap(), expected);
    }

    #[test]
    fn v3_hash_binds_verifier_and_session() {
        let query = Query::slot(2, Operator::Eq, vec![Hash::from_u64(840)]);
        let a = query.hash_v3(&schema(), false, true, Hash::from_u64(7), Hash::from_u64(8)).unwrap();
        let b = query.hash_v3(&schema(), false, true, Hash::from_u64(7), Hash::from_u64(9)).unwrap();
        let c = query.hash_v3(&schema(), false, false, Hash::from_u64(7), Hash::from_u64(8)).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn v2_and_v3_differ_for_the_same_query() {
        let query = Query::slot(2, Operator::Eq, vec![Hash::from_u64(840)]);
        let v2 = query.hash_v2(&schema()).unwrap();
        let v3 = query.hash_v3(&schema(), false, false, Hash::ZERO, Hash::ZERO).unwrap();
        assert_ne!(v2, v3);
    }

    #[test]
    fn query_hash_check_rejects_mismatch() {
        let h = Hash::from_u64(5);
        assert!(verify_circuit_query_hash(&h, &h).is_ok());
        assert!(verify_circuit_query_hash(&h, &Hash::from_u64(6)).is_err());
    }

    #[test]
    fn operator_serde_uses_query_keys() {
        assert_eq!(serde_json::to_string(&Operator::Lte).unwrap(), "\"$lte\"");
        let op: Operator = serde_json::from_str("\"$in\"").unwrap();
        assert_eq!(op, Operator::In);
    }

    proptest! {
        #[test]
        fn trailing_zero_values_do_not_change_value_hash(
            raw in proptest::collection::vec(1u64..u64::MAX, 0..32),
            zeros in 0usize..32,
        ) {
            let values: Vec<Hash> = raw.iter().copied().map(Hash::from_u64).collect();
            let mut padded = values.clone();
            padded.extend(std::iter::repeat(Hash::ZERO).take(zeros));
            prop_assert_eq!(value_hash(&values).unwrap(), value_hash(&padded).unwrap());
        }

        #[test]
        fn v2_hash_is_deterministic(slot in 0u64..8, code in 0usize..14, v in any::<u64>()) {
            let op = Operator::ALL[code];
            let q = Query::slot(slot, op, vec![Hash::from_u64(v)]);
            prop_assert_eq!(q.hash_v2(&schema()).unwrap(), q.hash_v2(&schema()).unwrap());
        }

        #[test]
        fn any_single_v2_argument_moves_the_hash(
            which in 0usize..6,
            v in 1u64..1_000_000,
            slot in 0u64..8,
            bump in 1u64..1_000,
        ) {
            let s = schema().to_hash();
            let values = vec![Hash::from_u64(v)];
            let base = query_hash_v2(&values, s, slot, Operator::Eq, Hash::ZERO, 0).unwrap();
            let changed = match which {
                0 => query_hash_v2(&values, Hash::from_u64(bump), slot, Operator::Eq, Hash::ZERO, 0),
                1 => query_hash_v2(&values, s, slot + bump, Operator::Eq, Hash::ZERO, 0),
                2 => query_hash_v2(&values, s, slot, Operator::Lt, Hash::ZERO, 0),
                3 => query_hash_v2(&values, s, slot, Operator::Eq, Hash::from_u64(bump), 0),
                4 => query_hash_v2(&[Hash::from_u64(v + bump)], s, slot, Operator::Eq, Hash::ZERO, 0),
                _ => query_hash_v2(&values, s, slot, Operator::Eq, Hash::ZERO, 1),
            }
            .unwrap();
            prop_assert_ne!(base, changed);
        }

        #[test]
        fn merklized_flag_moves_the_v3_hash(v in 1u64..1_000_000, slot in 0u64..8) {
            let s = schema().to_hash();
            let values = [Hash::from_u64(v)];
            let hash = |merklized| {
                query_hash_v3(&values, s, slot, Operator::Eq, Hash::ZERO, 1, merklized, 1, Hash::ZERO, Hash::ZERO)
                    .unwrap()
            };
            prop_assert_ne!(hash(0), hash(1));
        }
    }
}
