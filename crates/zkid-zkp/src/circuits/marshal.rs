//! Shared encoding of circuit signals: decimal strings, padded sibling
//! arrays, non-membership aux fields, and positional public signal reads.

use zkid_core::{Claim, Hash, Id, Proof};
use zkid_crypto::Signature;

use crate::error::CircuitError;

/// Decimal string of a field element.
pub fn dec(value: &Hash) -> String {
    value.to_decimal()
}

/// Decimal string of an integer signal.
pub fn dec_u64(value: u64) -> String {
    value.to_string()
}

/// `"1"` or `"0"`.
pub fn flag(value: bool) -> String {
    dec_u64(u64::from(value))
}

/// Decimal strings of `values`.
pub fn decs(values: &[Hash]) -> Vec<String> {
    values.iter().map(dec).collect()
}

/// Id as its field element value.
pub fn id_dec(id: &Id) -> String {
    dec(&id.to_hash())
}

/// The 8 claim slots.
pub fn claim_slots(claim: &Claim) -> Result<Vec<String>, CircuitError> {
    Ok(decs(&claim.slots()?))
}

/// The 8 slots of an all-zero claim.
pub fn zero_claim() -> Vec<String> {
    zeros(8)
}

/// `n` zero signals.
pub fn zeros(n: usize) -> Vec<String> {
    vec!["0".to_string(); n]
}

/// Expanded siblings of `proof`, zero-padded to `levels`. Longer proofs
/// are kept whole; the witness calculator rejects them by signal size.
pub fn siblings(proof: &Proof, levels: usize) -> Vec<String> {
    let mut out = decs(&proof.all_siblings());
    if out.len() < levels {
        out.resize(levels, "0".to_string());
    }
    out
}

/// Non-membership aux fields of a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxFields {
    /// Aux leaf key.
    pub key: String,
    /// Aux leaf value.
    pub value: String,
    /// `"1"` when the path ends in an empty node.
    pub no_aux: String,
}

/// Aux fields: zero for inclusion, the aux leaf for non-inclusion ending
/// at a leaf, and zero with `noAux = 1` for non-inclusion ending empty.
pub fn node_aux(proof: &Proof) -> AuxFields {
    if proof.existence() {
        return AuxFields {
            key: "0".into(),
            value: "0".into(),
            no_aux: "0".into(),
        };
    }
    match proof.node_aux() {
        Some(aux) => AuxFields {
            key: dec(&aux.key),
            value: dec(&aux.value),
            no_aux: "0".into(),
        },
        None => AuxFields {
            key: "0".into(),
            value: "0".into(),
            no_aux: "1".into(),
        },
    }
}

/// Aux fields of an absent proof slot.
pub fn zero_aux() -> AuxFields {
    AuxFields {
        key: "0".into(),
        value: "0".into(),
        no_aux: "0".into(),
    }
}

/// Signature components `(R8x, R8y, S)`.
pub fn signature_parts(signature: &Signature) -> (String, String, String) {
    (dec(&signature.r8x()), dec(&signature.r8y()), dec(&signature.s()))
}

/// Serialize a wire struct to JSON bytes.
pub fn to_json<T: serde::Serialize>(wire: &T) -> Result<Vec<u8>, CircuitError> {
    Ok(serde_json::to_vec(wire)?)
}

/// Sequential reader over a positional public signal array.
pub struct SignalReader {
    signals: Vec<String>,
    pos: usize,
    circuit: &'static str,
}

impl SignalReader {
    /// Parse `data` and require exactly `expected` signals.
    pub fn new(data: &[u8], expected: usize, circuit: &'static str) -> Result<Self, CircuitError> {
        let signals: Vec<String> = serde_json::from_slice(data)?;
        if signals.len() != expected {
            return Err(CircuitError::InvalidPubSignals(format!(
                "{circuit} has {expected} public signals, got {}",
                signals.len()
            )));
        }
        Ok(Self {
            signals,
            pos: 0,
            circuit,
        })
    }

    fn next_str(&mut self) -> Result<&str, CircuitError> {
        let pos = self.pos;
        self.pos += 1;
        let circuit = self.circuit;
        self.signals
            .get(pos)
            .map(String::as_str)
            .ok_or_else(|| CircuitError::InvalidPubSignals(format!("{circuit} signal {pos} out of range")))
    }

    /// Next signal as a field element.
    pub fn hash(&mut self) -> Result<Hash, CircuitError> {
        let text = self.next_str()?;
        Ok(Hash::from_decimal(text)?)
    }

    /// Next signal as an identity id.
    pub fn id(&mut self) -> Result<Id, CircuitError> {
        let value = self.hash()?;
        Ok(Id::from_hash(&value)?)
    }

    /// Next signal as a small integer.
    pub fn u64(&mut self) -> Result<u64, CircuitError> {
        let circuit = self.circuit;
        let text = self.next_str()?;
        text.parse::<u64>().map_err(|_| {
            CircuitError::InvalidPubSignals(format!("{circuit} expects an integer signal, got {text:?}"))
        })
    }

    /// Next signal as a `0`/`1` flag.
    pub fn flag(&mut self) -> Result<bool, CircuitError> {
        match self.u64()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CircuitError::InvalidPubSignals(format!(
                "{} expects a 0/1 flag, got {other}",
                self.circuit
            ))),
        }
    }

    /// Next `n` signals as field elements.
    pub fn hashes(&mut self, n: usize) -> Result<Vec<Hash>, CircuitError> {
        (0..n).map(|_| self.hash()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkid_core::SparseMerkleTree;

    #[test]
    fn siblings_pad_with_zero_strings() {
        let mut tree = SparseMerkleTree::new(40);
        for k in [1u64, 3, 5] {
            tree.add(Hash::from_u64(k), Hash::from_u64(k)).unwrap();
        }
        let (proof, _) = tree.generate_proof(&Hash::from_u64(1)).unwrap();
        let out = siblings(&proof, 40);
        assert_eq!(out.len(), 40);
        assert!(out[proof.depth()..].iter().all(|s| s == "0"));
    }

    #[test]
    fn aux_encoding_by_proof_kind() {
        let mut tree = SparseMerkleTree::new(40);
        tree.add(Hash::from_u64(1), Hash::from_u64(10)).unwrap();

        let (inclusion, _) = tree.generate_proof(&Hash::from_u64(1)).unwrap();
        assert_eq!(node_aux(&inclusion), zero_aux());

        let (with_aux, _) = tree.generate_proof(&Hash::from_u64(3)).unwrap();
        let aux = node_aux(&with_aux);
        assert_eq!((aux.key.as_str(), aux.value.as_str(), aux.no_aux.as_str()), ("1", "10", "0"));

        let empty = node_aux(&Proof::empty());
        assert_eq!(empty.no_aux, "1");
        assert_eq!(empty.key, "0");
    }

    #[test]
    fn reader_enforces_length_and_types() {
        assert!(SignalReader::new(br#"["1","2"]"#, 3, "authV2").is_err());
        let mut reader = SignalReader::new(br#"["1","7","x"]"#, 3, "authV2").unwrap();
        assert!(reader.flag().unwrap());
        assert!(reader.flag().is_err());
        assert!(reader.hash().is_err());
    }
}
