//! # Field Hash
//!
//! `Hash` is a BN254 scalar field element (`ark_bn254::Fr`). It is the
//! value type for Merkle nodes, claim slots, identity states and every
//! marshaled circuit signal.
//!
//! ## Encodings
//!
//! - Text: the decimal integer (`"0"`, `"7853200120776…"`). This is the
//!   circuit input wire format and the JSON form of proofs.
//! - Bytes/hex: 32 little-endian bytes, the iden3 convention for roots
//!   embedded in credentials.
//!
//! Every decoder rejects integers greater than or equal to the field
//! modulus instead of reducing them.

use std::fmt;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{AdditiveGroup, BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A BN254 scalar field element used as a Merkle node or signal value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(Fr);

impl Hash {
    /// The zero element, also the empty-node hash of a sparse Merkle tree.
    pub const ZERO: Hash = Hash(<Fr as AdditiveGroup>::ZERO);

    /// Wrap a field element.
    pub fn from_fr(value: Fr) -> Self {
        Self(value)
    }

    /// Access the inner field element.
    pub fn fr(&self) -> Fr {
        self.0
    }

    /// Build from a small integer.
    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// Whether this is the zero element.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The field modulus as a big integer.
    pub fn modulus() -> BigUint {
        BigUint::from(Fr::MODULUS)
    }

    /// Build from a big integer, rejecting values outside the field.
    pub fn from_biguint(value: &BigUint) -> Result<Self, CoreError> {
        if *value >= Self::modulus() {
            return Err(CoreError::NotInField(value.to_string()));
        }
        Ok(Self(Fr::from(value.clone())))
    }

    /// The canonical integer representative.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from(self.0.into_bigint())
    }

    /// Parse a decimal integer string.
    pub fn from_decimal(text: &str) -> Result<Self, CoreError> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidDecimal(text.to_string()));
        }
        let value = BigUint::parse_bytes(text.as_bytes(), 10)
            .ok_or_else(|| CoreError::InvalidDecimal(text.to_string()))?;
        Self::from_biguint(&value)
    }

    /// Decimal string form.
    pub fn to_decimal(&self) -> String {
        self.to_biguint().to_string()
    }

    /// Build from 32 little-endian bytes.
    pub fn from_le_bytes(bytes: &[u8; 32]) -> Result<Self, CoreError> {
        Self::from_biguint(&BigUint::from_bytes_le(bytes))
    }

    /// 32 little-endian bytes.
    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let bytes = self.0.into_bigint().to_bytes_le();
        out[..bytes.len()].copy_from_slice(&bytes);
        out
    }

    /// Parse 64 hex characters holding little-endian bytes.
    pub fn from_hex(text: &str) -> Result<Self, CoreError> {
        let raw = hex::decode(text.trim()).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidHex(format!("expected 32 bytes, got {}", raw.len())))?;
        Self::from_le_bytes(&bytes)
    }

    /// Lowercase hex of the little-endian bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_le_bytes())
    }

    /// Bit `n` of the integer value, least significant first.
    pub fn test_bit(&self, n: usize) -> bool {
        n < 256 && self.0.into_bigint().get_bit(n)
    }
}

impl From<Fr> for Hash {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<Hash> for Fr {
    fn from(value: Hash) -> Self {
        value.0
    }
}

impl From<u64> for Hash {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl FromStr for Hash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_decimal())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_decimal(&text).map_err(serde::de::Error::custom)
    }
}

/// Decimal strings for a slice of hashes, as marshaled into circuit inputs.
pub fn to_decimal_strings(values: &[Hash]) -> Vec<String> {
    values.iter().map(Hash::to_decimal).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULUS: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn zero_displays_as_digit() {
        assert_eq!(Hash::ZERO.to_string(), "0");
        assert!(Hash::ZERO.is_zero());
    }

    #[test]
    fn decimal_roundtrip() {
        let h = Hash::from_decimal("12345678901234567890").unwrap();
        assert_eq!(h.to_decimal(), "12345678901234567890");
    }

    #[test]
    fn modulus_is_rejected() {
        assert_eq!(Hash::modulus().to_string(), MODULUS);
        assert!(matches!(
            Hash::from_decimal(MODULUS),
            Err(CoreError::NotInField(_))
        ));
    }

    #[test]
    fn malformed_decimal_is_rejected() {
        assert!(Hash::from_decimal("").is_err());
        assert!(Hash::from_decimal("-1").is_err());
        assert!(Hash::from_decimal("0x10").is_err());
    }

    #[test]
    fn hex_is_little_endian() {
        let h = Hash::from_u64(1);
        let hex = h.to_hex();
        assert!(hex.starts_with("01"));
        assert_eq!(hex.len(), 64);
        assert_eq!(Hash::from_hex(&hex).unwrap(), h);
    }

    #[test]
    fn hex_wrong_length_is_rejected() {
        assert!(matches!(
            Hash::from_hex("0102"),
            Err(CoreError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_bit_reads_lsb_first() {
        let h = Hash::from_u64(0b101);
        assert!(h.test_bit(0));
        assert!(!h.test_bit(1));
        assert!(h.test_bit(2));
        assert!(!h.test_bit(300));
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let h = Hash::from_u64(42);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
