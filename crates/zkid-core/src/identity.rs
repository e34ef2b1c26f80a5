//! # Identity Identifiers
//!
//! `Id` is the 31-byte numeric identifier committed into the global
//! identity state tree and emitted as the `userID`/`issuerID` public
//! signals. `Did` is a validated string wrapper around the human-facing
//! handle from which an `Id` is extracted.
//!
//! ## Layout
//!
//! ```text
//! [ type: 2 bytes | genesis: 27 bytes | checksum: 2 bytes ]
//! ```
//!
//! The checksum is the byte-sum of `type ‖ genesis` as a `u16`, stored
//! big-endian. The integer form is the little-endian reading of all 31
//! bytes, which always fits the BN254 field.

use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::field::Hash;

/// Length of an identifier in bytes.
pub const ID_LEN: usize = 31;

/// Numeric identity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id([u8; ID_LEN]);

impl Id {
    /// Build from a type and genesis, computing the checksum.
    pub fn new(id_type: [u8; 2], genesis: [u8; 27]) -> Self {
        let mut bytes = [0u8; ID_LEN];
        bytes[..2].copy_from_slice(&id_type);
        bytes[2..29].copy_from_slice(&genesis);
        let checksum = checksum(&bytes[..29]);
        bytes[29..].copy_from_slice(&checksum);
        Self(bytes)
    }

    /// Parse raw bytes, validating length and checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let raw: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
            CoreError::InvalidId(format!("expected {ID_LEN} bytes, got {}", bytes.len()))
        })?;
        if raw.iter().all(|b| *b == 0) {
            return Err(CoreError::InvalidId("all-zero identifier".into()));
        }
        if checksum(&raw[..29]) != raw[29..] {
            return Err(CoreError::InvalidId("checksum mismatch".into()));
        }
        Ok(Self(raw))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// The two type bytes (DID method and network).
    pub fn id_type(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }

    /// The 27 genesis bytes.
    pub fn genesis(&self) -> &[u8] {
        &self.0[2..29]
    }

    /// Little-endian integer value.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Field element form used in circuit signals and GIST keys.
    pub fn to_hash(&self) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[..ID_LEN].copy_from_slice(&self.0);
        // 31 bytes never reach the modulus.
        Hash::from_le_bytes(&bytes).unwrap_or(Hash::ZERO)
    }

    /// Decode a field element back into an identifier.
    pub fn from_hash(value: &Hash) -> Result<Self, CoreError> {
        let bytes = value.to_le_bytes();
        if bytes[ID_LEN] != 0 {
            return Err(CoreError::InvalidId(format!(
                "{value} does not fit in {ID_LEN} bytes"
            )));
        }
        Self::from_bytes(&bytes[..ID_LEN])
    }

    /// Base58 string form.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Parse the base58 string form.
    pub fn from_base58(text: &str) -> Result<Self, CoreError> {
        let raw = bs58::decode(text)
            .into_vec()
            .map_err(|e| CoreError::InvalidId(format!("base58: {e}")))?;
        Self::from_bytes(&raw)
    }

    /// Extract the identifier carried in the last segment of a DID.
    pub fn from_did(did: &Did) -> Result<Self, CoreError> {
        Self::from_base58(did.id_segment())
    }
}

fn checksum(bytes: &[u8]) -> [u8; 2] {
    let sum = bytes.iter().fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    sum.to_be_bytes()
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_base58())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base58(&text).map_err(serde::de::Error::custom)
    }
}

/// Decentralized identifier string, `did:<method>:...:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did(String);

impl Did {
    /// Validate and wrap a DID string.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let mut parts = value.split(':');
        if parts.next() != Some("did") {
            return Err(CoreError::InvalidDid(format!("{value:?} lacks did: prefix")));
        }
        let rest: Vec<&str> = parts.collect();
        if rest.len() < 2 || rest.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidDid(format!("{value:?} has empty segments")));
        }
        Ok(Self(value))
    }

    /// The DID method, e.g. `iden3`.
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// The method-specific identifier segment.
    pub fn id_segment(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::new(text).map_err(serde::de::Error::custom)
    }
}
