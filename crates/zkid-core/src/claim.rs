//! # Core Claim
//!
//! The fixed 8 × 32-byte slot encoding of one verifiable assertion. The
//! first four slots form the index (committed as Merkle key `hi`), the last
//! four the value (`hv`).
//!
//! ## Slot layout
//!
//! ```text
//! index[0]  schema(16) | flags(4) | version(4) | reserved(8)
//! index[1]  subject id when the subject is stored in the index
//! index[2]  data slot A, or the Merklized root (index position)
//! index[3]  data slot B
//! value[0]  revocation nonce(8) | expiration(8) | reserved(16)
//! value[1]  subject id when the subject is stored in the value
//! value[2]  data slot A, or the Merklized root (value position)
//! value[3]  data slot B
//! ```
//!
//! Flag byte (offset 16 of `index[0]`): bits 0–2 subject position,
//! bit 3 expiration, bit 4 updatable, bits 5–7 Merklized-root position.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::field::Hash;
use crate::identity::{Id, ID_LEN};
use crate::poseidon;

/// Schema hash of the Baby Jubjub auth key claim.
pub const AUTH_BJJ_SCHEMA_HASH: &str = "ca938857241db9451ea329256b9c06e5";

const FLAGS_BYTE: usize = 16;
const VERSION_OFFSET: usize = 20;
const EXPIRATION_BIT: u8 = 3;
const UPDATABLE_BIT: u8 = 4;
const SUBJECT_MASK: u8 = 0b0000_0111;
const MERKLIZED_SHIFT: u8 = 5;
const MERKLIZED_MASK: u8 = 0b1110_0000;

/// 16-byte claim schema hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SchemaHash(pub [u8; 16]);

impl SchemaHash {
    /// Parse 32 hex characters.
    pub fn from_hex(text: &str) -> Result<Self, CoreError> {
        let raw = hex::decode(text).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidHex(format!("schema hash needs 16 bytes, got {}", raw.len())))?;
        Ok(Self(bytes))
    }

    /// Field element form, the `claimSchema` circuit signal.
    pub fn to_hash(&self) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&self.0);
        Hash::from_le_bytes(&bytes).unwrap_or(Hash::ZERO)
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Where the claim subject's id is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectFlag {
    /// The claim is about the issuer itself.
    SelfSubject,
    /// Subject id in `index[1]`.
    OtherIdenIndex,
    /// Subject id in `value[1]`.
    OtherIdenValue,
}

impl SubjectFlag {
    fn bits(self) -> u8 {
        match self {
            SubjectFlag::SelfSubject => 0b000,
            SubjectFlag::OtherIdenIndex => 0b010,
            SubjectFlag::OtherIdenValue => 0b011,
        }
    }
}

/// Where a Merklized credential root is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerklizedPosition {
    /// Claim is not Merklized.
    None,
    /// Root in `index[2]`.
    Index,
    /// Root in `value[2]`.
    Value,
}

/// An immutable core claim.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    index: [[u8; 32]; 4],
    value: [[u8; 32]; 4],
}

impl Claim {
    /// An empty claim carrying only a schema hash.
    pub fn new(schema: SchemaHash) -> Self {
        let mut claim = Self::empty();
        claim.index[0][..16].copy_from_slice(&schema.0);
        claim
    }

    /// The all-zero claim, used to zero-fill unused circuit inputs.
    pub fn empty() -> Self {
        Self {
            index: [[0u8; 32]; 4],
            value: [[0u8; 32]; 4],
        }
    }

    /// The Baby Jubjub auth key claim for public key `(x, y)`.
    pub fn auth_bjj(x: Hash, y: Hash, revocation_nonce: u64) -> Result<Self, CoreError> {
        let schema = SchemaHash::from_hex(AUTH_BJJ_SCHEMA_HASH)?;
        Ok(Self::new(schema)
            .with_index_data(x, y)
            .with_revocation_nonce(revocation_nonce))
    }

    /// Decode 256 raw bytes hex-encoded (the `coreClaim` credential field).
    pub fn from_hex(text: &str) -> Result<Self, CoreError> {
        let raw = hex::decode(text.trim()).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
        if raw.len() != 256 {
            return Err(CoreError::InvalidClaim(format!(
                "expected 256 bytes, got {}",
                raw.len()
            )));
        }
        let mut claim = Self::empty();
        for (i, chunk) in raw.chunks_exact(32).enumerate() {
            let mut slot = [0u8; 32];
            slot.copy_from_slice(chunk);
            Hash::from_le_bytes(&slot)
                .map_err(|_| CoreError::InvalidClaim(format!("slot {i} is not a field element")))?;
            if i < 4 {
                claim.index[i] = slot;
            } else {
                claim.value[i - 4] = slot;
            }
        }
        Ok(claim)
    }

    /// Hex of the 256 raw bytes.
    pub fn to_hex(&self) -> String {
        let mut raw = Vec::with_capacity(256);
        for slot in self.index.iter().chain(self.value.iter()) {
            raw.extend_from_slice(slot);
        }
        hex::encode(raw)
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// Store the subject id at the given position.
    pub fn with_subject(mut self, flag: SubjectFlag, id: Option<&Id>) -> Self {
        self.index[0][FLAGS_BYTE] = (self.index[0][FLAGS_BYTE] & !SUBJECT_MASK) | flag.bits();
        self.index[1] = [0u8; 32];
        self.value[1] = [0u8; 32];
        if let Some(id) = id {
            match flag {
                SubjectFlag::OtherIdenIndex => self.index[1][..ID_LEN].copy_from_slice(id.as_bytes()),
                SubjectFlag::OtherIdenValue => self.value[1][..ID_LEN].copy_from_slice(id.as_bytes()),
                SubjectFlag::SelfSubject => {}
            }
        }
        self
    }

    /// Set the revocation nonce.
    pub fn with_revocation_nonce(mut self, nonce: u64) -> Self {
        self.value[0][..8].copy_from_slice(&nonce.to_le_bytes());
        self
    }

    /// Set an expiration time and raise the expiration flag.
    pub fn with_expiration(mut self, at: DateTime<Utc>) -> Self {
        let secs = at.timestamp().max(0) as u64;
        self.value[0][8..16].copy_from_slice(&secs.to_le_bytes());
        self.index[0][FLAGS_BYTE] |= 1 << EXPIRATION_BIT;
        self
    }

    /// Set the claim version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.index[0][VERSION_OFFSET..VERSION_OFFSET + 4].copy_from_slice(&version.to_le_bytes());
        self
    }

    /// Raise or clear the updatable flag.
    pub fn with_updatable(mut self, updatable: bool) -> Self {
        if updatable {
            self.index[0][FLAGS_BYTE] |= 1 << UPDATABLE_BIT;
        } else {
            self.index[0][FLAGS_BYTE] &= !(1 << UPDATABLE_BIT);
        }
        self
    }

    /// Set index data slots A and B.
    pub fn with_index_data(mut self, a: Hash, b: Hash) -> Self {
        self.index[2] = a.to_le_bytes();
        self.index[3] = b.to_le_bytes();
        self
    }

    /// Set value data slots A and B.
    pub fn with_value_data(mut self, a: Hash, b: Hash) -> Self {
        self.value[2] = a.to_le_bytes();
        self.value[3] = b.to_le_bytes();
        self
    }

    /// Store a Merklized credential root at the given position.
    pub fn with_merklized_root(mut self, position: MerklizedPosition, root: Hash) -> Self {
        let bits = match position {
            MerklizedPosition::None => 0b000,
            MerklizedPosition::Index => 0b001,
            MerklizedPosition::Value => 0b010,
        };
        self.index[0][FLAGS_BYTE] =
            (self.index[0][FLAGS_BYTE] & !MERKLIZED_MASK) | (bits << MERKLIZED_SHIFT);
        match position {
            MerklizedPosition::Index => self.index[2] = root.to_le_bytes(),
            MerklizedPosition::Value => self.value[2] = root.to_le_bytes(),
            MerklizedPosition::None => {}
        }
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The schema hash.
    pub fn schema_hash(&self) -> SchemaHash {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.index[0][..16]);
        SchemaHash(bytes)
    }

    /// The revocation nonce.
    pub fn revocation_nonce(&self) -> u64 {
        read_u64(&self.value[0][..8])
    }

    /// Expiration time, if the expiration flag is set.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        if self.index[0][FLAGS_BYTE] & (1 << EXPIRATION_BIT) == 0 {
            return None;
        }
        let secs = read_u64(&self.value[0][8..16]);
        DateTime::<Utc>::from_timestamp(i64::try_from(secs).ok()?, 0)
    }

    /// Claim version.
    pub fn version(&self) -> u32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.index[0][VERSION_OFFSET..VERSION_OFFSET + 4]);
        u32::from_le_bytes(b)
    }

    /// Whether the updatable flag is set.
    pub fn is_updatable(&self) -> bool {
        self.index[0][FLAGS_BYTE] & (1 << UPDATABLE_BIT) != 0
    }

    /// Subject position.
    pub fn subject_flag(&self) -> Result<SubjectFlag, CoreError> {
        match self.index[0][FLAGS_BYTE] & SUBJECT_MASK {
            0b000 => Ok(SubjectFlag::SelfSubject),
            0b010 => Ok(SubjectFlag::OtherIdenIndex),
            0b011 => Ok(SubjectFlag::OtherIdenValue),
            other => Err(CoreError::InvalidClaim(format!("unknown subject flag {other:#05b}"))),
        }
    }

    /// Merklized root position.
    pub fn merklized_position(&self) -> Result<MerklizedPosition, CoreError> {
        match (self.index[0][FLAGS_BYTE] & MERKLIZED_MASK) >> MERKLIZED_SHIFT {
            0b000 => Ok(MerklizedPosition::None),
            0b001 => Ok(MerklizedPosition::Index),
            0b010 => Ok(MerklizedPosition::Value),
            other => Err(CoreError::InvalidClaim(format!("unknown merklized flag {other:#05b}"))),
        }
    }

    /// Subject id, if the claim stores one.
    pub fn subject_id(&self) -> Result<Option<Id>, CoreError> {
        match self.subject_flag()? {
            SubjectFlag::SelfSubject => Ok(None),
            SubjectFlag::OtherIdenIndex => Id::from_bytes(&self.index[1][..ID_LEN]).map(Some),
            SubjectFlag::OtherIdenValue => Id::from_bytes(&self.value[1][..ID_LEN]).map(Some),
        }
    }

    /// Slot `i` (0–3 index, 4–7 value) as a field element.
    pub fn slot(&self, i: usize) -> Result<Hash, CoreError> {
        let raw = match i {
            0..=3 => &self.index[i],
            4..=7 => &self.value[i - 4],
            _ => return Err(CoreError::InvalidClaim(format!("slot {i} out of range"))),
        };
        Hash::from_le_bytes(raw)
    }

    /// All eight slots as field elements, the `issuerClaim` signal array.
    pub fn slots(&self) -> Result<[Hash; 8], CoreError> {
        let mut out = [Hash::ZERO; 8];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.slot(i)?;
        }
        Ok(out)
    }

    /// Index hash `hi` and value hash `hv`.
    pub fn hi_hv(&self) -> Result<(Hash, Hash), CoreError> {
        let slots = self.slots()?;
        let hi = poseidon::hash(&slots[..4])?;
        let hv = poseidon::hash(&slots[4..])?;
        Ok((hi, hv))
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(bytes);
    u64::from_le_bytes(b)
}

impl Default for Claim {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Claim({})", self.to_hex())
    }
}

impl Serialize for Claim {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Claim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaHash {
        SchemaHash::from_hex("9b1c05f4b0a5f3b4e5a2b1c0d9e8f7a6").unwrap()
    }

    #[test]
    fn revocation_nonce_and_version_roundtrip() {
        let claim = Claim::new(schema())
            .with_revocation_nonce(0xdead_beef)
            .with_version(7);
        assert_eq!(claim.revocation_nonce(), 0xdead_beef);
        assert_eq!(claim.version(), 7);
        assert_eq!(claim.schema_hash(), schema());
    }

    #[test]
    fn expiration_sets_flag() {
        let at = DateTime::<Utc>::from_timestamp(1_900_000_000, 0).unwrap();
        let claim = Claim::new(schema()).with_expiration(at);
        assert_eq!(claim.expiration(), Some(at));
        assert!(Claim::new(schema()).expiration().is_none());
    }

    #[test]
    fn subject_in_index_is_recovered() {
        let id = Id::new([0x0d, 0x01], [9u8; 27]);
        let claim = Claim::new(schema()).with_subject(SubjectFlag::OtherIdenIndex, Some(&id));
        assert_eq!(claim.subject_flag().unwrap(), SubjectFlag::OtherIdenIndex);
        assert_eq!(claim.subject_id().unwrap(), Some(id));
    }

    #[test]
    fn merklized_value_root() {
        let root = Hash::from_u64(99);
        let claim = Claim::new(schema()).with_merklized_root(MerklizedPosition::Value, root);
        assert_eq!(claim.merklized_position().unwrap(), MerklizedPosition::Value);
        assert_eq!(claim.slot(6).unwrap(), root);
    }

    #[test]
    fn schema_hash_field_form_is_little_endian() {
        let s = SchemaHash::from_hex(AUTH_BJJ_SCHEMA_HASH).unwrap();
        assert_eq!(s.to_hash().to_le_bytes()[..16], s.0);
    }

    #[test]
    fn hex_roundtrip_and_validation() {
        let claim = Claim::auth_bjj(Hash::from_u64(1), Hash::from_u64(2), 5).unwrap();
        let hex = claim.to_hex();
        assert_eq!(hex.len(), 512);
        assert_eq!(Claim::from_hex(&hex).unwrap(), claim);

        let mut bad = hex.clone();
        bad.replace_range(64..128, &"ff".repeat(32));
        assert!(matches!(
            Claim::from_hex(&bad),
            Err(CoreError::InvalidClaim(_))
        ));
    }

    #[test]
    fn hi_hv_hash_four_slots_each() {
        let claim = Claim::auth_bjj(Hash::from_u64(3), Hash::from_u64(4), 1).unwrap();
        let slots = claim.slots().unwrap();
        let (hi, hv) = claim.hi_hv().unwrap();
        assert_eq!(hi, poseidon::hash(&slots[..4]).unwrap());
        assert_eq!(hv, poseidon::hash(&slots[4..]).unwrap());
        assert_eq!(slots[2], Hash::from_u64(3));
        assert_eq!(slots[4], Hash::from_u64(1));
    }
}
