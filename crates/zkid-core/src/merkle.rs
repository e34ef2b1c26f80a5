//! # Sparse Merkle Proofs
//!
//! Inclusion and non-inclusion proofs over iden3 sparse Merkle trees.
//!
//! ## Hashing
//!
//! - Leaf: `Poseidon(key, value, 1)`.
//! - Middle node: `Poseidon(left, right)`.
//! - Empty node: `0`.
//!
//! The path to a key follows its bits least-significant first: bit `n`
//! set means "go right" at level `n`.
//!
//! ## Representation
//!
//! A proof stores only the non-empty siblings plus a `notempties` bitmap
//! over the levels below `depth`. `all_siblings()` expands the zeros back.
//! The JSON form always carries the expanded list.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, TreeError};
use crate::field::Hash;
use crate::poseidon;

/// Largest proof depth representable in the bitmap.
pub const MAX_DEPTH: usize = 256;

/// Auxiliary leaf found on the path of a non-existent key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    /// Key of the leaf occupying the path.
    pub key: Hash,
    /// Value of that leaf.
    pub value: Hash,
}

/// Merkle inclusion or non-inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    existence: bool,
    depth: usize,
    notempties: [u8; MAX_DEPTH / 8],
    siblings: Vec<Hash>,
    node_aux: Option<NodeAux>,
}

impl Proof {
    /// Build from stored parts, checking the sibling/bitmap invariant.
    pub fn new(
        existence: bool,
        depth: usize,
        notempties: [u8; MAX_DEPTH / 8],
        siblings: Vec<Hash>,
        node_aux: Option<NodeAux>,
    ) -> Result<Self, CoreError> {
        if depth > MAX_DEPTH {
            return Err(CoreError::InvalidProof(format!("depth {depth} exceeds {MAX_DEPTH}")));
        }
        let set_bits = (0..depth).filter(|lvl| bit(&notempties, *lvl)).count();
        if set_bits != siblings.len() {
            return Err(CoreError::InvalidProof(format!(
                "{} siblings for {set_bits} non-empty levels",
                siblings.len()
            )));
        }
        if (depth..MAX_DEPTH).any(|lvl| bit(&notempties, lvl)) {
            return Err(CoreError::InvalidProof("bitmap marks levels below depth".into()));
        }
        if existence && node_aux.is_some() {
            return Err(CoreError::InvalidProof("existence proof carries an aux node".into()));
        }
        Ok(Self {
            existence,
            depth,
            notempties,
            siblings,
            node_aux,
        })
    }

    /// Build from the expanded sibling list. Trailing empty siblings are
    /// dropped; the deepest sibling of a real tree path is never empty.
    pub fn from_all_siblings(
        existence: bool,
        all_siblings: &[Hash],
        node_aux: Option<NodeAux>,
    ) -> Result<Self, CoreError> {
        let depth = all_siblings
            .iter()
            .rposition(|s| !s.is_zero())
            .map_or(0, |i| i + 1);
        if depth > MAX_DEPTH {
            return Err(CoreError::InvalidProof(format!("depth {depth} exceeds {MAX_DEPTH}")));
        }
        let mut notempties = [0u8; MAX_DEPTH / 8];
        let mut siblings = Vec::new();
        for (lvl, sibling) in all_siblings[..depth].iter().enumerate() {
            if !sibling.is_zero() {
                set_bit(&mut notempties, lvl);
                siblings.push(*sibling);
            }
        }
        Self::new(existence, depth, notempties, siblings, node_aux)
    }

    /// A non-existence proof in an empty tree.
    pub fn empty() -> Self {
        Self {
            existence: false,
            depth: 0,
            notempties: [0u8; MAX_DEPTH / 8],
            siblings: Vec::new(),
            node_aux: None,
        }
    }

    /// Whether the key exists in the tree.
    pub fn existence(&self) -> bool {
        self.existence
    }

    /// Number of levels traversed.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The non-empty siblings, root side first.
    pub fn siblings(&self) -> &[Hash] {
        &self.siblings
    }

    /// Auxiliary leaf for non-existence proofs.
    pub fn node_aux(&self) -> Option<&NodeAux> {
        self.node_aux.as_ref()
    }

    /// Siblings for every level below `depth`, empty levels as zero.
    pub fn all_siblings(&self) -> Vec<Hash> {
        let mut out = Vec::with_capacity(self.depth);
        let mut next = self.siblings.iter();
        for lvl in 0..self.depth {
            if bit(&self.notempties, lvl) {
                out.push(next.next().copied().unwrap_or(Hash::ZERO));
            } else {
                out.push(Hash::ZERO);
            }
        }
        out
    }

    /// Recompute the root this proof commits to for `(key, value)`.
    pub fn root_from_proof(&self, key: &Hash, value: &Hash) -> Result<Hash, CoreError> {
        let mut mid = if self.existence {
            leaf_hash(key, value)?
        } else if let Some(aux) = &self.node_aux {
            if aux.key == *key {
                return Err(TreeError::AuxKeyMatches.into());
            }
            leaf_hash(&aux.key, &aux.value)?
        } else {
            Hash::ZERO
        };

        let siblings = self.all_siblings();
        for lvl in (0..self.depth).rev() {
            let sibling = siblings[lvl];
            mid = if key.test_bit(lvl) {
                middle_hash(&sibling, &mid)?
            } else {
                middle_hash(&mid, &sibling)?
            };
        }
        Ok(mid)
    }

    /// Whether this proof shows `(key, value)` present, or `key` absent,
    /// under `root`.
    pub fn verify(&self, root: &Hash, key: &Hash, value: &Hash) -> bool {
        match self.root_from_proof(key, value) {
            Ok(computed) => computed == *root,
            Err(_) => false,
        }
    }
}

/// Leaf hash `Poseidon(key, value, 1)`.
pub fn leaf_hash(key: &Hash, value: &Hash) -> Result<Hash, CoreError> {
    poseidon::hash(&[*key, *value, Hash::from_u64(1)])
}

/// Middle node hash `Poseidon(left, right)`.
pub fn middle_hash(left: &Hash, right: &Hash) -> Result<Hash, CoreError> {
    poseidon::hash(&[*left, *right])
}

fn bit(bitmap: &[u8; MAX_DEPTH / 8], n: usize) -> bool {
    n < MAX_DEPTH && bitmap[bitmap.len() - n / 8 - 1] & (1 << (n % 8)) != 0
}

fn set_bit(bitmap: &mut [u8; MAX_DEPTH / 8], n: usize) {
    let len = bitmap.len();
    bitmap[len - n / 8 - 1] |= 1 << (n % 8);
}

pub(crate) fn set_notempty(bitmap: &mut [u8; MAX_DEPTH / 8], n: usize) {
    set_bit(bitmap, n)
}

#[derive(Serialize, Deserialize)]
struct ProofJson {
    existence: bool,
    siblings: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node_aux: Option<NodeAux>,
}

impl Serialize for Proof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ProofJson {
            existence: self.existence,
            siblings: self.all_siblings(),
            node_aux: self.node_aux,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Proof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = ProofJson::deserialize(deserializer)?;
        Self::from_all_siblings(json.existence, &json.siblings, json.node_aux)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(v: u64) -> Hash {
        Hash::from_u64(v)
    }

    #[test]
    fn all_siblings_expands_zeros() {
        let proof = Proof::from_all_siblings(true, &[h(5), Hash::ZERO, h(7)], None).unwrap();
        assert_eq!(proof.depth(), 3);
        assert_eq!(proof.siblings(), &[h(5), h(7)]);
        assert_eq!(proof.all_siblings(), vec![h(5), Hash::ZERO, h(7)]);
    }

    #[test]
    fn trailing_zero_siblings_are_trimmed() {
        let proof = Proof::from_all_siblings(false, &[h(5), Hash::ZERO, Hash::ZERO], None).unwrap();
        assert_eq!(proof.depth(), 1);
    }

    #[test]
    fn sibling_count_must_match_bitmap() {
        let mut bitmap = [0u8; MAX_DEPTH / 8];
        set_bit(&mut bitmap, 0);
        let err = Proof::new(true, 2, bitmap, vec![h(1), h(2)], None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidProof(_)));
    }

    #[test]
    fn existence_with_aux_is_rejected() {
        let aux = NodeAux { key: h(1), value: h(2) };
        assert!(Proof::from_all_siblings(true, &[], Some(aux)).is_err());
    }

    #[test]
    fn single_leaf_tree_root_is_leaf_hash() {
        let proof = Proof::from_all_siblings(true, &[], None).unwrap();
        let root = proof.root_from_proof(&h(4), &h(9)).unwrap();
        assert_eq!(root, leaf_hash(&h(4), &h(9)).unwrap());
    }

    #[test]
    fn aux_with_queried_key_fails() {
        let aux = NodeAux { key: h(4), value: h(2) };
        let proof = Proof::from_all_siblings(false, &[], Some(aux)).unwrap();
        assert!(proof.root_from_proof(&h(4), &Hash::ZERO).is_err());
        assert!(!proof.verify(&Hash::ZERO, &h(4), &Hash::ZERO));
    }

    #[test]
    fn json_uses_expanded_siblings() {
        let aux = NodeAux { key: h(3), value: h(8) };
        let proof = Proof::from_all_siblings(false, &[h(1), Hash::ZERO, h(2)], Some(aux)).unwrap();
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "existence": false,
                "siblings": ["1", "0", "2"],
                "node_aux": {"key": "3", "value": "8"}
            })
        );
        let back: Proof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
    }
}
