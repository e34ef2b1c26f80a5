//! # Identity State
//!
//! `TreeState` is the snapshot of one identity's three trees;
//! `GistProof` places that identity's state in the global identity state
//! tree (GIST).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field::Hash;
use crate::merkle::Proof;
use crate::poseidon;

/// Roots of an identity's claims, revocation and roots trees, and the
/// state committing to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    /// `Poseidon(claims_root, revocation_root, root_of_roots)`.
    pub state: Hash,
    /// Claims tree root.
    #[serde(rename = "claimsTreeRoot")]
    pub claims_root: Hash,
    /// Revocation tree root.
    #[serde(rename = "revocationTreeRoot")]
    pub revocation_root: Hash,
    /// Roots tree root.
    pub root_of_roots: Hash,
}

impl TreeState {
    /// Build from the three roots, computing the state.
    pub fn new(claims_root: Hash, revocation_root: Hash, root_of_roots: Hash) -> Result<Self, CoreError> {
        let state = identity_state(&claims_root, &revocation_root, &root_of_roots)?;
        Ok(Self {
            state,
            claims_root,
            revocation_root,
            root_of_roots,
        })
    }

    /// Check that `state` commits to the three roots.
    pub fn validate(&self) -> Result<(), CoreError> {
        let computed = identity_state(&self.claims_root, &self.revocation_root, &self.root_of_roots)?;
        if computed != self.state {
            return Err(CoreError::StateMismatch {
                declared: self.state.to_decimal(),
                computed: computed.to_decimal(),
            });
        }
        Ok(())
    }
}

/// Identity state hash.
pub fn identity_state(claims_root: &Hash, revocation_root: &Hash, root_of_roots: &Hash) -> Result<Hash, CoreError> {
    poseidon::hash(&[*claims_root, *revocation_root, *root_of_roots])
}

/// Proof of an identity's state in the global identity state tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistProof {
    /// GIST root the proof is against.
    pub root: Hash,
    /// Inclusion or non-inclusion proof keyed by the identity id.
    pub proof: Proof,
}
