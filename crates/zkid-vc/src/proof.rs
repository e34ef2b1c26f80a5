//! # Embedded Credential Proofs
//!
//! Iden3 credentials carry their issuance evidence as proof objects inside
//! the credential. Two kinds matter to the circuits:
//!
//! - `Iden3SparseMerkleTreeProof`: the core claim is included in the
//!   issuer's claims tree at a published state.
//! - `BJJSignature2021`: the issuer signed the core claim's `(hi, hv)` with
//!   a Baby Jubjub key, itself committed by an auth claim in the issuer's
//!   claims tree.
//!
//! The `type` field selects the variant at parse time. Unknown proof types
//! deserialize to [`CredentialProof::Other`] and are ignored.

use serde::{Deserialize, Serialize};
use zkid_core::{Claim, Did, Hash, Proof, TreeState};
use zkid_crypto::Signature;

use crate::error::VcError;
use crate::status::CredentialStatus;

/// Issuer state snapshot. Roots are little-endian hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerState {
    /// Identity state.
    #[serde(default, with = "hex_hash", skip_serializing_if = "Option::is_none")]
    pub value: Option<Hash>,
    /// Claims tree root.
    #[serde(default, with = "hex_hash", skip_serializing_if = "Option::is_none")]
    pub claims_tree_root: Option<Hash>,
    /// Revocation tree root.
    #[serde(default, with = "hex_hash", skip_serializing_if = "Option::is_none")]
    pub revocation_tree_root: Option<Hash>,
    /// Roots tree root.
    #[serde(default, with = "hex_hash", skip_serializing_if = "Option::is_none")]
    pub root_of_roots: Option<Hash>,
    /// Publishing transaction, when anchored on chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    /// Block timestamp of the publishing transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<i64>,
    /// Block number of the publishing transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl IssuerState {
    /// Snapshot of a known tree state.
    pub fn from_tree_state(ts: &TreeState) -> Self {
        Self {
            value: Some(ts.state),
            claims_tree_root: Some(ts.claims_root),
            revocation_tree_root: Some(ts.revocation_root),
            root_of_roots: Some(ts.root_of_roots),
            ..Self::default()
        }
    }

    /// Convert to a validated [`TreeState`].
    pub fn to_tree_state(&self) -> Result<TreeState, VcError> {
        let ts = TreeState {
            state: self.value.ok_or(VcError::MissingField("issuer state value"))?,
            claims_root: self
                .claims_tree_root
                .ok_or(VcError::MissingField("issuer claims tree root"))?,
            revocation_root: self
                .revocation_tree_root
                .ok_or(VcError::MissingField("issuer revocation tree root"))?,
            root_of_roots: self
                .root_of_roots
                .ok_or(VcError::MissingField("issuer roots tree root"))?,
        };
        ts.validate()?;
        Ok(ts)
    }
}

/// Issuer-side data embedded in a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerData {
    /// Issuer DID.
    pub id: Did,
    /// Issuer state the proof is anchored to.
    pub state: IssuerState,
    /// Issuer's auth claim (signature proofs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_core_claim: Option<Claim>,
    /// Inclusion proof of the auth claim (signature proofs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtp: Option<Proof>,
    /// Status of the auth claim (signature proofs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<CredentialStatus>,
}

/// Inclusion of the core claim in the issuer's claims tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseMerkleTreeProof {
    /// Issuer state at inclusion.
    pub issuer_data: IssuerData,
    /// The core claim.
    pub core_claim: Claim,
    /// Inclusion proof of the core claim.
    pub mtp: Proof,
}

/// Issuer signature over the core claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BjjSignatureProof {
    /// Issuer auth key data.
    pub issuer_data: IssuerData,
    /// The core claim.
    pub core_claim: Claim,
    /// Compressed signature, hex.
    pub signature: String,
}

impl BjjSignatureProof {
    /// Decode the compressed signature.
    pub fn decoded_signature(&self) -> Result<Signature, VcError> {
        Ok(Signature::from_hex(&self.signature)?)
    }
}

/// A proof object embedded in a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialProof {
    /// Claims-tree inclusion proof.
    #[serde(rename = "Iden3SparseMerkleTreeProof")]
    SparseMerkleTree(SparseMerkleTreeProof),
    /// Baby Jubjub signature proof.
    #[serde(rename = "BJJSignature2021")]
    BjjSignature(BjjSignatureProof),
    /// Any other proof type.
    #[serde(other)]
    Other,
}

impl CredentialProof {
    /// Core claim carried by the proof.
    pub fn core_claim(&self) -> Option<&Claim> {
        match self {
            CredentialProof::SparseMerkleTree(p) => Some(&p.core_claim),
            CredentialProof::BjjSignature(p) => Some(&p.core_claim),
            CredentialProof::Other => None,
        }
    }
}

/// Serde adapter for optional hashes in little-endian hex.
pub(crate) mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};
    use zkid_core::Hash;

    pub fn serialize<S: Serializer>(value: &Option<Hash>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(h) => serializer.serialize_str(&h.to_hex()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Hash>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| Hash::from_hex(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
