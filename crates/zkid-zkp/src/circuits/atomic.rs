//! # Atomic Query Signal Groups
//!
//! The atomic query circuits (MTP/Sig V2, V3, and their on-chain builds)
//! share groups of input signals: request metadata, the issuer claim's
//! non-revocation proof, the claims-tree inclusion branch, the signature
//! branch, the query itself, and for on-chain builds the prover's own auth
//! and GIST proofs. Each group is a wire struct flattened into the
//! per-circuit struct.
//!
//! An absent branch is zero-filled with the circuit's array lengths.

use serde::Serialize;
use zkid_core::{Claim, GistProof, Hash, Id, Proof, SchemaHash, TreeState};
use zkid_crypto::Signature;
use zkid_vc::{BjjSignatureClaim, MtProof};

use crate::circuits::marshal::{self, AuxFields, SignalReader};
use crate::circuits::CircuitLevels;
use crate::error::CircuitError;
use crate::query::{Operator, Query, VALUE_ARRAY_SIZE};

/// The prover's own auth proofs for on-chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainAuth {
    /// Prover's auth claim.
    pub auth_claim: Claim,
    /// Inclusion of the auth claim in the prover's claims tree.
    pub auth_claim_inc_mtp: Proof,
    /// Non-revocation of the auth claim.
    pub auth_claim_non_rev_mtp: Proof,
    /// Prover's tree state.
    pub tree_state: TreeState,
    /// Prover's state in the GIST.
    pub gist_proof: GistProof,
    /// Signature over the challenge.
    pub signature: Signature,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestSignals {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(rename = "userGenesisID")]
    pub user_genesis_id: String,
    pub profile_nonce: String,
    pub claim_subject_profile_nonce: String,
    #[serde(rename = "issuerID")]
    pub issuer_id: String,
    pub issuer_claim: Vec<String>,
    pub is_revocation_checked: String,
    pub timestamp: String,
}

impl RequestSignals {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: &Hash,
        user_genesis_id: &Id,
        profile_nonce: &Hash,
        claim_subject_profile_nonce: &Hash,
        issuer_id: &Id,
        issuer_claim: &Claim,
        skip_revocation_check: bool,
        timestamp: i64,
    ) -> Result<Self, CircuitError> {
        if timestamp < 0 {
            return Err(CircuitError::InvalidInput(format!("negative timestamp {timestamp}")));
        }
        Ok(Self {
            request_id: marshal::dec(request_id),
            user_genesis_id: marshal::id_dec(user_genesis_id),
            profile_nonce: marshal::dec(profile_nonce),
            claim_subject_profile_nonce: marshal::dec(claim_subject_profile_nonce),
            issuer_id: marshal::id_dec(issuer_id),
            issuer_claim: marshal::claim_slots(issuer_claim)?,
            is_revocation_checked: marshal::flag(!skip_revocation_check),
            timestamp: timestamp.to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NonRevSignals {
    pub issuer_claim_non_rev_claims_tree_root: String,
    pub issuer_claim_non_rev_rev_tree_root: String,
    pub issuer_claim_non_rev_roots_tree_root: String,
    pub issuer_claim_non_rev_state: String,
    pub issuer_claim_non_rev_mtp: Vec<String>,
    pub issuer_claim_non_rev_mtp_aux_hi: String,
    pub issuer_claim_non_rev_mtp_aux_hv: String,
    pub issuer_claim_non_rev_mtp_no_aux: String,
}

impl NonRevSignals {
    pub fn new(non_rev: &MtProof, levels: &CircuitLevels) -> Self {
        let ts = &non_rev.tree_state;
        let aux = marshal::node_aux(&non_rev.proof);
        Self {
            issuer_claim_non_rev_claims_tree_root: marshal::dec(&ts.claims_root),
            issuer_claim_non_rev_rev_tree_root: marshal::dec(&ts.revocation_root),
            issuer_claim_non_rev_roots_tree_root: marshal::dec(&ts.root_of_roots),
            issuer_claim_non_rev_state: marshal::dec(&ts.state),
            issuer_claim_non_rev_mtp: marshal::siblings(&non_rev.proof, levels.identity),
            issuer_claim_non_rev_mtp_aux_hi: aux.key,
            issuer_claim_non_rev_mtp_aux_hv: aux.value,
            issuer_claim_non_rev_mtp_no_aux: aux.no_aux,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InclusionSignals {
    pub issuer_claim_mtp: Vec<String>,
    pub issuer_claim_claims_tree_root: String,
    pub issuer_claim_rev_tree_root: String,
    pub issuer_claim_roots_tree_root: String,
    pub issuer_claim_iden_state: String,
}

impl InclusionSignals {
    pub fn new(inc: Option<&MtProof>, levels: &CircuitLevels) -> Self {
        match inc {
            Some(inc) => Self {
                issuer_claim_mtp: marshal::siblings(&inc.proof, levels.identity),
                issuer_claim_claims_tree_root: marshal::dec(&inc.tree_state.claims_root),
                issuer_claim_rev_tree_root: marshal::dec(&inc.tree_state.revocation_root),
                issuer_claim_roots_tree_root: marshal::dec(&inc.tree_state.root_of_roots),
                issuer_claim_iden_state: marshal::dec(&inc.tree_state.state),
            },
            None => Self {
                issuer_claim_mtp: marshal::zeros(levels.identity),
                issuer_claim_claims_tree_root: "0".into(),
                issuer_claim_rev_tree_root: "0".into(),
                issuer_claim_roots_tree_root: "0".into(),
                issuer_claim_iden_state: "0".into(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignatureSignals {
    pub issuer_auth_claim: Vec<String>,
    pub issuer_auth_claim_mtp: Vec<String>,
    pub issuer_auth_claim_non_rev_mtp: Vec<String>,
    pub issuer_auth_claim_non_rev_mtp_aux_hi: String,
    pub issuer_auth_claim_non_rev_mtp_aux_hv: String,
    pub issuer_auth_claim_non_rev_mtp_no_aux: String,
    pub issuer_auth_claims_tree_root: String,
    pub issuer_auth_rev_tree_root: String,
    pub issuer_auth_roots_tree_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_auth_state: Option<String>,
    pub issuer_claim_signature_r8x: String,
    pub issuer_claim_signature_r8y: String,
    pub issuer_claim_signature_s: String,
}

impl SignatureSignals {
    /// Signature branch; `with_state` adds the `issuerAuthState` input of
    /// the V3 circuits.
    pub fn new(
        sig: Option<&BjjSignatureClaim>,
        levels: &CircuitLevels,
        with_state: bool,
    ) -> Result<Self, CircuitError> {
        let Some(sig) = sig else {
            let aux = marshal::zero_aux();
            return Ok(Self {
                issuer_auth_claim: marshal::zero_claim(),
                issuer_auth_claim_mtp: marshal::zeros(levels.identity),
                issuer_auth_claim_non_rev_mtp: marshal::zeros(levels.identity),
                issuer_auth_claim_non_rev_mtp_aux_hi: aux.key,
                issuer_auth_claim_non_rev_mtp_aux_hv: aux.value,
                issuer_auth_claim_non_rev_mtp_no_aux: aux.no_aux,
                issuer_auth_claims_tree_root: "0".into(),
                issuer_auth_rev_tree_root: "0".into(),
                issuer_auth_roots_tree_root: "0".into(),
                issuer_auth_state: with_state.then(|| "0".to_string()),
                issuer_claim_signature_r8x: "0".into(),
                issuer_claim_signature_r8y: "0".into(),
                issuer_claim_signature_s: "0".into(),
            });
        };
        let ts = &sig.issuer_auth_inc_proof.tree_state;
        let aux = marshal::node_aux(&sig.issuer_auth_non_rev_proof.proof);
        let (r8x, r8y, s) = marshal::signature_parts(&sig.signature);
        Ok(Self {
            issuer_auth_claim: marshal::claim_slots(&sig.issuer_auth_claim)?,
            issuer_auth_claim_mtp: marshal::siblings(&sig.issuer_auth_inc_proof.proof, levels.identity),
            issuer_auth_claim_non_rev_mtp: marshal::siblings(&sig.issuer_auth_non_rev_proof.proof, levels.identity),
            issuer_auth_claim_non_rev_mtp_aux_hi: aux.key,
            issuer_auth_claim_non_rev_mtp_aux_hv: aux.value,
            issuer_auth_claim_non_rev_mtp_no_aux: aux.no_aux,
            issuer_auth_claims_tree_root: marshal::dec(&ts.claims_root),
            issuer_auth_rev_tree_root: marshal::dec(&ts.revocation_root),
            issuer_auth_roots_tree_root: marshal::dec(&ts.root_of_roots),
            issuer_auth_state: with_state.then(|| marshal::dec(&ts.state)),
            issuer_claim_signature_r8x: r8x,
            issuer_claim_signature_r8y: r8y,
            issuer_claim_signature_s: s,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuerySignals {
    pub claim_schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_path_not_exists: Option<String>,
    pub claim_path_mtp: Vec<String>,
    pub claim_path_mtp_no_aux: String,
    pub claim_path_mtp_aux_hi: String,
    pub claim_path_mtp_aux_hv: String,
    pub claim_path_key: String,
    pub claim_path_value: String,
    pub operator: String,
    pub slot_index: String,
    pub value: Vec<String>,
}

impl QuerySignals {
    /// Query group; `with_not_exists` adds the V2 `claimPathNotExists` input.
    pub fn new(
        query: &Query,
        schema: &SchemaHash,
        levels: &CircuitLevels,
        with_not_exists: bool,
    ) -> Result<Self, CircuitError> {
        let (mtp, aux, key, value) = match &query.value_proof {
            Some(vp) => (
                marshal::siblings(&vp.mtp, levels.claim),
                marshal::node_aux(&vp.mtp),
                marshal::dec(&vp.path),
                marshal::dec(&vp.value),
            ),
            None => (marshal::zeros(levels.claim), marshal::zero_aux(), "0".into(), "0".into()),
        };
        let AuxFields {
            key: aux_hi,
            value: aux_hv,
            no_aux,
        } = aux;
        Ok(Self {
            claim_schema: marshal::dec(&schema.to_hash()),
            claim_path_not_exists: with_not_exists.then(|| marshal::dec_u64(query.claim_path_not_exists())),
            claim_path_mtp: mtp,
            claim_path_mtp_no_aux: no_aux,
            claim_path_mtp_aux_hi: aux_hi,
            claim_path_mtp_aux_hv: aux_hv,
            claim_path_key: key,
            claim_path_value: value,
            operator: marshal::dec_u64(query.operator.code()),
            slot_index: marshal::dec_u64(query.slot_index),
            value: marshal::decs(&crate::query::pad_values(&query.values, VALUE_ARRAY_SIZE)?),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserAuthSignals {
    pub auth_claim: Vec<String>,
    pub auth_claim_inc_mtp: Vec<String>,
    pub auth_claim_non_rev_mtp: Vec<String>,
    pub auth_claim_non_rev_mtp_aux_hi: String,
    pub auth_claim_non_rev_mtp_aux_hv: String,
    pub auth_claim_non_rev_mtp_no_aux: String,
    pub challenge: String,
    pub challenge_signature_r8x: String,
    pub challenge_signature_r8y: String,
    pub challenge_signature_s: String,
    pub user_claims_tree_root: String,
    pub user_rev_tree_root: String,
    pub user_roots_tree_root: String,
    pub user_state: String,
    pub gist_root: String,
    pub gist_mtp: Vec<String>,
    pub gist_mtp_aux_hi: String,
    pub gist_mtp_aux_hv: String,
    pub gist_mtp_no_aux: String,
}

impl UserAuthSignals {
    /// On-chain auth group; zero-filled when `auth` is absent.
    pub fn new(auth: Option<&OnChainAuth>, challenge: &Hash, levels: &CircuitLevels) -> Result<Self, CircuitError> {
        let Some(auth) = auth else {
            let aux = marshal::zero_aux();
            let gist_aux = marshal::zero_aux();
            return Ok(Self {
                auth_claim: marshal::zero_claim(),
                auth_claim_inc_mtp: marshal::zeros(levels.identity),
                auth_claim_non_rev_mtp: marshal::zeros(levels.identity),
                auth_claim_non_rev_mtp_aux_hi: aux.key,
                auth_claim_non_rev_mtp_aux_hv: aux.value,
                auth_claim_non_rev_mtp_no_aux: aux.no_aux,
                challenge: marshal::dec(challenge),
                challenge_signature_r8x: "0".into(),
                challenge_signature_r8y: "0".into(),
                challenge_signature_s: "0".into(),
                user_claims_tree_root: "0".into(),
                user_rev_tree_root: "0".into(),
                user_roots_tree_root: "0".into(),
                user_state: "0".into(),
                gist_root: "0".into(),
                gist_mtp: marshal::zeros(levels.gist),
                gist_mtp_aux_hi: gist_aux.key,
                gist_mtp_aux_hv: gist_aux.value,
                gist_mtp_no_aux: gist_aux.no_aux,
            });
        };
        let aux = marshal::node_aux(&auth.auth_claim_non_rev_mtp);
        let gist_aux = marshal::node_aux(&auth.gist_proof.proof);
        let (r8x, r8y, s) = marshal::signature_parts(&auth.signature);
        let ts = &auth.tree_state;
        Ok(Self {
            auth_claim: marshal::claim_slots(&auth.auth_claim)?,
            auth_claim_inc_mtp: marshal::siblings(&auth.auth_claim_inc_mtp, levels.identity),
            auth_claim_non_rev_mtp: marshal::siblings(&auth.auth_claim_non_rev_mtp, levels.identity),
            auth_claim_non_rev_mtp_aux_hi: aux.key,
            auth_claim_non_rev_mtp_aux_hv: aux.value,
            auth_claim_non_rev_mtp_no_aux: aux.no_aux,
            challenge: marshal::dec(challenge),
            challenge_signature_r8x: r8x,
            challenge_signature_r8y: r8y,
            challenge_signature_s: s,
            user_claims_tree_root: marshal::dec(&ts.claims_root),
            user_rev_tree_root: marshal::dec(&ts.revocation_root),
            user_roots_tree_root: marshal::dec(&ts.root_of_roots),
            user_state: marshal::dec(&ts.state),
            gist_root: marshal::dec(&auth.gist_proof.root),
            gist_mtp: marshal::siblings(&auth.gist_proof.proof, levels.gist),
            gist_mtp_aux_hi: gist_aux.key,
            gist_mtp_aux_hv: gist_aux.value,
            gist_mtp_no_aux: gist_aux.no_aux,
        })
    }
}

/// Query signals exposed by the off-chain V2 circuits, in circuit order:
/// `claimSchema, claimPathNotExists, claimPathKey, slotIndex, operator, value[64]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPubSignals {
    /// Schema hash as a field element.
    pub claim_schema: Hash,
    /// Whether the merklized path was proven absent.
    pub claim_path_not_exists: bool,
    /// Claim path key, zero for slot queries.
    pub claim_path_key: Hash,
    /// Claim slot.
    pub slot_index: u64,
    /// Operator.
    pub operator: Operator,
    /// Padded value array.
    pub value: Vec<Hash>,
}

impl QueryPubSignals {
    pub(crate) fn read(r: &mut SignalReader) -> Result<Self, CircuitError> {
        let claim_schema = r.hash()?;
        let claim_path_not_exists = r.flag()?;
        let claim_path_key = r.hash()?;
        let slot_index = r.u64()?;
        let code = r.u64()?;
        let operator = Operator::from_code(code)
            .ok_or_else(|| CircuitError::InvalidPubSignals(format!("unknown operator code {code}")))?;
        let value = r.hashes(VALUE_ARRAY_SIZE)?;
        Ok(Self {
            claim_schema,
            claim_path_not_exists,
            claim_path_key,
            slot_index,
            operator,
            value,
        })
    }

    /// Check that the exposed query is `query` over `schema`.
    pub fn verify_query(&self, query: &Query, schema: &SchemaHash) -> Result<(), CircuitError> {
        let mismatch = |what: &str| Err(CircuitError::InvalidPubSignals(format!("{what} does not match the request")));
        if self.claim_schema != schema.to_hash() {
            return mismatch("claimSchema");
        }
        if self.slot_index != query.slot_index {
            return mismatch("slotIndex");
        }
        if self.operator != query.operator {
            return mismatch("operator");
        }
        if self.claim_path_key != query.claim_path_key() {
            return mismatch("claimPathKey");
        }
        if u64::from(self.claim_path_not_exists) != query.claim_path_not_exists() {
            return mismatch("claimPathNotExists");
        }
        if self.value != query.padded_values()? {
            return mismatch("value");
        }
        Ok(())
    }
}

/// Depths of every Merkle proof carried by an atomic query request.
pub fn claim_depths(
    non_rev: &MtProof,
    inc: Option<&MtProof>,
    sig: Option<&BjjSignatureClaim>,
    query: &Query,
) -> (usize, usize) {
    let mut identity = non_rev.proof.depth();
    if let Some(inc) = inc {
        identity = identity.max(inc.proof.depth());
    }
    if let Some(sig) = sig {
        identity = identity
            .max(sig.issuer_auth_inc_proof.proof.depth())
            .max(sig.issuer_auth_non_rev_proof.proof.depth());
    }
    let claim = query.value_proof.as_ref().map_or(0, |vp| vp.mtp.depth());
    (identity, claim)
}
