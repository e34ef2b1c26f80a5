//! # Circuit Claim Assembly
//!
//! Turns a prepared credential into the [`CircuitClaim`] a query circuit
//! consumes: the core claim, the issuer id, an inclusion proof (from the
//! `Iden3SparseMerkleTreeProof`), a signature bundle (from the
//! `BJJSignature2021` proof), and the core claim's non-revocation proof.
//!
//! ## Signature bundle
//!
//! The signature alone does not bind the issuer. The circuit also needs the
//! issuer's auth claim, its inclusion in the issuer's claims tree, and its
//! non-revocation. The last one is resolved for the issuer's auth claim
//! status (`issuerData.credentialStatus`), not for the subject claim.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zkid_core::{poseidon, Claim, Id, Proof, TreeState};
use zkid_crypto::{PublicKey, Signature};

use crate::credential::W3cCredential;
use crate::error::VcError;
use crate::status::{CredentialStatusResolver, RevocationStatus};

/// Which issuance proof a query circuit checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofType {
    /// Issuer BJJ signature over the claim.
    #[serde(rename = "BJJSignature2021")]
    Signature,
    /// Inclusion of the claim in the issuer's claims tree.
    #[serde(rename = "Iden3SparseMerkleTreeProof")]
    Mtp,
}

impl ProofType {
    /// The `proofType` circuit signal: 1 for signature, 2 for MTP.
    pub fn circuit_value(self) -> u64 {
        match self {
            ProofType::Signature => 1,
            ProofType::Mtp => 2,
        }
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofType::Signature => f.write_str("BJJSignature2021"),
            ProofType::Mtp => f.write_str("Iden3SparseMerkleTreeProof"),
        }
    }
}

/// A Merkle proof with the tree state it is against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtProof {
    /// Identity state the proof's root belongs to.
    pub tree_state: TreeState,
    /// The proof.
    pub proof: Proof,
}

impl From<RevocationStatus> for MtProof {
    fn from(status: RevocationStatus) -> Self {
        Self {
            tree_state: status.issuer,
            proof: status.mtp,
        }
    }
}

/// Issuer signature with the evidence binding the signing key to the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BjjSignatureClaim {
    /// Signature over `Poseidon(hi, hv)` of the core claim.
    pub signature: Signature,
    /// Issuer's auth claim holding the public key.
    pub issuer_auth_claim: Claim,
    /// Inclusion of the auth claim in the issuer's claims tree.
    pub issuer_auth_inc_proof: MtProof,
    /// Non-revocation of the auth claim.
    pub issuer_auth_non_rev_proof: MtProof,
}

impl BjjSignatureClaim {
    /// Whether the signature verifies over `claim` with the auth claim key.
    pub fn verifies(&self, claim: &Claim) -> bool {
        let check = || -> Result<bool, VcError> {
            let key = PublicKey::from_coordinates(
                self.issuer_auth_claim.slot(2)?,
                self.issuer_auth_claim.slot(3)?,
            )?;
            let (hi, hv) = claim.hi_hv()?;
            let msg = poseidon::hash(&[hi, hv])?;
            Ok(key.verify_poseidon(&msg, &self.signature))
        };
        check().unwrap_or(false)
    }
}

/// Everything a query circuit needs about one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitClaim {
    /// Issuer id.
    pub issuer_id: Id,
    /// Core claim.
    pub claim: Claim,
    /// Inclusion proof, when the credential carries one.
    pub inc_proof: Option<MtProof>,
    /// Non-revocation proof of the core claim.
    pub non_rev_proof: MtProof,
    /// Signature bundle, when the credential carries one.
    pub signature_proof: Option<BjjSignatureClaim>,
}

/// A credential with its core claim extracted and revocation resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCredential {
    /// The credential.
    pub credential: W3cCredential,
    /// Its revocation status.
    pub rev_status: RevocationStatus,
    /// Its core claim.
    pub core_claim: Claim,
}

impl PreparedCredential {
    /// Extract the core claim and resolve the revocation status.
    pub fn prepare(
        credential: W3cCredential,
        resolver: &dyn CredentialStatusResolver,
    ) -> Result<Self, VcError> {
        let core_claim = credential.core_claim()?;
        let issuer = credential.issuer_did()?;
        let rev_status = resolver.revocation_status(&credential.credential_status, &issuer)?;
        Ok(Self {
            credential,
            rev_status,
            core_claim,
        })
    }

    /// Attach an already-resolved revocation status.
    pub fn with_status(credential: W3cCredential, rev_status: RevocationStatus) -> Result<Self, VcError> {
        let core_claim = credential.core_claim()?;
        Ok(Self {
            credential,
            rev_status,
            core_claim,
        })
    }
}

/// Builds [`CircuitClaim`]s, resolving issuer auth claim status.
pub struct CircuitClaimBuilder<'a> {
    resolver: &'a dyn CredentialStatusResolver,
}

impl<'a> CircuitClaimBuilder<'a> {
    /// Builder resolving through `resolver`.
    pub fn new(resolver: &'a dyn CredentialStatusResolver) -> Self {
        Self { resolver }
    }

    /// Assemble the circuit claim for `prepared`.
    pub fn build(&self, prepared: &PreparedCredential) -> Result<CircuitClaim, VcError> {
        let credential = &prepared.credential;
        let issuer_did = credential.issuer_did()?;
        let issuer_id = Id::from_did(&issuer_did)?;

        let inc_proof = match credential.sparse_merkle_tree_proof() {
            Some(smt) => Some(MtProof {
                tree_state: smt.issuer_data.state.to_tree_state()?,
                proof: smt.mtp.clone(),
            }),
            None => None,
        };

        let signature_proof = match credential.bjj_signature_proof() {
            Some(sig) => {
                let issuer_data = &sig.issuer_data;
                let auth_mtp = issuer_data.mtp.clone().ok_or(VcError::IssuerAuthMissingMtp)?;
                let issuer_auth_claim = issuer_data
                    .auth_core_claim
                    .ok_or(VcError::IssuerAuthMissingCoreClaim)?;
                let auth_status = issuer_data
                    .credential_status
                    .as_ref()
                    .ok_or(VcError::MissingField("issuer auth credential status"))?;
                let auth_rev = self.resolver.revocation_status(auth_status, &issuer_data.id)?;
                debug!(
                    resolver = self.resolver.resolver_name(),
                    auth_nonce = auth_status.revocation_nonce,
                    revoked = auth_rev.is_revoked(),
                    "resolved issuer auth claim status"
                );
                Some(BjjSignatureClaim {
                    signature: sig.decoded_signature()?,
                    issuer_auth_claim,
                    issuer_auth_inc_proof: MtProof {
                        tree_state: issuer_data.state.to_tree_state()?,
                        proof: auth_mtp,
                    },
                    issuer_auth_non_rev_proof: auth_rev.into(),
                })
            }
            None => None,
        };

        Ok(CircuitClaim {
            issuer_id,
            claim: prepared.core_claim,
            inc_proof,
            non_rev_proof: prepared.rev_status.clone().into(),
            signature_proof,
        })
    }
}

/// Pick the proof type for a V3 query: an explicit request wins, then MTP
/// when attached, then signature when attached.
pub fn select_proof_type(requested: Option<ProofType>, claim: &CircuitClaim) -> Result<ProofType, VcError> {
    match requested {
        Some(ProofType::Mtp) if claim.inc_proof.is_none() => {
            Err(VcError::RequestedProofUnavailable(ProofType::Mtp))
        }
        Some(ProofType::Signature) if claim.signature_proof.is_none() => {
            Err(VcError::RequestedProofUnavailable(ProofType::Signature))
        }
        Some(explicit) => Ok(explicit),
        None if claim.inc_proof.is_some() => Ok(ProofType::Mtp),
        None if claim.signature_proof.is_some() => Ok(ProofType::Signature),
        None => Err(VcError::NoProof),
    }
}
