//! # W3C Credential
//!
//! The credential envelope as issued by iden3 issuers. The envelope is
//! rigid; `credentialSubject` stays an open JSON object because its fields
//! are defined by the credential schema.
//!
//! ## Field Naming
//!
//! Serde rename attributes map between Rust snake_case and the W3C JSON
//! field names (camelCase / `@`-prefixed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zkid_core::{Claim, Did};

use crate::error::VcError;
use crate::proof::{BjjSignatureProof, CredentialProof, SparseMerkleTreeProof};
use crate::status::CredentialStatus;

/// A W3C verifiable credential with iden3 proofs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct W3cCredential {
    /// Credential identifier.
    pub id: String,

    /// JSON-LD context URIs.
    #[serde(rename = "@context")]
    pub context: Vec<serde_json::Value>,

    /// Credential types, including `VerifiableCredential`.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,

    /// Issuer DID.
    pub issuer: String,

    /// Issuance time.
    #[serde(rename = "issuanceDate", default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<DateTime<Utc>>,

    /// Expiration time.
    #[serde(rename = "expirationDate", default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,

    /// Schema-defined subject fields, including the subject `id`.
    #[serde(rename = "credentialSubject")]
    pub credential_subject: serde_json::Value,

    /// Where the revocation nonce is checked.
    #[serde(rename = "credentialStatus")]
    pub credential_status: CredentialStatus,

    /// Schema reference.
    #[serde(rename = "credentialSchema", default, skip_serializing_if = "Option::is_none")]
    pub credential_schema: Option<serde_json::Value>,

    /// Embedded proofs.
    #[serde(default, skip_serializing_if = "ProofValue::is_empty")]
    pub proof: ProofValue,
}

/// Proof value: a single proof object or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProofValue {
    /// A single proof object.
    Single(Box<CredentialProof>),
    /// An array of proof objects.
    Array(Vec<CredentialProof>),
}

impl Default for ProofValue {
    fn default() -> Self {
        Self::Array(Vec::new())
    }
}

impl ProofValue {
    /// Returns `true` if there are no proofs.
    pub fn is_empty(&self) -> bool {
        match self {
            ProofValue::Single(_) => false,
            ProofValue::Array(arr) => arr.is_empty(),
        }
    }

    /// Normalize to a list of proof references.
    pub fn as_list(&self) -> Vec<&CredentialProof> {
        match self {
            ProofValue::Single(p) => vec![p.as_ref()],
            ProofValue::Array(arr) => arr.iter().collect(),
        }
    }
}

impl W3cCredential {
    /// Issuer DID, validated.
    pub fn issuer_did(&self) -> Result<Did, VcError> {
        Ok(Did::new(self.issuer.clone())?)
    }

    /// Subject DID from `credentialSubject.id`, if present.
    pub fn subject_did(&self) -> Result<Option<Did>, VcError> {
        match self.credential_subject.get("id") {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(Did::new(s.clone())?)),
            Some(other) => Err(VcError::InvalidCredential(format!(
                "credentialSubject.id must be a string, got {other}"
            ))),
        }
    }

    /// A subject field by name.
    pub fn subject_field(&self, name: &str) -> Option<&serde_json::Value> {
        self.credential_subject.get(name)
    }

    /// The claims-tree inclusion proof, if attached.
    pub fn sparse_merkle_tree_proof(&self) -> Option<&SparseMerkleTreeProof> {
        self.proof.as_list().into_iter().find_map(|p| match p {
            CredentialProof::SparseMerkleTree(smt) => Some(smt),
            _ => None,
        })
    }

    /// The BJJ signature proof, if attached.
    pub fn bjj_signature_proof(&self) -> Option<&BjjSignatureProof> {
        self.proof.as_list().into_iter().find_map(|p| match p {
            CredentialProof::BjjSignature(sig) => Some(sig),
            _ => None,
        })
    }

    /// The core claim, taken from the inclusion proof when present and from
    /// the signature proof otherwise.
    pub fn core_claim(&self) -> Result<Claim, VcError> {
        self.sparse_merkle_tree_proof()
            .map(|p| p.core_claim)
            .or_else(|| self.bjj_signature_proof().map(|p| p.core_claim))
            .ok_or(VcError::NoProof)
    }

    /// Whether the credential has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| exp <= now)
    }
}
