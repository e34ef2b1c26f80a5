//! Zero-knowledge proof requests as carried in authorization and
//! contract-invoke messages.

use serde::{Deserialize, Serialize};
use zkid_core::Hash;
use zkid_vc::ProofType;
use zkid_zkp::CircuitId;

use crate::error::GenerationError;

/// One proof request of a verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    /// Request id, exposed as the `requestID` signal.
    pub id: u64,
    /// Circuit to prove with.
    pub circuit_id: CircuitId,
    /// Whether the verifier accepts a response without this proof.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Credential query.
    #[serde(default)]
    pub query: QueryRequest,
    /// Circuit parameters.
    #[serde(default)]
    pub params: RequestParams,
}

/// Credential selection and predicates of a proof request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Accepted issuer DIDs; `*` accepts any issuer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_issuers: Vec<String>,
    /// JSON-LD context of the credential type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Credential type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    /// `{"field": {"$op": value}}` predicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_subject: Option<serde_json::Map<String, serde_json::Value>>,
    /// Issuance proof the verifier requires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_type: Option<ProofType>,
    /// Skip the non-revocation check of the credential.
    #[serde(default)]
    pub skip_claim_revocation_check: bool,
    /// Links requests that must be answered from one credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
}

/// Optional circuit parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    /// Session id for nullifier derivation, decimal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier_session_id: Option<String>,
}

impl ProofRequest {
    /// The request id as a field element.
    pub fn request_id(&self) -> Hash {
        Hash::from_u64(self.id)
    }

    /// The nullifier session id, zero when absent.
    pub fn nullifier_session_id(&self) -> Result<Hash, GenerationError> {
        match self.params.nullifier_session_id.as_deref() {
            None | Some("") => Ok(Hash::ZERO),
            Some(text) => Hash::from_decimal(text)
                .map_err(|e| GenerationError::validation(format!("nullifierSessionId: {e}"))),
        }
    }

    /// Whether `issuer` is accepted by the request.
    pub fn accepts_issuer(&self, issuer: &str) -> bool {
        let allowed = &self.query.allowed_issuers;
        allowed.is_empty() || allowed.iter().any(|a| a == "*" || a == issuer)
    }
}
