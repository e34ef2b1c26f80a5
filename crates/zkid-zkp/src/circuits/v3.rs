//! # `credentialAtomicQueryV3` and its on-chain build
//!
//! One circuit covers both issuance proofs: `proofType` selects the MTP
//! (2) or signature (1) branch and the other branch is zero-filled. V3 adds
//! profile linking (`linkNonce` → `linkID`), verifier-scoped nullifiers,
//! and the full operator set. Every depth build (`-16-16-64`, `-8-8-64`,
//! on-chain `-16-16-64-16-32`, `-8-8-64-8-32`) shares this layout; the
//! inputs carry the target id and marshal to its array lengths.

use serde::Serialize;
use zkid_core::{Hash, Id, SchemaHash};
use zkid_vc::{CircuitClaim, ProofType};

use crate::circuits::atomic::{
    InclusionSignals, NonRevSignals, OnChainAuth, QuerySignals, RequestSignals, SignatureSignals, UserAuthSignals,
};
use crate::circuits::marshal::{self, SignalReader};
use crate::circuits::{CircuitFamily, CircuitId, CircuitInputs, PubSignals};
use crate::error::CircuitError;
use crate::query::{verify_circuit_query_hash, Query};

/// Inputs of `credentialAtomicQueryV3` and its depth builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryV3Inputs {
    /// Target build.
    pub circuit_id: CircuitId,
    /// Verifier request id.
    pub request_id: Hash,
    /// Prover genesis id.
    pub id: Id,
    /// Prover profile nonce.
    pub profile_nonce: Hash,
    /// Profile nonce of the credential subject.
    pub claim_subject_profile_nonce: Hash,
    /// Claim with its proofs.
    pub claim: CircuitClaim,
    /// Issuance proof the circuit checks.
    pub proof_type: ProofType,
    /// Skip the non-revocation check in-circuit.
    pub skip_claim_revocation_check: bool,
    /// Unix seconds.
    pub current_timestamp: i64,
    /// The query.
    pub query: Query,
    /// Nonce for the `linkID` output; zero disables linking.
    pub link_nonce: Hash,
    /// Verifier id for nullifiers.
    pub verifier_id: Option<Id>,
    /// Nullifier session id; zero disables the nullifier.
    pub nullifier_session_id: Hash,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct V3Wire {
    #[serde(flatten)]
    request: RequestSignals,
    #[serde(flatten)]
    non_rev: NonRevSignals,
    #[serde(flatten)]
    inclusion: InclusionSignals,
    #[serde(flatten)]
    signature: SignatureSignals,
    #[serde(flatten)]
    query: QuerySignals,
    proof_type: String,
    link_nonce: String,
    #[serde(rename = "verifierID")]
    verifier_id: String,
    #[serde(rename = "nullifierSessionID")]
    nullifier_session_id: String,
    value_array_size: String,
}

impl AtomicQueryV3Inputs {
    fn validate_for(&self, family: CircuitFamily) -> Result<(), CircuitError> {
        if self.circuit_id.family() != family {
            return Err(CircuitError::InvalidInput(format!(
                "{} is not a {family:?} circuit",
                self.circuit_id
            )));
        }
        match self.proof_type {
            ProofType::Mtp if self.claim.inc_proof.is_none() => {
                return Err(CircuitError::MissingInput("issuerClaimMtp"));
            }
            ProofType::Signature if self.claim.signature_proof.is_none() => {
                return Err(CircuitError::MissingInput("issuerClaimSignature"));
            }
            _ => {}
        }
        self.circuit_id.check_operator(self.query.operator)?;
        self.query.padded_values()?;
        Ok(())
    }

    fn wire(&self) -> Result<V3Wire, CircuitError> {
        let levels = self.circuit_id.levels();
        let claim = &self.claim;
        let (inc, sig) = match self.proof_type {
            ProofType::Mtp => (claim.inc_proof.as_ref(), None),
            ProofType::Signature => (None, claim.signature_proof.as_ref()),
        };
        Ok(V3Wire {
            request: RequestSignals::new(
                &self.request_id,
                &self.id,
                &self.profile_nonce,
                &self.claim_subject_profile_nonce,
                &claim.issuer_id,
                &claim.claim,
                self.skip_claim_revocation_check,
                self.current_timestamp,
            )?,
            non_rev: NonRevSignals::new(&claim.non_rev_proof, &levels),
            inclusion: InclusionSignals::new(inc, &levels),
            signature: SignatureSignals::new(sig, &levels, true)?,
            query: QuerySignals::new(&self.query, &claim.claim.schema_hash(), &levels, false)?,
            proof_type: marshal::dec_u64(self.proof_type.circuit_value()),
            link_nonce: marshal::dec(&self.link_nonce),
            verifier_id: self.verifier_id.as_ref().map_or_else(|| "0".to_string(), marshal::id_dec),
            nullifier_session_id: marshal::dec(&self.nullifier_session_id),
            value_array_size: marshal::dec_u64(self.query.values.len() as u64),
        })
    }
}

impl CircuitInputs for AtomicQueryV3Inputs {
    fn circuit_id(&self) -> CircuitId {
        self.circuit_id
    }

    fn validate(&self) -> Result<(), CircuitError> {
        self.validate_for(CircuitFamily::AtomicQueryV3)
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        marshal::to_json(&self.wire()?)
    }
}

/// Inputs of `credentialAtomicQueryV3OnChain` and its depth builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryV3OnChainInputs {
    /// Query inputs; `circuit_id` names the on-chain build.
    pub query_inputs: AtomicQueryV3Inputs,
    /// Prover auth and GIST proofs; `None` disables BJJ auth.
    pub auth: Option<OnChainAuth>,
    /// Challenge signed by the prover.
    pub challenge: Hash,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct V3OnChainWire {
    #[serde(flatten)]
    base: V3Wire,
    #[serde(flatten)]
    auth: UserAuthSignals,
    #[serde(rename = "isBJJAuthEnabled")]
    is_bjj_auth_enabled: String,
}

impl CircuitInputs for AtomicQueryV3OnChainInputs {
    fn circuit_id(&self) -> CircuitId {
        self.query_inputs.circuit_id
    }

    fn validate(&self) -> Result<(), CircuitError> {
        self.query_inputs.validate_for(CircuitFamily::AtomicQueryV3OnChain)
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let levels = self.circuit_id().levels();
        marshal::to_json(&V3OnChainWire {
            base: self.query_inputs.wire()?,
            auth: UserAuthSignals::new(self.auth.as_ref(), &self.challenge, &levels)?,
            is_bjj_auth_enabled: marshal::flag(self.auth.is_some()),
        })
    }
}

/// Query outputs shared by both V3 public signal layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Outputs {
    /// Prover profile id.
    pub user_id: Id,
    /// Query commitment.
    pub circuit_query_hash: Hash,
    /// Issuer state checked by the selected branch.
    pub issuer_state: Hash,
    /// Profile link id; zero when linking is off.
    pub link_id: Hash,
    /// Nullifier; zero when disabled.
    pub nullifier: Hash,
    /// Disclosed value for selective disclosure, zero otherwise.
    pub operator_output: Hash,
    /// Issuance proof type.
    pub proof_type: ProofType,
}

impl V3Outputs {
    fn read(r: &mut SignalReader) -> Result<Self, CircuitError> {
        Ok(Self {
            user_id: r.id()?,
            circuit_query_hash: r.hash()?,
            issuer_state: r.hash()?,
            link_id: r.hash()?,
            nullifier: r.hash()?,
            operator_output: r.hash()?,
            proof_type: match r.u64()? {
                1 => ProofType::Signature,
                2 => ProofType::Mtp,
                other => {
                    return Err(CircuitError::InvalidPubSignals(format!("unknown proofType {other}")));
                }
            },
        })
    }
}

/// Public signals of `credentialAtomicQueryV3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryV3PubSignals {
    /// Circuit outputs.
    pub outputs: V3Outputs,
    /// Verifier request id.
    pub request_id: Hash,
    /// Issuer id.
    pub issuer_id: Id,
    /// Whether revocation was checked.
    pub is_revocation_checked: bool,
    /// Issuer state for the non-revocation proof.
    pub issuer_claim_non_rev_state: Hash,
    /// Unix seconds.
    pub timestamp: u64,
    /// Verifier id, when nullifiers are in use.
    pub verifier_id: Option<Id>,
    /// Nullifier session id.
    pub nullifier_session_id: Hash,
}

impl AtomicQueryV3PubSignals {
    /// Check that `circuitQueryHash` commits to `query` over `schema` with
    /// this proof's revocation and nullifier parameters.
    pub fn verify_query_hash(&self, query: &Query, schema: &SchemaHash) -> Result<(), CircuitError> {
        let verifier = self.verifier_id.as_ref().map_or(Hash::ZERO, Id::to_hash);
        let expected = query.hash_v3(
            schema,
            query.is_merklized(),
            self.is_revocation_checked,
            verifier,
            self.nullifier_session_id,
        )?;
        verify_circuit_query_hash(&self.outputs.circuit_query_hash, &expected)
    }
}

fn optional_id(r: &mut SignalReader) -> Result<Option<Id>, CircuitError> {
    let value = r.hash()?;
    if value.is_zero() {
        return Ok(None);
    }
    Ok(Some(Id::from_hash(&value)?))
}

impl PubSignals for AtomicQueryV3PubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 14, "credentialAtomicQueryV3")?;
        Ok(Self {
            outputs: V3Outputs::read(&mut r)?,
            request_id: r.hash()?,
            issuer_id: r.id()?,
            is_revocation_checked: r.flag()?,
            issuer_claim_non_rev_state: r.hash()?,
            timestamp: r.u64()?,
            verifier_id: optional_id(&mut r)?,
            nullifier_session_id: r.hash()?,
        })
    }
}

/// Public signals of `credentialAtomicQueryV3OnChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryV3OnChainPubSignals {
    /// Circuit outputs.
    pub outputs: V3Outputs,
    /// Verifier request id.
    pub request_id: Hash,
    /// Challenge the prover signed.
    pub challenge: Hash,
    /// GIST root of the prover's state proof.
    pub gist_root: Hash,
    /// Issuer id.
    pub issuer_id: Id,
    /// Whether revocation was checked.
    pub is_revocation_checked: bool,
    /// Issuer state for the non-revocation proof.
    pub issuer_claim_non_rev_state: Hash,
    /// Unix seconds.
    pub timestamp: u64,
    /// Whether the prover authenticated with a BJJ key.
    pub is_bjj_auth_enabled: bool,
}

impl AtomicQueryV3OnChainPubSignals {
    /// Check that `circuitQueryHash` commits to `query` over `schema`. The
    /// on-chain layout does not expose the verifier id or session id, so
    /// the caller supplies the values it requested.
    pub fn verify_query_hash(
        &self,
        query: &Query,
        schema: &SchemaHash,
        verifier_id: Option<&Id>,
        nullifier_session_id: Hash,
    ) -> Result<(), CircuitError> {
        let verifier = verifier_id.map_or(Hash::ZERO, Id::to_hash);
        let expected = query.hash_v3(
            schema,
            query.is_merklized(),
            self.is_revocation_checked,
            verifier,
            nullifier_session_id,
        )?;
        verify_circuit_query_hash(&self.outputs.circuit_query_hash, &expected)
    }
}

impl PubSignals for AtomicQueryV3OnChainPubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 15, "credentialAtomicQueryV3OnChain")?;
        Ok(Self {
            outputs: V3Outputs::read(&mut r)?,
            request_id: r.hash()?,
            challenge: r.hash()?,
            gist_root: r.hash()?,
            issuer_id: r.id()?,
            is_revocation_checked: r.flag()?,
            issuer_claim_non_rev_state: r.hash()?,
            timestamp: r.u64()?,
            is_bjj_auth_enabled: r.flag()?,
        })
    }
}
