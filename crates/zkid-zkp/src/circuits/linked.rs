//! # Linked circuits
//!
//! `linkedMultiQuery{3,5,10}` evaluates up to N queries against one claim
//! and binds them to a V3 proof through the shared `linkID`.
//! `linkedNullifier` derives a verifier-scoped nullifier for the same
//! link. Unused query slots are zero-filled.

use serde::Serialize;
use zkid_core::{Claim, Hash, Id, SchemaHash};

use crate::circuits::marshal::{self, SignalReader};
use crate::circuits::{CircuitFamily, CircuitId, CircuitInputs, PubSignals};
use crate::error::CircuitError;
use crate::query::{query_hash_linked, verify_circuit_query_hash, Query, VALUE_ARRAY_SIZE};

/// Inputs of `linkedMultiQuery{3,5,10}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedMultiQueryInputs {
    /// Target build; fixes the query slot count.
    pub circuit_id: CircuitId,
    /// Nonce shared with the linked V3 proof.
    pub link_nonce: Hash,
    /// The claim all queries evaluate.
    pub claim: Claim,
    /// Queries, at most `circuit_id.max_queries()`.
    pub queries: Vec<Query>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkedMultiQueryWire {
    link_nonce: String,
    issuer_claim: Vec<String>,
    claim_schema: String,
    claim_path_mtp: Vec<Vec<String>>,
    claim_path_mtp_no_aux: Vec<String>,
    claim_path_mtp_aux_hi: Vec<String>,
    claim_path_mtp_aux_hv: Vec<String>,
    claim_path_key: Vec<String>,
    claim_path_value: Vec<String>,
    slot_index: Vec<String>,
    operator: Vec<String>,
    value: Vec<Vec<String>>,
    value_array_size: Vec<String>,
}

impl LinkedMultiQueryWire {
    fn with_slots(n: usize) -> Self {
        Self {
            link_nonce: String::new(),
            issuer_claim: Vec::new(),
            claim_schema: String::new(),
            claim_path_mtp: Vec::with_capacity(n),
            claim_path_mtp_no_aux: Vec::with_capacity(n),
            claim_path_mtp_aux_hi: Vec::with_capacity(n),
            claim_path_mtp_aux_hv: Vec::with_capacity(n),
            claim_path_key: Vec::with_capacity(n),
            claim_path_value: Vec::with_capacity(n),
            slot_index: Vec::with_capacity(n),
            operator: Vec::with_capacity(n),
            value: Vec::with_capacity(n),
            value_array_size: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, query: Option<&Query>, claim_levels: usize) -> Result<(), CircuitError> {
        let Some(query) = query else {
            let aux = marshal::zero_aux();
            self.claim_path_mtp.push(marshal::zeros(claim_levels));
            self.claim_path_mtp_no_aux.push(aux.no_aux);
            self.claim_path_mtp_aux_hi.push(aux.key);
            self.claim_path_mtp_aux_hv.push(aux.value);
            self.claim_path_key.push("0".into());
            self.claim_path_value.push("0".into());
            self.slot_index.push("0".into());
            self.operator.push("0".into());
            self.value.push(marshal::zeros(VALUE_ARRAY_SIZE));
            self.value_array_size.push("0".into());
            return Ok(());
        };
        match &query.value_proof {
            Some(vp) => {
                let aux = marshal::node_aux(&vp.mtp);
                self.claim_path_mtp.push(marshal::siblings(&vp.mtp, claim_levels));
                self.claim_path_mtp_no_aux.push(aux.no_aux);
                self.claim_path_mtp_aux_hi.push(aux.key);
                self.claim_path_mtp_aux_hv.push(aux.value);
                self.claim_path_key.push(marshal::dec(&vp.path));
                self.claim_path_value.push(marshal::dec(&vp.value));
            }
            None => {
                let aux = marshal::zero_aux();
                self.claim_path_mtp.push(marshal::zeros(claim_levels));
                self.claim_path_mtp_no_aux.push(aux.no_aux);
                self.claim_path_mtp_aux_hi.push(aux.key);
                self.claim_path_mtp_aux_hv.push(aux.value);
                self.claim_path_key.push("0".into());
                self.claim_path_value.push("0".into());
            }
        }
        self.slot_index.push(marshal::dec_u64(query.slot_index));
        self.operator.push(marshal::dec_u64(query.operator.code()));
        self.value.push(marshal::decs(&query.padded_values()?));
        self.value_array_size.push(marshal::dec_u64(query.values.len() as u64));
        Ok(())
    }
}

impl CircuitInputs for LinkedMultiQueryInputs {
    fn circuit_id(&self) -> CircuitId {
        self.circuit_id
    }

    fn validate(&self) -> Result<(), CircuitError> {
        if self.circuit_id.family() != CircuitFamily::LinkedMultiQuery {
            return Err(CircuitError::InvalidInput(format!(
                "{} is not a linked multi-query circuit",
                self.circuit_id
            )));
        }
        self.circuit_id.check_query_count(self.queries.len())?;
        for query in &self.queries {
            self.circuit_id.check_operator(query.operator)?;
            query.padded_values()?;
        }
        Ok(())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let slots = self.circuit_id.max_queries();
        let claim_levels = self.circuit_id.levels().claim;
        let mut wire = LinkedMultiQueryWire::with_slots(slots);
        wire.link_nonce = marshal::dec(&self.link_nonce);
        wire.issuer_claim = marshal::claim_slots(&self.claim)?;
        wire.claim_schema = marshal::dec(&self.claim.schema_hash().to_hash());
        for i in 0..slots {
            wire.push(self.queries.get(i), claim_levels)?;
        }
        marshal::to_json(&wire)
    }
}

/// Public signals of `linkedMultiQuery{3,5,10}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedMultiQueryPubSignals {
    /// Link id shared with the V3 proof.
    pub link_id: Hash,
    /// Whether the claim is merklized.
    pub merklized: bool,
    /// Per-slot operator outputs.
    pub operator_output: Vec<Hash>,
    /// Per-slot query hashes.
    pub circuit_query_hash: Vec<Hash>,
}

impl LinkedMultiQueryPubSignals {
    /// Unmarshal the signals of an N-query build.
    pub fn unmarshal_for(data: &[u8], circuit: CircuitId) -> Result<Self, CircuitError> {
        if circuit.family() != CircuitFamily::LinkedMultiQuery {
            return Err(CircuitError::InvalidPubSignals(format!(
                "{circuit} is not a linked multi-query circuit"
            )));
        }
        let n = circuit.max_queries();
        let mut r = SignalReader::new(data, 2 + 2 * n, circuit.as_str())?;
        Ok(Self {
            link_id: r.hash()?,
            merklized: r.flag()?,
            operator_output: r.hashes(n)?,
            circuit_query_hash: r.hashes(n)?,
        })
    }

    /// Check that the first `queries.len()` slot hashes commit to
    /// `queries` over `schema`.
    pub fn verify_query_hashes(&self, queries: &[Query], schema: &SchemaHash) -> Result<(), CircuitError> {
        if queries.len() > self.circuit_query_hash.len() {
            return Err(CircuitError::InvalidPubSignals(format!(
                "{} queries for {} slots",
                queries.len(),
                self.circuit_query_hash.len()
            )));
        }
        for (query, signal) in queries.iter().zip(&self.circuit_query_hash) {
            let expected = query_hash_linked(
                &query.values,
                schema.to_hash(),
                query.slot_index,
                query.operator,
                query.claim_path_key(),
                u64::from(self.merklized),
            )?;
            verify_circuit_query_hash(signal, &expected)?;
        }
        Ok(())
    }
}

/// Inputs of `linkedNullifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedNullifierInputs {
    /// Nonce shared with the linked V3 proof.
    pub link_nonce: Hash,
    /// The claim the nullifier is derived from.
    pub claim: Claim,
    /// Prover genesis id.
    pub id: Id,
    /// Profile nonce of the credential subject.
    pub claim_subject_profile_nonce: Hash,
    /// Verifier the nullifier is scoped to.
    pub verifier_id: Id,
    /// Nullifier session id; must be non-zero.
    pub nullifier_session_id: Hash,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkedNullifierWire {
    link_nonce: String,
    issuer_claim: Vec<String>,
    #[serde(rename = "userGenesisID")]
    user_genesis_id: String,
    claim_subject_profile_nonce: String,
    claim_schema: String,
    #[serde(rename = "verifierID")]
    verifier_id: String,
    #[serde(rename = "nullifierSessionID")]
    nullifier_session_id: String,
}

impl CircuitInputs for LinkedNullifierInputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::LinkedNullifier
    }

    fn validate(&self) -> Result<(), CircuitError> {
        if self.nullifier_session_id.is_zero() {
            return Err(CircuitError::MissingInput("nullifierSessionID"));
        }
        Ok(())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        marshal::to_json(&LinkedNullifierWire {
            link_nonce: marshal::dec(&self.link_nonce),
            issuer_claim: marshal::claim_slots(&self.claim)?,
            user_genesis_id: marshal::id_dec(&self.id),
            claim_subject_profile_nonce: marshal::dec(&self.claim_subject_profile_nonce),
            claim_schema: marshal::dec(&self.claim.schema_hash().to_hash()),
            verifier_id: marshal::id_dec(&self.verifier_id),
            nullifier_session_id: marshal::dec(&self.nullifier_session_id),
        })
    }
}

/// Public signals of `linkedNullifier`:
/// `[nullifier, linkID, verifierID, nullifierSessionID]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedNullifierPubSignals {
    /// Verifier-scoped nullifier.
    pub nullifier: Hash,
    /// Link id shared with the V3 proof.
    pub link_id: Hash,
    /// Verifier id.
    pub verifier_id: Id,
    /// Session id.
    pub nullifier_session_id: Hash,
}

impl PubSignals for LinkedNullifierPubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 4, "linkedNullifier")?;
        Ok(Self {
            nullifier: r.hash()?,
            link_id: r.hash()?,
            verifier_id: r.id()?,
            nullifier_session_id: r.hash()?,
        })
    }
}
