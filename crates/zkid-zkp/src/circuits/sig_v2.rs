//! `credentialAtomicQuerySigV2` and its on-chain build: proves a query over
//! a claim signed by a key whose auth claim is in the issuer's claims tree.

use serde::Serialize;
use zkid_core::{Hash, Id, SchemaHash};
use zkid_vc::CircuitClaim;

use crate::circuits::atomic::{
    NonRevSignals, OnChainAuth, QueryPubSignals, QuerySignals, RequestSignals, SignatureSignals, UserAuthSignals,
};
use crate::circuits::marshal::{self, SignalReader};
use crate::circuits::{CircuitId, CircuitInputs, PubSignals};
use crate::error::CircuitError;
use crate::query::{verify_circuit_query_hash, Query, VALUE_ARRAY_SIZE};

/// Inputs of `credentialAtomicQuerySigV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQuerySigV2Inputs {
    /// Verifier request id.
    pub request_id: Hash,
    /// Prover genesis id.
    pub id: Id,
    /// Prover profile nonce.
    pub profile_nonce: Hash,
    /// Profile nonce of the credential subject.
    pub claim_subject_profile_nonce: Hash,
    /// Claim with its proofs; `signature_proof` is required.
    pub claim: CircuitClaim,
    /// Skip the non-revocation check in-circuit.
    pub skip_claim_revocation_check: bool,
    /// Unix seconds.
    pub current_timestamp: i64,
    /// The query.
    pub query: Query,
}

impl AtomicQuerySigV2Inputs {
    fn validate_for(&self, circuit: CircuitId) -> Result<(), CircuitError> {
        if self.claim.signature_proof.is_none() {
            return Err(CircuitError::MissingInput("issuerClaimSignature"));
        }
        circuit.check_operator(self.query.operator)?;
        self.query.padded_values()?;
        Ok(())
    }

    fn signal_groups(
        &self,
        circuit: CircuitId,
    ) -> Result<(RequestSignals, NonRevSignals, SignatureSignals, QuerySignals), CircuitError> {
        let levels = circuit.levels();
        let claim = &self.claim;
        Ok((
            RequestSignals::new(
                &self.request_id,
                &self.id,
                &self.profile_nonce,
                &self.claim_subject_profile_nonce,
                &claim.issuer_id,
                &claim.claim,
                self.skip_claim_revocation_check,
                self.current_timestamp,
            )?,
            NonRevSignals::new(&claim.non_rev_proof, &levels),
            SignatureSignals::new(claim.signature_proof.as_ref(), &levels, false)?,
            QuerySignals::new(&self.query, &claim.claim.schema_hash(), &levels, true)?,
        ))
    }
}

#[derive(Serialize)]
struct SigV2Wire {
    #[serde(flatten)]
    request: RequestSignals,
    #[serde(flatten)]
    non_rev: NonRevSignals,
    #[serde(flatten)]
    signature: SignatureSignals,
    #[serde(flatten)]
    query: QuerySignals,
}

impl CircuitInputs for AtomicQuerySigV2Inputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::AtomicQuerySigV2
    }

    fn validate(&self) -> Result<(), CircuitError> {
        self.validate_for(self.circuit_id())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let (request, non_rev, signature, query) = self.signal_groups(self.circuit_id())?;
        marshal::to_json(&SigV2Wire {
            request,
            non_rev,
            signature,
            query,
        })
    }
}

/// Inputs of `credentialAtomicQuerySigV2OnChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQuerySigV2OnChainInputs {
    /// The off-chain query inputs.
    pub query_inputs: AtomicQuerySigV2Inputs,
    /// Prover auth and GIST proofs.
    pub auth: OnChainAuth,
    /// Challenge signed by the prover.
    pub challenge: Hash,
}

#[derive(Serialize)]
struct SigV2OnChainWire {
    #[serde(flatten)]
    request: RequestSignals,
    #[serde(flatten)]
    non_rev: NonRevSignals,
    #[serde(flatten)]
    signature: SignatureSignals,
    #[serde(flatten)]
    query: QuerySignals,
    #[serde(flatten)]
    auth: UserAuthSignals,
}

impl CircuitInputs for AtomicQuerySigV2OnChainInputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::AtomicQuerySigV2OnChain
    }

    fn validate(&self) -> Result<(), CircuitError> {
        self.query_inputs.validate_for(self.circuit_id())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let circuit = self.circuit_id();
        let (request, non_rev, signature, query) = self.query_inputs.signal_groups(circuit)?;
        marshal::to_json(&SigV2OnChainWire {
            request,
            non_rev,
            signature,
            query,
            auth: UserAuthSignals::new(Some(&self.auth), &self.challenge, &circuit.levels())?,
        })
    }
}

/// Public signals of `credentialAtomicQuerySigV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQuerySigV2PubSignals {
    /// Whether the claim is merklized.
    pub merklized: bool,
    /// Prover profile id.
    pub user_id: Id,
    /// Issuer state holding the signing key's auth claim.
    pub issuer_auth_state: Hash,
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
    /// Exposed query.
    pub query: QueryPubSignals,
}

impl PubSignals for AtomicQuerySigV2PubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 13 + VALUE_ARRAY_SIZE, "credentialAtomicQuerySigV2")?;
        Ok(Self {
            merklized: r.flag()?,
            user_id: r.id()?,
            issuer_auth_state: r.hash()?,
            request_id: r.hash()?,
            issuer_id: r.id()?,
            is_revocation_checked: r.flag()?,
            issuer_claim_non_rev_state: r.hash()?,
            timestamp: r.u64()?,
            query: QueryPubSignals::read(&mut r)?,
        })
    }
}

/// Public signals of `credentialAtomicQuerySigV2OnChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQuerySigV2OnChainPubSignals {
    /// Whether the claim is merklized.
    pub merklized: bool,
    /// Prover profile id.
    pub user_id: Id,
    /// Query commitment.
    pub circuit_query_hash: Hash,
    /// Issuer state holding the signing key's auth claim.
    pub issuer_auth_state: Hash,
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
}

impl AtomicQuerySigV2OnChainPubSignals {
    /// Check that `circuitQueryHash` commits to `query` over `schema`.
    pub fn verify_query_hash(&self, query: &Query, schema: &SchemaHash) -> Result<(), CircuitError> {
        verify_circuit_query_hash(&self.circuit_query_hash, &query.hash_v2(schema)?)
    }
}

impl PubSignals for AtomicQuerySigV2OnChainPubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 11, "credentialAtomicQuerySigV2OnChain")?;
        Ok(Self {
            merklized: r.flag()?,
            user_id: r.id()?,
            circuit_query_hash: r.hash()?,
            issuer_auth_state: r.hash()?,
            request_id: r.hash()?,
            challenge: r.hash()?,
            gist_root: r.hash()?,
            issuer_id: r.id()?,
            is_revocation_checked: r.flag()?,
            issuer_claim_non_rev_state: r.hash()?,
            timestamp: r.u64()?,
        })
    }
}
