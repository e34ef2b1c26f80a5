//! `credentialAtomicQueryMTPV2` and its on-chain build: proves a query over
//! a claim included in the issuer's claims tree.

use serde::Serialize;
use zkid_core::{Hash, Id, SchemaHash};
use zkid_vc::CircuitClaim;

use crate::circuits::atomic::{
    InclusionSignals, NonRevSignals, OnChainAuth, QueryPubSignals, QuerySignals, RequestSignals, UserAuthSignals,
};
use crate::circuits::marshal::{self, SignalReader};
use crate::circuits::{CircuitId, CircuitInputs, PubSignals};
use crate::error::CircuitError;
use crate::query::{verify_circuit_query_hash, Query};

/// Inputs of `credentialAtomicQueryMTPV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryMtpV2Inputs {
    /// Verifier request id.
    pub request_id: Hash,
    /// Prover genesis id.
    pub id: Id,
    /// Prover profile nonce.
    pub profile_nonce: Hash,
    /// Profile nonce of the credential subject.
    pub claim_subject_profile_nonce: Hash,
    /// Claim with its proofs; `inc_proof` is required.
    pub claim: CircuitClaim,
    /// Skip the non-revocation check in-circuit.
    pub skip_claim_revocation_check: bool,
    /// Unix seconds.
    pub current_timestamp: i64,
    /// The query.
    pub query: Query,
}

impl AtomicQueryMtpV2Inputs {
    fn validate_for(&self, circuit: CircuitId) -> Result<(), CircuitError> {
        if self.claim.inc_proof.is_none() {
            return Err(CircuitError::MissingInput("issuerClaimMtp"));
        }
        circuit.check_operator(self.query.operator)?;
        self.query.padded_values()?;
        Ok(())
    }

    fn signal_groups(
        &self,
        circuit: CircuitId,
    ) -> Result<(RequestSignals, InclusionSignals, NonRevSignals, QuerySignals), CircuitError> {
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
            InclusionSignals::new(claim.inc_proof.as_ref(), &levels),
            NonRevSignals::new(&claim.non_rev_proof, &levels),
            QuerySignals::new(&self.query, &claim.claim.schema_hash(), &levels, true)?,
        ))
    }
}

#[derive(Serialize)]
struct MtpV2Wire {
    #[serde(flatten)]
    request: RequestSignals,
    #[serde(flatten)]
    inclusion: InclusionSignals,
    #[serde(flatten)]
    non_rev: NonRevSignals,
    #[serde(flatten)]
    query: QuerySignals,
}

impl CircuitInputs for AtomicQueryMtpV2Inputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::AtomicQueryMtpV2
    }

    fn validate(&self) -> Result<(), CircuitError> {
        self.validate_for(self.circuit_id())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let (request, inclusion, non_rev, query) = self.signal_groups(self.circuit_id())?;
        marshal::to_json(&MtpV2Wire {
            request,
            inclusion,
            non_rev,
            query,
        })
    }
}

/// Inputs of `credentialAtomicQueryMTPV2OnChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryMtpV2OnChainInputs {
    /// The off-chain query inputs.
    pub query_inputs: AtomicQueryMtpV2Inputs,
    /// Prover auth and GIST proofs.
    pub auth: OnChainAuth,
    /// Challenge signed by the prover, typically the sender address.
    pub challenge: Hash,
}

#[derive(Serialize)]
struct MtpV2OnChainWire {
    #[serde(flatten)]
    request: RequestSignals,
    #[serde(flatten)]
    inclusion: InclusionSignals,
    #[serde(flatten)]
    non_rev: NonRevSignals,
    #[serde(flatten)]
    query: QuerySignals,
    #[serde(flatten)]
    auth: UserAuthSignals,
}

impl CircuitInputs for AtomicQueryMtpV2OnChainInputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::AtomicQueryMtpV2OnChain
    }

    fn validate(&self) -> Result<(), CircuitError> {
        self.query_inputs.validate_for(self.circuit_id())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let circuit = self.circuit_id();
        let (request, inclusion, non_rev, query) = self.query_inputs.signal_groups(circuit)?;
        marshal::to_json(&MtpV2OnChainWire {
            request,
            inclusion,
            non_rev,
            query,
            auth: UserAuthSignals::new(Some(&self.auth), &self.challenge, &circuit.levels())?,
        })
    }
}

/// Public signals of `credentialAtomicQueryMTPV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryMtpV2PubSignals {
    /// Whether the claim is merklized.
    pub merklized: bool,
    /// Prover profile id.
    pub user_id: Id,
    /// Verifier request id.
    pub request_id: Hash,
    /// Issuer id.
    pub issuer_id: Id,
    /// Issuer state the claim is included in.
    pub issuer_claim_iden_state: Hash,
    /// Whether revocation was checked.
    pub is_revocation_checked: bool,
    /// Issuer state for the non-revocation proof.
    pub issuer_claim_non_rev_state: Hash,
    /// Unix seconds.
    pub timestamp: u64,
    /// Exposed query.
    pub query: QueryPubSignals,
}

impl PubSignals for AtomicQueryMtpV2PubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 13 + crate::query::VALUE_ARRAY_SIZE, "credentialAtomicQueryMTPV2")?;
        Ok(Self {
            merklized: r.flag()?,
            user_id: r.id()?,
            request_id: r.hash()?,
            issuer_id: r.id()?,
            issuer_claim_iden_state: r.hash()?,
            is_revocation_checked: r.flag()?,
            issuer_claim_non_rev_state: r.hash()?,
            timestamp: r.u64()?,
            query: QueryPubSignals::read(&mut r)?,
        })
    }
}

/// Public signals of `credentialAtomicQueryMTPV2OnChain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicQueryMtpV2OnChainPubSignals {
    /// Whether the claim is merklized.
    pub merklized: bool,
    /// Prover profile id.
    pub user_id: Id,
    /// Query commitment.
    pub circuit_query_hash: Hash,
    /// Verifier request id.
    pub request_id: Hash,
    /// Challenge the prover signed.
    pub challenge: Hash,
    /// GIST root of the prover's state proof.
    pub gist_root: Hash,
    /// Issuer id.
    pub issuer_id: Id,
    /// Issuer state the claim is included in.
    pub issuer_claim_iden_state: Hash,
    /// Whether revocation was checked.
    pub is_revocation_checked: bool,
    /// Issuer state for the non-revocation proof.
    pub issuer_claim_non_rev_state: Hash,
    /// Unix seconds.
    pub timestamp: u64,
}

impl AtomicQueryMtpV2OnChainPubSignals {
    /// Check that `circuitQueryHash` commits to `query` over `schema`.
    pub fn verify_query_hash(&self, query: &Query, schema: &SchemaHash) -> Result<(), CircuitError> {
        verify_circuit_query_hash(&self.circuit_query_hash, &query.hash_v2(schema)?)
    }
}

impl PubSignals for AtomicQueryMtpV2OnChainPubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 11, "credentialAtomicQueryMTPV2OnChain")?;
        Ok(Self {
            merklized: r.flag()?,
            user_id: r.id()?,
            circuit_query_hash: r.hash()?,
            request_id: r.hash()?,
            challenge: r.hash()?,
            gist_root: r.hash()?,
            issuer_id: r.id()?,
            issuer_claim_iden_state: r.hash()?,
            is_revocation_checked: r.flag()?,
            issuer_claim_non_rev_state: r.hash()?,
            timestamp: r.u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;
    use zkid_core::{Claim, Proof, SparseMerkleTree, TreeState};
    use zkid_vc::MtProof;

    fn schema() -> SchemaHash {
        SchemaHash::from_hex("2e2d1c11ad3e500de68d7ce16a0a559e").unwrap()
    }

    fn inputs(query: Query) -> AtomicQueryMtpV2Inputs {
        let claim = Claim::new(schema())
            .with_index_data(Hash::from_u64(840), Hash::ZERO)
            .with_revocation_nonce(3);
        let (hi, hv) = claim.hi_hv().unwrap();
        let mut tree = SparseMerkleTree::new(40);
        tree.add(Hash::from_u64(77), Hash::from_u64(1)).unwrap();
        tree.add(hi, hv).unwrap();
        let (inc, _) = tree.generate_proof(&hi).unwrap();
        let ts = TreeState::new(tree.root(), Hash::ZERO, Hash::ZERO).unwrap();
        AtomicQueryMtpV2Inputs {
            request_id: Hash::from_u64(23),
            id: Id::new([0x0d, 0x01], [2u8; 27]),
            profile_nonce: Hash::ZERO,
            claim_subject_profile_nonce: Hash::ZERO,
            claim: CircuitClaim {
                issuer_id: Id::new([0x0d, 0x01], [3u8; 27]),
                claim,
                inc_proof: Some(MtProof { tree_state: ts, proof: inc }),
                non_rev_proof: MtProof { tree_state: ts, proof: Proof::empty() },
                signature_proof: None,
            },
            skip_claim_revocation_check: false,
            current_timestamp: 1_700_000_000,
            query,
        }
    }

    #[test]
    fn marshal_flattens_signal_groups() {
        let inputs = inputs(Query::slot(2, Operator::Eq, vec![Hash::from_u64(840)]));
        let json: serde_json::Value = serde_json::from_slice(&inputs.inputs_marshal().unwrap()).unwrap();
        assert_eq!(json["requestID"], "23");
        assert_eq!(json["timestamp"], "1700000000");
        assert_eq!(json["isRevocationChecked"], "1");
        assert_eq!(json["issuerClaimMtp"].as_array().unwrap().len(), 40);
        assert_eq!(json["issuerClaimNonRevMtpNoAux"], "1");
        assert_eq!(json["claimSchema"], schema().to_hash().to_decimal());
        assert_eq!(json["claimPathNotExists"], "0");
        assert_eq!(json["value"][0], "840");
        assert!(json.get("authClaim").is_none());
    }

    #[test]
    fn marshal_is_deterministic() {
        let inputs = inputs(Query::slot(2, Operator::Lt, vec![Hash::from_u64(900)]));
        assert_eq!(inputs.inputs_marshal().unwrap(), inputs.inputs_marshal().unwrap());
    }

    #[test]
    fn inclusion_proof_is_required() {
        let mut inputs = inputs(Query::slot(2, Operator::Eq, vec![Hash::from_u64(840)]));
        inputs.claim.inc_proof = None;
        assert_eq!(inputs.validate().unwrap_err(), CircuitError::MissingInput("issuerClaimMtp"));
    }

    #[test]
    fn v3_only_operators_are_rejected() {
        let inputs = inputs(Query::slot(2, Operator::Gte, vec![Hash::from_u64(18)]));
        let err = inputs.inputs_marshal().unwrap_err();
        assert!(err.to_string().starts_with("operator not supported"));
    }

    #[test]
    fn pub_signals_expose_the_query() {
        let query = Query::slot(2, Operator::Eq, vec![Hash::from_u64(840)]);
        let user = Id::new([0x0d, 0x01], [2u8; 27]);
        let issuer = Id::new([0x0d, 0x01], [3u8; 27]);
        let mut signals = vec![
            "0".to_string(),
            user.to_hash().to_decimal(),
            "23".into(),
            issuer.to_hash().to_decimal(),
            "5".into(),
            "1".into(),
            "6".into(),
            "1700000000".into(),
            schema().to_hash().to_decimal(),
            "0".into(),
            "0".into(),
            "2".into(),
            "1".into(),
        ];
        signals.extend(query.padded_values().unwrap().iter().map(|v| v.to_decimal()));
        let data = serde_json::to_vec(&signals).unwrap();
        let out = AtomicQueryMtpV2PubSignals::pub_signals_unmarshal(&data).unwrap();
        assert_eq!(out.user_id, user);
        assert_eq!(out.issuer_id, issuer);
        assert_eq!(out.timestamp, 1_700_000_000);
        assert!(out.query.verify_query(&query, &schema()).is_ok());
        let other = Query::slot(2, Operator::Eq, vec![Hash::from_u64(841)]);
        assert!(out.query.verify_query(&other, &schema()).is_err());
    }

    #[test]
    fn on_chain_query_hash_binding() {
        let query = Query::slot(2, Operator::Eq, vec![Hash::from_u64(840)]);
        let hash = query.hash_v2(&schema()).unwrap();
        let user = Id::new([0x0d, 0x01], [2u8; 27]);
        let issuer = Id::new([0x0d, 0x01], [3u8; 27]);
        let signals = vec![
            "0".to_string(),
            user.to_hash().to_decimal(),
            hash.to_decimal(),
            "23".into(),
            "99".into(),
            "0".into(),
            issuer.to_hash().to_decimal(),
            "5".into(),
            "1".into(),
            "6".into(),
            "1700000000".into(),
        ];
        let out = AtomicQueryMtpV2OnChainPubSignals::pub_signals_unmarshal(&serde_json::to_vec(&signals).unwrap()).unwrap();
        assert_eq!(out.challenge, Hash::from_u64(99));
        assert!(out.verify_query_hash(&query, &schema()).is_ok());
        let other = Query::slot(3, Operator::Eq, vec![Hash::from_u64(840)]);
        assert!(out.verify_query_hash(&other, &schema()).is_err());
    }
}
