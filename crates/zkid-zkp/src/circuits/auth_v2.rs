//! `authV2`: proves control of an identity by signing a challenge with a
//! key whose auth claim is in the identity's claims tree, and that the
//! identity state is in the GIST (or the identity is genesis).

use serde::Serialize;
use zkid_core::{Claim, GistProof, Hash, Id, Proof, TreeState};
use zkid_crypto::Signature;

use crate::circuits::marshal::{self, SignalReader};
use crate::circuits::{CircuitId, CircuitInputs, PubSignals};
use crate::error::CircuitError;

/// Inputs of `authV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthV2Inputs {
    /// Genesis id of the identity.
    pub genesis_id: Id,
    /// Profile nonce; zero for the genesis identity.
    pub profile_nonce: Hash,
    /// Auth claim holding the signing key.
    pub auth_claim: Claim,
    /// Inclusion of the auth claim in the claims tree.
    pub auth_claim_inc_mtp: Option<Proof>,
    /// Non-revocation of the auth claim.
    pub auth_claim_non_rev_mtp: Option<Proof>,
    /// Identity tree state.
    pub tree_state: TreeState,
    /// State inclusion (or genesis non-inclusion) in the GIST.
    pub gist_proof: Option<GistProof>,
    /// Signature over the challenge.
    pub signature: Option<Signature>,
    /// Challenge.
    pub challenge: Hash,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthV2Wire {
    #[serde(rename = "genesisID")]
    genesis_id: String,
    profile_nonce: String,
    auth_claim: Vec<String>,
    auth_claim_inc_mtp: Vec<String>,
    auth_claim_non_rev_mtp: Vec<String>,
    auth_claim_non_rev_mtp_aux_hi: String,
    auth_claim_non_rev_mtp_aux_hv: String,
    auth_claim_non_rev_mtp_no_aux: String,
    challenge: String,
    challenge_signature_r8x: String,
    challenge_signature_r8y: String,
    challenge_signature_s: String,
    claims_tree_root: String,
    rev_tree_root: String,
    roots_tree_root: String,
    state: String,
    gist_root: String,
    gist_mtp: Vec<String>,
    gist_mtp_aux_hi: String,
    gist_mtp_aux_hv: String,
    gist_mtp_no_aux: String,
}

impl CircuitInputs for AuthV2Inputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::AuthV2
    }

    fn validate(&self) -> Result<(), CircuitError> {
        if self.auth_claim_inc_mtp.is_none() {
            return Err(CircuitError::MissingInput("authClaimIncMtp"));
        }
        if self.auth_claim_non_rev_mtp.is_none() {
            return Err(CircuitError::MissingInput("authClaimNonRevMtp"));
        }
        if self.gist_proof.is_none() {
            return Err(CircuitError::MissingInput("gistProof"));
        }
        if self.signature.is_none() {
            return Err(CircuitError::MissingInput("signature"));
        }
        Ok(())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let levels = self.circuit_id().levels();
        let (Some(inc), Some(non_rev), Some(gist), Some(signature)) = (
            &self.auth_claim_inc_mtp,
            &self.auth_claim_non_rev_mtp,
            &self.gist_proof,
            &self.signature,
        ) else {
            return Err(CircuitError::MissingInput("authV2 proofs"));
        };
        let non_rev_aux = marshal::node_aux(non_rev);
        let gist_aux = marshal::node_aux(&gist.proof);
        let (r8x, r8y, s) = marshal::signature_parts(signature);
        marshal::to_json(&AuthV2Wire {
            genesis_id: marshal::id_dec(&self.genesis_id),
            profile_nonce: marshal::dec(&self.profile_nonce),
            auth_claim: marshal::claim_slots(&self.auth_claim)?,
            auth_claim_inc_mtp: marshal::siblings(inc, levels.identity),
            auth_claim_non_rev_mtp: marshal::siblings(non_rev, levels.identity),
            auth_claim_non_rev_mtp_aux_hi: non_rev_aux.key,
            auth_claim_non_rev_mtp_aux_hv: non_rev_aux.value,
            auth_claim_non_rev_mtp_no_aux: non_rev_aux.no_aux,
            challenge: marshal::dec(&self.challenge),
            challenge_signature_r8x: r8x,
            challenge_signature_r8y: r8y,
            challenge_signature_s: s,
            claims_tree_root: marshal::dec(&self.tree_state.claims_root),
            rev_tree_root: marshal::dec(&self.tree_state.revocation_root),
            roots_tree_root: marshal::dec(&self.tree_state.root_of_roots),
            state: marshal::dec(&self.tree_state.state),
            gist_root: marshal::dec(&gist.root),
            gist_mtp: marshal::siblings(&gist.proof, levels.gist),
            gist_mtp_aux_hi: gist_aux.key,
            gist_mtp_aux_hv: gist_aux.value,
            gist_mtp_no_aux: gist_aux.no_aux,
        })
    }
}

/// Public signals of `authV2`: `[userID, challenge, gistRoot]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthV2PubSignals {
    /// Profile id of the prover.
    pub user_id: Id,
    /// Challenge that was signed.
    pub challenge: Hash,
    /// GIST root the proof is against.
    pub gist_root: Hash,
}

impl PubSignals for AuthV2PubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 3, "authV2")?;
        Ok(Self {
            user_id: r.id()?,
            challenge: r.hash()?,
            gist_root: r.hash()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use zkid_core::{poseidon, SparseMerkleTree};
    use zkid_crypto::SecretScalar;

    fn inputs() -> AuthV2Inputs {
        let key = SecretScalar::from_biguint(&BigUint::from(4242u64)).unwrap();
        let pk = key.public_key();
        let auth_claim = Claim::auth_bjj(pk.point().x(), pk.point().y(), 0).unwrap();
        let (hi, hv) = auth_claim.hi_hv().unwrap();
        let mut claims = SparseMerkleTree::new(40);
        claims.add(hi, hv).unwrap();
        let (inc, _) = claims.generate_proof(&hi).unwrap();
        let tree_state = TreeState::new(claims.root(), Hash::ZERO, Hash::ZERO).unwrap();
        let challenge = Hash::from_u64(10);
        AuthV2Inputs {
            genesis_id: Id::new([0x0d, 0x01], [9u8; 27]),
            profile_nonce: Hash::ZERO,
            auth_claim,
            auth_claim_inc_mtp: Some(inc),
            auth_claim_non_rev_mtp: Some(Proof::empty()),
            tree_state,
            gist_proof: Some(GistProof {
                root: Hash::ZERO,
                proof: Proof::empty(),
            }),
            signature: Some(key.sign_poseidon(&challenge).unwrap()),
            challenge,
        }
    }

    #[test]
    fn missing_signature_is_rejected() {
        let mut inputs = inputs();
        inputs.signature = None;
        assert_eq!(inputs.validate().unwrap_err(), CircuitError::MissingInput("signature"));
        assert!(inputs.inputs_marshal().is_err());
    }

    #[test]
    fn marshal_uses_circuit_signal_names() {
        let inputs = inputs();
        let json: serde_json::Value = serde_json::from_slice(&inputs.inputs_marshal().unwrap()).unwrap();
        assert_eq!(json["genesisID"], inputs.genesis_id.to_hash().to_decimal());
        assert_eq!(json["authClaim"].as_array().unwrap().len(), 8);
        assert_eq!(json["authClaimIncMtp"].as_array().unwrap().len(), 40);
        assert_eq!(json["gistMtp"].as_array().unwrap().len(), 64);
        assert_eq!(json["authClaimNonRevMtpNoAux"], "1");
        assert_eq!(json["gistMtpNoAux"], "1");
        assert_eq!(json["challenge"], "10");
        assert_eq!(json["state"], inputs.tree_state.state.to_decimal());
        assert!(json.get("challengeSignatureR8x").is_some());
        assert!(json.get("revTreeRoot").is_some());
    }

    #[test]
    fn pub_signals_decode_in_order() {
        let id = Id::new([0x0d, 0x01], [9u8; 27]);
        let root = poseidon::hash(&[Hash::from_u64(1)]).unwrap();
        let data = serde_json::to_vec(&vec![id.to_hash().to_decimal(), "10".to_string(), root.to_decimal()]).unwrap();
        let out = AuthV2PubSignals::pub_signals_unmarshal(&data).unwrap();
        assert_eq!(out.user_id, id);
        assert_eq!(out.challenge, Hash::from_u64(10));
        assert_eq!(out.gist_root, root);
    }

    #[test]
    fn pub_signals_length_is_enforced() {
        assert!(AuthV2PubSignals::pub_signals_unmarshal(br#"["1","2"]"#).is_err());
    }
}
