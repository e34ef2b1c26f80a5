//! `stateTransition`: proves an identity moved from an old state to a new
//! one, authorized by an auth claim valid in the old state and still
//! present in the new one.

use serde::Serialize;
use zkid_core::{Claim, Hash, Id, Proof, TreeState};
use zkid_crypto::Signature;

use crate::circuits::marshal::{self, SignalReader};
use crate::circuits::{CircuitId, CircuitInputs, PubSignals};
use crate::error::CircuitError;

/// Inputs of `stateTransition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransitionInputs {
    /// Identity id.
    pub id: Id,
    /// Tree state before the transition.
    pub old_tree_state: TreeState,
    /// Tree state after the transition.
    pub new_tree_state: TreeState,
    /// Whether the old state is the genesis state.
    pub is_old_state_genesis: bool,
    /// Auth claim authorizing the transition.
    pub auth_claim: Claim,
    /// Inclusion of the auth claim in the old claims tree.
    pub auth_claim_inc_mtp: Option<Proof>,
    /// Non-revocation of the auth claim in the old revocation tree.
    pub auth_claim_non_rev_mtp: Option<Proof>,
    /// Inclusion of the auth claim in the new claims tree.
    pub auth_claim_new_state_inc_mtp: Option<Proof>,
    /// Signature over `Poseidon(oldState, newState)`.
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateTransitionWire {
    auth_claim: Vec<String>,
    auth_claim_mtp: Vec<String>,
    auth_claim_non_rev_mtp: Vec<String>,
    auth_claim_non_rev_mtp_aux_hi: String,
    auth_claim_non_rev_mtp_aux_hv: String,
    auth_claim_non_rev_mtp_no_aux: String,
    #[serde(rename = "userID")]
    user_id: String,
    new_user_state: String,
    old_user_state: String,
    is_old_state_genesis: String,
    claims_tree_root: String,
    rev_tree_root: String,
    roots_tree_root: String,
    signature_r8x: String,
    signature_r8y: String,
    signature_s: String,
    new_auth_claim_mtp: Vec<String>,
    new_claims_tree_root: String,
    new_rev_tree_root: String,
    new_roots_tree_root: String,
}

impl CircuitInputs for StateTransitionInputs {
    fn circuit_id(&self) -> CircuitId {
        CircuitId::StateTransition
    }

    fn validate(&self) -> Result<(), CircuitError> {
        if self.auth_claim_inc_mtp.is_none() {
            return Err(CircuitError::MissingInput("authClaimIncMtp"));
        }
        if self.auth_claim_non_rev_mtp.is_none() {
            return Err(CircuitError::MissingInput("authClaimNonRevMtp"));
        }
        if self.auth_claim_new_state_inc_mtp.is_none() {
            return Err(CircuitError::MissingInput("newAuthClaimMtp"));
        }
        if self.signature.is_none() {
            return Err(CircuitError::MissingInput("signature"));
        }
        self.old_tree_state.validate()?;
        self.new_tree_state.validate()?;
        Ok(())
    }

    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError> {
        self.validate()?;
        let levels = self.circuit_id().levels().identity;
        let (Some(inc), Some(non_rev), Some(new_inc), Some(signature)) = (
            &self.auth_claim_inc_mtp,
            &self.auth_claim_non_rev_mtp,
            &self.auth_claim_new_state_inc_mtp,
            &self.signature,
        ) else {
            return Err(CircuitError::MissingInput("stateTransition proofs"));
        };
        let aux = marshal::node_aux(non_rev);
        let (r8x, r8y, s) = marshal::signature_parts(signature);
        let old = &self.old_tree_state;
        let new = &self.new_tree_state;
        marshal::to_json(&StateTransitionWire {
            auth_claim: marshal::claim_slots(&self.auth_claim)?,
            auth_claim_mtp: marshal::siblings(inc, levels),
            auth_claim_non_rev_mtp: marshal::siblings(non_rev, levels),
            auth_claim_non_rev_mtp_aux_hi: aux.key,
            auth_claim_non_rev_mtp_aux_hv: aux.value,
            auth_claim_non_rev_mtp_no_aux: aux.no_aux,
            user_id: marshal::id_dec(&self.id),
            new_user_state: marshal::dec(&new.state),
            old_user_state: marshal::dec(&old.state),
            is_old_state_genesis: marshal::flag(self.is_old_state_genesis),
            claims_tree_root: marshal::dec(&old.claims_root),
            rev_tree_root: marshal::dec(&old.revocation_root),
            roots_tree_root: marshal::dec(&old.root_of_roots),
            signature_r8x: r8x,
            signature_r8y: r8y,
            signature_s: s,
            new_auth_claim_mtp: marshal::siblings(new_inc, levels),
            new_claims_tree_root: marshal::dec(&new.claims_root),
            new_rev_tree_root: marshal::dec(&new.revocation_root),
            new_roots_tree_root: marshal::dec(&new.root_of_roots),
        })
    }
}

/// Public signals of `stateTransition`:
/// `[userID, oldUserState, newUserState, isOldStateGenesis]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransitionPubSignals {
    /// Identity id.
    pub user_id: Id,
    /// State before.
    pub old_user_state: Hash,
    /// State after.
    pub new_user_state: Hash,
    /// Whether the old state was genesis.
    pub is_old_state_genesis: bool,
}

impl PubSignals for StateTransitionPubSignals {
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError> {
        let mut r = SignalReader::new(data, 4, "stateTransition")?;
        Ok(Self {
            user_id: r.id()?,
            old_user_state: r.hash()?,
            new_user_state: r.hash()?,
            is_old_state_genesis: r.flag()?,
        })
    }
}
