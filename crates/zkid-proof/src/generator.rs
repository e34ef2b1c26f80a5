//! # Input Generator
//!
//! [`InputGenerator`] turns a proof request, the prover's identity and a
//! prepared credential into the exact witness-calculator input of the
//! requested circuit.
//!
//! ## Flow
//!
//! 1. Query count and operator allow-list are checked before any
//!    collaborator is called.
//! 2. Dispatch is an exhaustive `match` on [`CircuitFamily`].
//! 3. Query circuits build the [`CircuitClaim`] (resolving the issuer auth
//!    claim status), attach both profile nonces verbatim, and clear values
//!    of disclosure and no-op queries.
//! 4. On-chain circuits add the prover's auth claim proofs, its GIST proof,
//!    and a signature over the challenge.
//! 5. V3 requests for the nominal circuit are routed to the smallest
//!    reduced-depth build that fits every proof.
//! 6. The circuit's own `inputs_marshal` produces the bytes.
//!
//! Every step is fatal on failure; nothing is retried here.

use std::sync::Arc;

use tracing::{debug, info};
use zkid_core::{poseidon, Did, Hash, Id, TreeState};
use zkid_vc::{
    find_non_revoked_credential, select_proof_type, CircuitClaim, CircuitClaimBuilder, CredentialStatusResolver,
    PreparedCredential, ProofType, W3cCredential,
};
use zkid_zkp::{
    claim_depths, select_target_circuit, AtomicQueryMtpV2Inputs, AtomicQueryMtpV2OnChainInputs, AtomicQuerySigV2Inputs,
    AtomicQuerySigV2OnChainInputs, AtomicQueryV3Inputs, AtomicQueryV3OnChainInputs, AuthV2Inputs, CircuitError,
    CircuitFamily, CircuitId, CircuitInputs, LinkedMultiQueryInputs, LinkedNullifierInputs, OnChainAuth,
    ProofDepths, Query, StateTransitionInputs, ZkProof, ZkProver,
};

use crate::config::InputGeneratorConfig;
use crate::error::GenerationError;
use crate::ports::{AuthClaimProofs, FieldResolver, IdentityWallet, PortError, StateStorage};
use crate::query::{build_queries, parse_query_request};
use crate::request::ProofRequest;

/// Inputs of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransitionParams {
    /// State being replaced. `None` uses the wallet's current state.
    pub old_tree_state: Option<TreeState>,
    /// State being published.
    pub new_tree_state: TreeState,
    /// Whether the old state is the genesis state.
    pub is_old_state_genesis: bool,
}

/// Per-request parameters that do not come from the proof request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Profile nonce of the prover; zero for the genesis identity.
    pub auth_profile_nonce: Hash,
    /// Profile nonce of the credential subject; zero for the genesis
    /// identity.
    pub credential_subject_profile_nonce: Hash,
    /// Nonce of the link id binding linked proofs.
    pub link_nonce: Hash,
    /// Verifier, for nullifier derivation.
    pub verifier_did: Option<Did>,
    /// Challenge for auth and on-chain circuits.
    pub challenge: Option<Hash>,
    /// Whether V3 on-chain proofs carry BJJ auth of the prover.
    pub bjj_auth_enabled: bool,
    /// State transition inputs, for `stateTransition`.
    pub state_transition: Option<StateTransitionParams>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            auth_profile_nonce: Hash::ZERO,
            credential_subject_profile_nonce: Hash::ZERO,
            link_nonce: Hash::ZERO,
            verifier_did: None,
            challenge: None,
            bjj_auth_enabled: true,
            state_transition: None,
        }
    }
}

/// Everything input generation needs for one request.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// The verifier's request.
    pub request: ProofRequest,
    /// Genesis DID of the prover.
    pub identifier: Did,
    /// Credential answering the request, for query circuits.
    pub credential: Option<PreparedCredential>,
    /// Resolved circuit queries.
    pub queries: Vec<Query>,
    /// Extra parameters.
    pub params: GenerationParams,
}

/// Marshaled inputs with the circuit they are laid out for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInputs {
    /// Circuit to prove with. May be a reduced-depth build of the
    /// requested circuit.
    pub circuit_id: CircuitId,
    /// Witness calculator input, JSON.
    pub inputs: Vec<u8>,
}

impl GeneratedInputs {
    /// The inputs as a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, GenerationError> {
        Ok(serde_json::from_slice(&self.inputs).map_err(CircuitError::from)?)
    }
}

/// Per-circuit input generation over the collaborator ports.
pub struct InputGenerator {
    wallet: Arc<dyn IdentityWallet>,
    status: Arc<dyn CredentialStatusResolver>,
    state: Arc<dyn StateStorage>,
    fields: Arc<dyn FieldResolver>,
    config: InputGeneratorConfig,
}

impl InputGenerator {
    /// Generator over the given collaborators.
    pub fn new(
        wallet: Arc<dyn IdentityWallet>,
        status: Arc<dyn CredentialStatusResolver>,
        state: Arc<dyn StateStorage>,
        fields: Arc<dyn FieldResolver>,
        config: InputGeneratorConfig,
    ) -> Self {
        Self {
            wallet,
            status,
            state,
            fields,
            config,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &InputGeneratorConfig {
        &self.config
    }

    /// Pick the credential answering `request` among `candidates`.
    ///
    /// Candidates from issuers the request does not accept are skipped.
    /// The first non-revoked candidate wins; with the revocation check
    /// skipped, the first accepted candidate wins.
    pub fn select_credential(
        &self,
        request: &ProofRequest,
        candidates: &[W3cCredential],
    ) -> Result<PreparedCredential, GenerationError> {
        let accepted: Vec<W3cCredential> = candidates
            .iter()
            .filter(|c| request.accepts_issuer(&c.issuer))
            .cloned()
            .collect();
        let Some(first) = accepted.first() else {
            return Err(GenerationError::Resolution(format!(
                "no credential from an accepted issuer for request {}",
                request.id
            )));
        };
        if request.query.skip_claim_revocation_check {
            return Ok(PreparedCredential::prepare(first.clone(), self.status.as_ref())?);
        }
        let (credential, status) = find_non_revoked_credential(&accepted, self.status.as_ref())?;
        debug!(request = request.id, credential = %credential.id, "credential selected");
        Ok(PreparedCredential::with_status(credential.clone(), status)?)
    }

    /// Parse the request predicates and resolve them against `prepared`.
    /// Circuits without query slots get no queries.
    pub fn resolve_queries(
        &self,
        request: &ProofRequest,
        prepared: &PreparedCredential,
    ) -> Result<Vec<Query>, GenerationError> {
        if request.circuit_id.max_queries() == 0 {
            return Ok(Vec::new());
        }
        let props = parse_query_request(request.query.credential_subject.as_ref())?;
        build_queries(
            request.circuit_id,
            &prepared.credential,
            &prepared.core_claim,
            &props,
            self.fields.as_ref(),
        )
    }

    /// Generate the marshaled inputs for `ctx`.
    pub fn generate_inputs(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let circuit = ctx.request.circuit_id;
        check_queries(circuit, &ctx.queries)?;
        let family = circuit.family();
        info!(circuit = %circuit, family = ?family, request = ctx.request.id, "generating circuit inputs");

        let generated = match family {
            CircuitFamily::AuthV2 => self.auth_v2(ctx)?,
            CircuitFamily::StateTransition => self.state_transition(ctx)?,
            CircuitFamily::AtomicQueryMtpV2 => self.mtp_v2(ctx)?,
            CircuitFamily::AtomicQueryMtpV2OnChain => self.mtp_v2_on_chain(ctx)?,
            CircuitFamily::AtomicQuerySigV2 => self.sig_v2(ctx)?,
            CircuitFamily::AtomicQuerySigV2OnChain => self.sig_v2_on_chain(ctx)?,
            CircuitFamily::AtomicQueryV3 => self.v3(ctx)?,
            CircuitFamily::AtomicQueryV3OnChain => self.v3_on_chain(ctx)?,
            CircuitFamily::LinkedMultiQuery => self.linked_multi_query(ctx)?,
            CircuitFamily::LinkedNullifier => self.linked_nullifier(ctx)?,
        };
        debug!(circuit = %generated.circuit_id, bytes = generated.inputs.len(), "circuit inputs marshaled");
        Ok(generated)
    }

    /// Generate inputs for `ctx` and prove them with `prover`.
    pub fn prove(
        &self,
        ctx: &GenerationContext,
        prover: &dyn ZkProver,
    ) -> Result<(GeneratedInputs, ZkProof), GenerationError> {
        let generated = self.generate_inputs(ctx)?;
        let proof = prover.generate(&generated.inputs, generated.circuit_id)?;
        Ok((generated, proof))
    }

    fn auth_v2(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let id = genesis_id(ctx)?;
        let challenge = required_challenge(ctx)?;
        let auth = self.auth_claim(&ctx.identifier, None)?;
        let gist = self.state.gist_proof(&id).map_err(|e| self.state_failed(e))?;
        let signature = self.sign(&ctx.identifier, &challenge)?;
        let inputs = AuthV2Inputs {
            genesis_id: id,
            profile_nonce: ctx.params.auth_profile_nonce,
            auth_claim: auth.claim,
            auth_claim_inc_mtp: Some(auth.inc_proof),
            auth_claim_non_rev_mtp: Some(auth.non_rev_proof),
            tree_state: auth.tree_state,
            gist_proof: Some(gist),
            signature: Some(signature),
            challenge,
        };
        marshal(&inputs)
    }

    fn state_transition(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let params = ctx
            .params
            .state_transition
            .as_ref()
            .ok_or_else(|| GenerationError::validation("stateTransition needs state transition parameters"))?;
        let id = genesis_id(ctx)?;
        let old = self.auth_claim(&ctx.identifier, params.old_tree_state.as_ref())?;
        let new = self.auth_claim(&ctx.identifier, Some(&params.new_tree_state))?;
        if !new.inc_proof.existence() {
            return Err(GenerationError::Resolution(
                "auth claim is not in the new claims tree".into(),
            ));
        }
        let challenge = poseidon::hash(&[old.tree_state.state, params.new_tree_state.state])?;
        let signature = self.sign(&ctx.identifier, &challenge)?;
        let inputs = StateTransitionInputs {
            id,
            old_tree_state: old.tree_state,
            new_tree_state: params.new_tree_state,
            is_old_state_genesis: params.is_old_state_genesis,
            auth_claim: old.claim,
            auth_claim_inc_mtp: Some(old.inc_proof),
            auth_claim_non_rev_mtp: Some(old.non_rev_proof),
            auth_claim_new_state_inc_mtp: Some(new.inc_proof),
            signature: Some(signature),
        };
        marshal(&inputs)
    }

    /// Fails with a validation error, before any signing, when the
    /// credential lacks an issuance MTP.
    fn mtp_v2_inputs(&self, ctx: &GenerationContext) -> Result<AtomicQueryMtpV2Inputs, GenerationError> {
        let claim = self.circuit_claim(ctx)?;
        select_proof_type(Some(ProofType::Mtp), &claim)?;
        Ok(AtomicQueryMtpV2Inputs {
            request_id: ctx.request.request_id(),
            id: genesis_id(ctx)?,
            profile_nonce: ctx.params.auth_profile_nonce,
            claim_subject_profile_nonce: ctx.params.credential_subject_profile_nonce,
            claim,
            skip_claim_revocation_check: ctx.request.query.skip_claim_revocation_check,
            current_timestamp: self.config.clock.unix_seconds(),
            query: single_query(ctx)?,
        })
    }

    fn mtp_v2(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        marshal(&self.mtp_v2_inputs(ctx)?)
    }

    fn mtp_v2_on_chain(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let query_inputs = self.mtp_v2_inputs(ctx)?;
        let challenge = required_challenge(ctx)?;
        let auth = self.on_chain_auth(ctx, &query_inputs.id, &challenge)?;
        marshal(&AtomicQueryMtpV2OnChainInputs {
            query_inputs,
            auth,
            challenge,
        })
    }

    fn sig_v2_inputs(&self, ctx: &GenerationContext) -> Result<AtomicQuerySigV2Inputs, GenerationError> {
        let claim = self.circuit_claim(ctx)?;
        select_proof_type(Some(ProofType::Signature), &claim)?;
        Ok(AtomicQuerySigV2Inputs {
            request_id: ctx.request.request_id(),
            id: genesis_id(ctx)?,
            profile_nonce: ctx.params.auth_profile_nonce,
            claim_subject_profile_nonce: ctx.params.credential_subject_profile_nonce,
            claim,
            skip_claim_revocation_check: ctx.request.query.skip_claim_revocation_check,
            current_timestamp: self.config.clock.unix_seconds(),
            query: single_query(ctx)?,
        })
    }

    fn sig_v2(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        marshal(&self.sig_v2_inputs(ctx)?)
    }

    fn sig_v2_on_chain(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let query_inputs = self.sig_v2_inputs(ctx)?;
        let challenge = required_challenge(ctx)?;
        let auth = self.on_chain_auth(ctx, &query_inputs.id, &challenge)?;
        marshal(&AtomicQuerySigV2OnChainInputs {
            query_inputs,
            auth,
            challenge,
        })
    }

    /// Circuit claim and the issuance proof a V3 request will use.
    fn v3_claim(&self, ctx: &GenerationContext) -> Result<(CircuitClaim, ProofType), GenerationError> {
        let claim = self.circuit_claim(ctx)?;
        let proof_type = select_proof_type(ctx.request.query.proof_type, &claim)?;
        Ok((claim, proof_type))
    }

    fn v3_inputs(
        &self,
        ctx: &GenerationContext,
        (claim, proof_type): (CircuitClaim, ProofType),
        gist_depth: usize,
        auth_depth: usize,
    ) -> Result<AtomicQueryV3Inputs, GenerationError> {
        let query = single_query(ctx)?;

        let (inc, sig) = match proof_type {
            ProofType::Mtp => (claim.inc_proof.as_ref(), None),
            ProofType::Signature => (None, claim.signature_proof.as_ref()),
        };
        let (identity, claim_depth) = claim_depths(&claim.non_rev_proof, inc, sig, &query);
        let depths = ProofDepths {
            identity: identity.max(auth_depth),
            claim: claim_depth,
            gist: gist_depth,
        };
        let requested = ctx.request.circuit_id;
        let circuit_id = if requested.nominal() == requested {
            select_target_circuit(requested, &depths)
        } else {
            requested
        };
        info!(
            requested = %requested,
            target = %circuit_id,
            identity_depth = depths.identity,
            claim_depth = depths.claim,
            gist_depth = depths.gist,
            proof_type = %proof_type,
            "selected target circuit"
        );

        let verifier_id = ctx
            .params
            .verifier_did
            .as_ref()
            .map(Id::from_did)
            .transpose()
            .map_err(|e| GenerationError::validation(format!("verifier DID: {e}")))?;
        Ok(AtomicQueryV3Inputs {
            circuit_id,
            request_id: ctx.request.request_id(),
            id: genesis_id(ctx)?,
            profile_nonce: ctx.params.auth_profile_nonce,
            claim_subject_profile_nonce: ctx.params.credential_subject_profile_nonce,
            claim,
            proof_type,
            skip_claim_revocation_check: ctx.request.query.skip_claim_revocation_check,
            current_timestamp: self.config.clock.unix_seconds(),
            query,
            link_nonce: ctx.params.link_nonce,
            verifier_id,
            nullifier_session_id: ctx.request.nullifier_session_id()?,
        })
    }

    fn v3(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let claim = self.v3_claim(ctx)?;
        marshal(&self.v3_inputs(ctx, claim, 0, 0)?)
    }

    fn v3_on_chain(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let challenge = required_challenge(ctx)?;
        let claim = self.v3_claim(ctx)?;
        let auth = if ctx.params.bjj_auth_enabled {
            Some(self.on_chain_auth(ctx, &genesis_id(ctx)?, &challenge)?)
        } else {
            None
        };
        let (gist_depth, auth_depth) = auth.as_ref().map_or((0, 0), |a| {
            (
                a.gist_proof.proof.depth(),
                a.auth_claim_inc_mtp.depth().max(a.auth_claim_non_rev_mtp.depth()),
            )
        });
        let query_inputs = self.v3_inputs(ctx, claim, gist_depth, auth_depth)?;
        marshal(&AtomicQueryV3OnChainInputs {
            query_inputs,
            auth,
            challenge,
        })
    }

    fn linked_multi_query(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let prepared = required_credential(ctx)?;
        let queries = ctx.queries.iter().cloned().map(clear_disclosed_values).collect();
        marshal(&LinkedMultiQueryInputs {
            circuit_id: ctx.request.circuit_id,
            link_nonce: ctx.params.link_nonce,
            claim: prepared.core_claim,
            queries,
        })
    }

    fn linked_nullifier(&self, ctx: &GenerationContext) -> Result<GeneratedInputs, GenerationError> {
        let prepared = required_credential(ctx)?;
        self.check_subject(ctx, prepared)?;
        let verifier = ctx
            .params
            .verifier_did
            .as_ref()
            .ok_or_else(|| GenerationError::validation("linkedNullifier needs a verifier DID"))?;
        let verifier_id =
            Id::from_did(verifier).map_err(|e| GenerationError::validation(format!("verifier DID: {e}")))?;
        marshal(&LinkedNullifierInputs {
            link_nonce: ctx.params.link_nonce,
            claim: prepared.core_claim,
            id: genesis_id(ctx)?,
            claim_subject_profile_nonce: ctx.params.credential_subject_profile_nonce,
            verifier_id,
            nullifier_session_id: ctx.request.nullifier_session_id()?,
        })
    }

    fn circuit_claim(&self, ctx: &GenerationContext) -> Result<CircuitClaim, GenerationError> {
        let prepared = required_credential(ctx)?;
        self.check_subject(ctx, prepared)?;
        let claim = CircuitClaimBuilder::new(self.status.as_ref()).build(prepared)?;
        debug!(
            issuer = %claim.issuer_id,
            mtp = claim.inc_proof.is_some(),
            signature = claim.signature_proof.is_some(),
            revoked = claim.non_rev_proof.proof.existence(),
            "circuit claim assembled"
        );
        Ok(claim)
    }

    /// A credential for the genesis identity must name the prover as its
    /// subject.
    fn check_subject(&self, ctx: &GenerationContext, prepared: &PreparedCredential) -> Result<(), GenerationError> {
        if !ctx.params.credential_subject_profile_nonce.is_zero() {
            return Ok(());
        }
        match prepared.credential.subject_did()? {
            Some(subject) if subject != ctx.identifier => Err(GenerationError::Resolution(format!(
                "subject and signer DIDs mismatch: {subject} is not {}",
                ctx.identifier
            ))),
            _ => Ok(()),
        }
    }

    fn on_chain_auth(&self, ctx: &GenerationContext, id: &Id, challenge: &Hash) -> Result<OnChainAuth, GenerationError> {
        let auth = self.auth_claim(&ctx.identifier, None)?;
        let gist_proof = self.state.gist_proof(id).map_err(|e| self.state_failed(e))?;
        let signature = self.sign(&ctx.identifier, challenge)?;
        Ok(OnChainAuth {
            auth_claim: auth.claim,
            auth_claim_inc_mtp: auth.inc_proof,
            auth_claim_non_rev_mtp: auth.non_rev_proof,
            tree_state: auth.tree_state,
            gist_proof,
            signature,
        })
    }

    fn auth_claim(&self, did: &Did, at: Option<&TreeState>) -> Result<AuthClaimProofs, GenerationError> {
        let auth = self.wallet.auth_claim(did, at).map_err(|e| self.wallet_failed(e))?;
        if auth.non_rev_proof.existence() {
            return Err(GenerationError::Resolution(format!("auth claim of {did} is revoked")));
        }
        Ok(auth)
    }

    fn sign(&self, did: &Did, challenge: &Hash) -> Result<zkid_crypto::Signature, GenerationError> {
        self.wallet.sign_challenge(did, challenge).map_err(|e| self.wallet_failed(e))
    }

    fn wallet_failed(&self, e: PortError) -> GenerationError {
        GenerationError::collaborator(self.wallet.wallet_name(), e)
    }

    fn state_failed(&self, e: PortError) -> GenerationError {
        GenerationError::collaborator(self.state.storage_name(), e)
    }
}

fn check_queries(circuit: CircuitId, queries: &[Query]) -> Result<(), GenerationError> {
    circuit.check_query_count(queries.len()).map_err(GenerationError::validation)?;
    for query in queries {
        circuit.check_operator(query.operator).map_err(GenerationError::validation)?;
    }
    Ok(())
}

fn genesis_id(ctx: &GenerationContext) -> Result<Id, GenerationError> {
    Id::from_did(&ctx.identifier).map_err(|e| GenerationError::Resolution(format!("identifier {}: {e}", ctx.identifier)))
}

fn required_challenge(ctx: &GenerationContext) -> Result<Hash, GenerationError> {
    ctx.params
        .challenge
        .ok_or_else(|| GenerationError::validation(format!("{} needs a challenge", ctx.request.circuit_id)))
}

fn required_credential(ctx: &GenerationContext) -> Result<&PreparedCredential, GenerationError> {
    ctx.credential
        .as_ref()
        .ok_or_else(|| GenerationError::validation(format!("{} needs a credential", ctx.request.circuit_id)))
}

fn single_query(ctx: &GenerationContext) -> Result<Query, GenerationError> {
    let query = ctx
        .queries
        .first()
        .cloned()
        .ok_or_else(|| GenerationError::validation(format!("{} needs a query", ctx.request.circuit_id)))?;
    Ok(clear_disclosed_values(query))
}

fn clear_disclosed_values(mut query: Query) -> Query {
    if query.operator.discloses_or_skips() {
        query.values.clear();
    }
    query
}

fn marshal(inputs: &impl CircuitInputs) -> Result<GeneratedInputs, GenerationError> {
    Ok(GeneratedInputs {
        circuit_id: inputs.circuit_id(),
        inputs: inputs.inputs_marshal()?,
    })
}
