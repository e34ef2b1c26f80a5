//! End-to-end input generation over the mock collaborators: a holder
//! registered in the wallet and the GIST, an issuer publishing its trees
//! to the status resolver, and requests for each circuit family.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::DateTime;
use serde_json::{json, Value};
use zkid_core::{poseidon, Claim, Did, Hash, Id, SchemaHash, SubjectFlag, TreeState};
use zkid_proof::mock::{encode_string, IssuanceProofs, MockFieldResolver, MockIdentity, MockStateStorage, MockStatusResolver, MockWallet};
use zkid_crypto::Signature;
use zkid_proof::{
    AuthClaimProofs, GenerationContext, GenerationError, GenerationParams, IdentityWallet, InputGenerator,
    InputGeneratorConfig, PortError, ProofRequest, StateTransitionParams,
};
use zkid_vc::{ProofType, W3cCredential};
use zkid_zkp::{CircuitId, Operator};

const NOW: i64 = 1_700_000_000;
const SCHEMA: &str = "2e2d1c11ad3e500de68d7ce16a0a559e";

struct World {
    wallet: Arc<MockWallet>,
    status: Arc<MockStatusResolver>,
    state: Arc<MockStateStorage>,
    holder: Did,
    holder_id: Id,
    issuer: MockIdentity,
    generator: InputGenerator,
}

impl World {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let wallet = Arc::new(MockWallet::new());
        let status = Arc::new(MockStatusResolver::new());
        let state = Arc::new(MockStateStorage::new());

        let holder = MockIdentity::new(1).unwrap();
        let holder_did = holder.did().clone();
        let holder_id = holder.id();
        state.publish(&holder_id, &holder.tree_state().unwrap().state).unwrap();
        wallet.insert(holder);

        let issuer = MockIdentity::new(2).unwrap();
        status.publish(&issuer).unwrap();

        let generator = InputGenerator::new(
            wallet.clone(),
            status.clone(),
            state.clone(),
            Arc::new(fields()),
            InputGeneratorConfig::fixed(DateTime::from_timestamp(NOW, 0).unwrap()),
        );
        Self {
            wallet,
            status,
            state,
            holder: holder_did,
            holder_id,
            issuer,
            generator,
        }
    }

    fn claim(&self, nonce: u64) -> Claim {
        Claim::new(SchemaHash::from_hex(SCHEMA).unwrap())
            .with_subject(SubjectFlag::OtherIdenIndex, Some(&self.holder_id))
            .with_index_data(Hash::from_u64(1242), encode_string("Bahamas").unwrap())
            .with_revocation_nonce(nonce)
    }

    fn issue(&mut self, nonce: u64, proofs: IssuanceProofs) -> W3cCredential {
        let claim = self.claim(nonce);
        let holder = self.holder.clone();
        let credential = self
            .issuer
            .issue(&holder, claim, json!({"countryCode": 1242, "countryName": "Bahamas"}), proofs)
            .unwrap();
        self.status.publish(&self.issuer).unwrap();
        credential
    }

    fn revoke(&mut self, nonce: u64) {
        self.issuer.revoke(nonce).unwrap();
        self.status.publish(&self.issuer).unwrap();
    }

    fn context(&self, request: ProofRequest, candidates: &[W3cCredential]) -> Result<GenerationContext, GenerationError> {
        let (credential, queries) = if candidates.is_empty() {
            (None, Vec::new())
        } else {
            let prepared = self.generator.select_credential(&request, candidates)?;
            let queries = self.generator.resolve_queries(&request, &prepared)?;
            (Some(prepared), queries)
        };
        Ok(GenerationContext {
            request,
            identifier: self.holder.clone(),
            credential,
            queries,
            params: GenerationParams::default(),
        })
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Value, GenerationError> {
        self.generator.generate_inputs(ctx)?.to_json()
    }
}

fn fields() -> MockFieldResolver {
    MockFieldResolver::new()
        .with_slot("countryCode", 2)
        .with_slot("countryName", 3)
}

/// Wallet that counts challenge signatures.
struct CountingWallet {
    inner: Arc<MockWallet>,
    signed: AtomicUsize,
}

impl IdentityWallet for CountingWallet {
    fn wallet_name(&self) -> &str {
        "counting-wallet"
    }

    fn auth_claim(&self, did: &Did, at: Option<&TreeState>) -> Result<AuthClaimProofs, PortError> {
        self.inner.auth_claim(did, at)
    }

    fn sign_challenge(&self, did: &Did, challenge: &Hash) -> Result<Signature, PortError> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_challenge(did, challenge)
    }
}

fn request(circuit: &str, subject: Value) -> ProofRequest {
    serde_json::from_value(json!({
        "id": 7,
        "circuitId": circuit,
        "query": {
            "allowedIssuers": ["*"],
            "type": "KYCCountryOfResidenceCredential",
            "credentialSubject": subject,
        }
    }))
    .unwrap()
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn auth_v2_inputs_carry_a_valid_challenge_signature() {
    let world = World::new();
    let mut ctx = world.context(request("authV2", json!({})), &[]).unwrap();
    let challenge = Hash::from_u64(12_345);
    ctx.params.challenge = Some(challenge);

    let generated = world.generator.generate_inputs(&ctx).unwrap();
    assert_eq!(generated.circuit_id, CircuitId::AuthV2);
    let inputs = generated.to_json().unwrap();

    assert_eq!(inputs["genesisID"], world.holder_id.to_hash().to_decimal());
    assert_eq!(inputs["challenge"], "12345");
    assert_eq!(inputs["profileNonce"], "0");
    assert_eq!(strings(&inputs["authClaimIncMtp"]).len(), 40);
    assert_eq!(strings(&inputs["gistMtp"]).len(), 64);
    assert_eq!(inputs["gistRoot"], world.state.root().to_decimal());

    let holder_state = world.wallet.tree_state(&world.holder).unwrap();
    assert_eq!(inputs["state"], holder_state.state.to_decimal());

    let signature = world.wallet.sign_challenge(&world.holder, &challenge).unwrap();
    assert_eq!(inputs["challengeSignatureS"], signature.s().to_decimal());
    let key = world.wallet.update(&world.holder, |identity| identity.public_key()).unwrap();
    assert!(key.verify_poseidon(&challenge, &signature));
}

#[test]
fn auth_v2_requires_a_challenge() {
    let world = World::new();
    let ctx = world.context(request("authV2", json!({})), &[]).unwrap();
    let err = world.generator.generate_inputs(&ctx).unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("needs a challenge"));
}

#[test]
fn auth_v2_proves_with_circuit_artifacts() {
    // Needs compiled circuit artifacts; skipped without them.
    let Ok(storage) = zkid_zkp::FsCircuitStorage::from_env() else {
        return;
    };
    let world = World::new();
    let mut ctx = world.context(request("authV2", json!({})), &[]).unwrap();
    ctx.params.challenge = Some(Hash::from_u64(1));
    let prover = zkid_zkp::NativeProver::new(Arc::new(storage));
    let (_, proof) = world.generator.prove(&ctx, &prover).unwrap();
    assert_eq!(proof.pub_signals[0], world.holder_id.to_hash().to_decimal());
    assert!(zkid_zkp::ZkProver::verify(&prover, &proof, CircuitId::AuthV2));
}

#[test]
fn mtp_v2_equality_on_a_slot() {
    let mut world = World::new();
    let credential = world.issue(10, IssuanceProofs::Mtp);
    let req = request("credentialAtomicQueryMTPV2", json!({"countryName": {"$eq": "Bahamas"}}));
    let ctx = world.context(req, &[credential]).unwrap();
    let inputs = world.generate(&ctx).unwrap();

    assert_eq!(inputs["requestID"], "7");
    assert_eq!(inputs["userGenesisID"], world.holder_id.to_hash().to_decimal());
    assert_eq!(inputs["issuerID"], world.issuer.id().to_hash().to_decimal());
    assert_eq!(inputs["operator"], "1");
    assert_eq!(inputs["slotIndex"], "3");
    assert_eq!(inputs["timestamp"], NOW.to_string());
    assert_eq!(inputs["isRevocationChecked"], "1");
    assert_eq!(inputs["claimSchema"], SchemaHash::from_hex(SCHEMA).unwrap().to_hash().to_decimal());

    let values = strings(&inputs["value"]);
    assert_eq!(values.len(), 64);
    assert_eq!(values[0], encode_string("Bahamas").unwrap().to_decimal());
    assert!(values[1..].iter().all(|v| v == "0"));

    let issuer_state = world.issuer.tree_state().unwrap();
    assert_eq!(inputs["issuerClaimIdenState"], issuer_state.state.to_decimal());
    assert_eq!(strings(&inputs["issuerClaimMtp"]).len(), 40);
    assert_eq!(inputs["issuerClaimNonRevMtpNoAux"], "1");
}

#[test]
fn v2_selective_disclosure_is_sent_as_equality() {
    let mut world = World::new();
    let credential = world.issue(11, IssuanceProofs::Mtp);
    let req = request("credentialAtomicQueryMTPV2", json!({"countryCode": {}}));
    let ctx = world.context(req, &[credential]).unwrap();
    assert_eq!(ctx.queries[0].operator, Operator::Eq);
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["operator"], "1");
    assert_eq!(inputs["slotIndex"], "2");
    assert_eq!(strings(&inputs["value"])[0], "1242");
}

#[test]
fn signature_credential_feeds_sig_v2() {
    let mut world = World::new();
    let credential = world.issue(12, IssuanceProofs::Signature);
    let req = request("credentialAtomicQuerySigV2", json!({"countryCode": {"$nin": [840, 124]}}));
    let ctx = world.context(req, &[credential]).unwrap();
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["operator"], "5");
    let values = strings(&inputs["value"]);
    assert_eq!(&values[..3], &["840", "124", "0"]);
    assert_eq!(
        inputs["issuerAuthClaim"],
        json!(world
            .issuer
            .auth_claim()
            .slots()
            .unwrap()
            .iter()
            .map(Hash::to_decimal)
            .collect::<Vec<_>>())
    );
}

#[test]
fn all_revoked_candidates_fail_resolution() {
    let mut world = World::new();
    let first = world.issue(20, IssuanceProofs::Mtp);
    let second = world.issue(21, IssuanceProofs::Mtp);
    world.revoke(20);
    world.revoke(21);
    let req = request("credentialAtomicQueryMTPV2", json!({"countryCode": {"$eq": 1242}}));
    let err = world.context(req, &[first, second]).unwrap_err();
    assert!(matches!(err, GenerationError::Resolution(_)));
    assert!(err.to_string().contains("all claims are revoked"));
}

#[test]
fn first_non_revoked_candidate_wins() {
    let mut world = World::new();
    let revoked = world.issue(30, IssuanceProofs::Mtp);
    let live = world.issue(31, IssuanceProofs::Mtp);
    let later = world.issue(32, IssuanceProofs::Mtp);
    world.revoke(30);
    let req = request("credentialAtomicQueryMTPV2", json!({"countryCode": {"$eq": 1242}}));
    let ctx = world.context(req, &[revoked, live.clone(), later]).unwrap();
    let prepared = ctx.credential.as_ref().unwrap();
    assert_eq!(prepared.credential.id, live.id);
    assert!(!prepared.rev_status.is_revoked());
}

#[test]
fn skipped_revocation_check_accepts_revoked_credential() {
    let mut world = World::new();
    let revoked = world.issue(33, IssuanceProofs::Mtp);
    world.revoke(33);
    let mut req = request("credentialAtomicQueryMTPV2", json!({"countryCode": {"$eq": 1242}}));
    req.query.skip_claim_revocation_check = true;
    let ctx = world.context(req, &[revoked]).unwrap();
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["isRevocationChecked"], "0");
}

#[test]
fn disallowed_issuer_is_not_selected() {
    let mut world = World::new();
    let credential = world.issue(34, IssuanceProofs::Mtp);
    let mut req = request("credentialAtomicQueryMTPV2", json!({}));
    req.query.allowed_issuers = vec!["did:iden3:polygon:amoy:someoneelse".into()];
    let err = world.context(req, &[credential]).unwrap_err();
    assert!(matches!(err, GenerationError::Resolution(_)));
}

#[test]
fn v3_routes_small_proofs_to_the_smallest_build() {
    let mut world = World::new();
    let credential = world.issue(40, IssuanceProofs::Both);
    let req = request("credentialAtomicQueryV3", json!({"countryCode": {"$between": [1000, 2000]}}));
    let ctx = world.context(req, &[credential]).unwrap();
    let generated = world.generator.generate_inputs(&ctx).unwrap();
    assert_eq!(generated.circuit_id, CircuitId::AtomicQueryV3Levels8);

    let inputs = generated.to_json().unwrap();
    assert_eq!(inputs["operator"], "9");
    assert_eq!(inputs["proofType"], "2");
    assert_eq!(strings(&inputs["issuerClaimMtp"]).len(), 8);
    assert_eq!(strings(&inputs["claimPathMtp"]).len(), 8);
}

#[test]
fn v3_explicit_build_is_kept() {
    let mut world = World::new();
    let credential = world.issue(41, IssuanceProofs::Signature);
    let req = request("credentialAtomicQueryV3-16-16-64", json!({"countryCode": {"$gte": 1000}}));
    let ctx = world.context(req, &[credential]).unwrap();
    let generated = world.generator.generate_inputs(&ctx).unwrap();
    assert_eq!(generated.circuit_id, CircuitId::AtomicQueryV3Levels16);
    assert_eq!(generated.to_json().unwrap()["proofType"], "1");
}

#[test]
fn v3_on_chain_without_bjj_auth_zero_fills_auth() {
    let mut world = World::new();
    let credential = world.issue(42, IssuanceProofs::Mtp);
    let req = request("credentialAtomicQueryV3OnChain", json!({"countryCode": {"$eq": 1242}}));
    let mut ctx = world.context(req, &[credential]).unwrap();
    ctx.params.challenge = Some(Hash::from_u64(5));
    ctx.params.bjj_auth_enabled = false;
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["isBJJAuthEnabled"], "0");
    assert!(strings(&inputs["authClaim"]).iter().all(|s| s == "0"));
}

#[test]
fn operator_allow_list_is_enforced_before_resolution() {
    let mut world = World::new();
    let credential = world.issue(50, IssuanceProofs::Both);
    for circuit in [
        "credentialAtomicQueryMTPV2",
        "credentialAtomicQuerySigV2",
        "credentialAtomicQueryMTPV2OnChain",
        "credentialAtomicQuerySigV2OnChain",
    ] {
        let req = request(circuit, json!({"countryCode": {"$between": [1, 2]}}));
        let err = world.context(req, &[credential.clone()]).unwrap_err();
        assert!(err.is_validation(), "{circuit}: {err}");
        assert!(err.to_string().contains("operator not supported"));
    }
    let req = request("credentialAtomicQueryV3", json!({"countryCode": {"$between": [1, 2]}}));
    assert!(world.context(req, &[credential]).is_ok());
}

#[test]
fn subject_mismatch_is_rejected() {
    let mut world = World::new();
    let stranger = MockIdentity::new(99).unwrap();
    let claim = world.claim(60);
    let credential = world
        .issuer
        .issue(stranger.did(), claim, json!({"countryCode": 1242}), IssuanceProofs::Mtp)
        .unwrap();
    world.status.publish(&world.issuer).unwrap();
    let req = request("credentialAtomicQueryMTPV2", json!({"countryCode": {"$eq": 1242}}));
    let ctx = world.context(req, &[credential]).unwrap();
    let err = world.generator.generate_inputs(&ctx).unwrap_err();
    assert!(err.to_string().contains("subject and signer DIDs mismatch"));
}

#[test]
fn state_transition_signs_old_and_new_states() {
    let world = World::new();
    let old = world.wallet.tree_state(&world.holder).unwrap();
    world
        .wallet
        .update(&world.holder, |identity| {
            identity.add_claim(&Claim::empty().with_index_data(Hash::from_u64(1), Hash::from_u64(2)))
        })
        .unwrap()
        .unwrap();
    let new = world.wallet.tree_state(&world.holder).unwrap();

    let mut ctx = world.context(request("stateTransition", json!({})), &[]).unwrap();
    ctx.params.state_transition = Some(StateTransitionParams {
        old_tree_state: Some(old),
        new_tree_state: new,
        is_old_state_genesis: true,
    });
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["oldUserState"], old.state.to_decimal());
    assert_eq!(inputs["newUserState"], new.state.to_decimal());
    assert_eq!(inputs["isOldStateGenesis"], "1");

    let challenge = poseidon::hash(&[old.state, new.state]).unwrap();
    let signature = world.wallet.sign_challenge(&world.holder, &challenge).unwrap();
    assert_eq!(inputs["signatureS"], signature.s().to_decimal());
}

#[test]
fn state_transition_needs_the_auth_claim_in_the_new_state() {
    let world = World::new();
    let empty = TreeState::new(Hash::ZERO, Hash::ZERO, Hash::ZERO).unwrap();
    let mut ctx = world.context(request("stateTransition", json!({})), &[]).unwrap();
    ctx.params.state_transition = Some(StateTransitionParams {
        old_tree_state: None,
        new_tree_state: empty,
        is_old_state_genesis: true,
    });
    let err = world.generator.generate_inputs(&ctx).unwrap_err();
    assert!(matches!(err, GenerationError::Resolution(_)));
}

#[test]
fn linked_multi_query_carries_every_query() {
    let mut world = World::new();
    let credential = world.issue(70, IssuanceProofs::Mtp);
    let req = request(
        "linkedMultiQuery3",
        json!({"countryCode": {"$ne": 840}, "countryName": {}}),
    );
    let mut ctx = world.context(req, &[credential]).unwrap();
    ctx.params.link_nonce = Hash::from_u64(77);
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["linkNonce"], "77");
    assert_eq!(strings(&inputs["operator"]), vec!["6", "16", "0"]);
    assert_eq!(&strings(&inputs["slotIndex"])[..2], &["2", "3"]);
}

#[test]
fn too_many_queries_for_linked_build() {
    let mut world = World::new();
    let credential = world.issue(71, IssuanceProofs::Mtp);
    let req = request(
        "linkedMultiQuery3",
        json!({"a": {"$eq": 1}, "b": {"$eq": 2}, "c": {"$eq": 3}, "d": {"$eq": 4}}),
    );
    let err = world.context(req, &[credential]).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn linked_nullifier_needs_a_verifier() {
    let mut world = World::new();
    let credential = world.issue(80, IssuanceProofs::Mtp);
    let mut req = request("linkedNullifier", json!({}));
    req.params.nullifier_session_id = Some("42".into());
    let mut ctx = world.context(req, &[credential]).unwrap();
    let err = world.generator.generate_inputs(&ctx).unwrap_err();
    assert!(err.is_validation());

    let verifier = MockIdentity::new(5).unwrap();
    ctx.params.verifier_did = Some(verifier.did().clone());
    let inputs = world.generate(&ctx).unwrap();
    assert_eq!(inputs["nullifierSessionID"], "42");
    assert_eq!(inputs["verifierID"], verifier.id().to_hash().to_decimal());
}

#[test]
fn missing_issuance_proof_is_rejected_before_signing() {
    let mut world = World::new();
    let signature_only = world.issue(90, IssuanceProofs::Signature);
    let mtp_only = world.issue(91, IssuanceProofs::Mtp);
    let wallet = Arc::new(CountingWallet {
        inner: world.wallet.clone(),
        signed: AtomicUsize::new(0),
    });
    let generator = InputGenerator::new(
        wallet.clone(),
        world.status.clone(),
        world.state.clone(),
        Arc::new(fields()),
        InputGeneratorConfig::fixed(DateTime::from_timestamp(NOW, 0).unwrap()),
    );

    let cases = [
        ("credentialAtomicQueryMTPV2OnChain", &signature_only, None),
        ("credentialAtomicQuerySigV2OnChain", &mtp_only, None),
        ("credentialAtomicQueryV3OnChain", &signature_only, Some(ProofType::Mtp)),
        ("credentialAtomicQueryV3OnChain", &mtp_only, Some(ProofType::Signature)),
    ];
    for (circuit, credential, proof_type) in cases {
        let mut req = request(circuit, json!({"countryCode": {"$eq": 1242}}));
        req.query.proof_type = proof_type;
        let mut ctx = world.context(req, &[credential.clone()]).unwrap();
        ctx.params.challenge = Some(Hash::from_u64(9));
        let err = generator.generate_inputs(&ctx).unwrap_err();
        assert!(err.is_validation(), "{circuit}: {err}");
    }
    assert_eq!(wallet.signed.load(Ordering::SeqCst), 0);

    let mut ctx = world
        .context(request("credentialAtomicQueryMTPV2OnChain", json!({"countryCode": {"$eq": 1242}})), &[mtp_only])
        .unwrap();
    ctx.params.challenge = Some(Hash::from_u64(9));
    generator.generate_inputs(&ctx).unwrap();
    assert_eq!(wallet.signed.load(Ordering::SeqCst), 1);
}
