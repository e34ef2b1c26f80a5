//! # Mock Collaborators
//!
//! In-memory implementations of every collaborator port, backed by
//! [`SparseMerkleTree`]s so that the inclusion, non-inclusion, revocation
//! and GIST proofs they hand out are real proofs.
//!
//! - [`MockIdentity`]: an identity with claims and revocation trees and a
//!   BJJ auth key. Issues credentials with MTP and/or signature proofs.
//! - [`MockWallet`]: [`IdentityWallet`] over registered identities.
//! - [`MockStatusResolver`]: [`CredentialStatusResolver`] over published
//!   issuer snapshots.
//! - [`MockStateStorage`]: [`StateStorage`] over a 64-level GIST.
//! - [`MockFieldResolver`]: [`FieldResolver`] with a fixed field map.
//!
//! These are for tests and local tooling. They provide no persistence.

use std::collections::HashMap;
use std::fmt::Display;

use num_bigint::BigUint;
use parking_lot::RwLock;
use serde_json::{json, Value};
use zkid_core::{poseidon, Claim, CoreError, Did, GistProof, Hash, Id, SparseMerkleTree, TreeState};
use zkid_crypto::{PublicKey, SecretScalar, Signature};
use zkid_vc::{CredentialStatus, CredentialStatusResolver, RevocationStatus, VcError, W3cCredential};

use crate::ports::{AuthClaimProofs, FieldLocation, FieldResolver, IdentityWallet, PortError, StateStorage};

const IDENTITY_LEVELS: usize = 40;
const GIST_LEVELS: usize = 64;

fn port(e: impl Display) -> PortError {
    PortError::new(e.to_string())
}

/// Issuance proofs attached by [`MockIdentity::issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceProofs {
    /// Claims tree inclusion only.
    Mtp,
    /// BJJ signature only.
    Signature,
    /// Both.
    Both,
}

/// An identity held in memory.
#[derive(Clone)]
pub struct MockIdentity {
    did: Did,
    id: Id,
    key: SecretScalar,
    auth_claim: Claim,
    claims: SparseMerkleTree,
    revocations: SparseMerkleTree,
}

impl MockIdentity {
    /// Identity derived from `seed`, with its auth claim in the claims tree.
    pub fn new(seed: u64) -> Result<Self, PortError> {
        let mut genesis = [0u8; 27];
        genesis[..8].copy_from_slice(&seed.to_le_bytes());
        genesis[26] = 0x5a;
        let id = Id::new([0x0d, 0x01], genesis);
        let key = SecretScalar::from_biguint(&(BigUint::from(seed) + BigUint::from(1_000_003u64))).map_err(port)?;
        let pk = key.public_key();
        let auth_claim = Claim::auth_bjj(pk.point().x(), pk.point().y(), 0).map_err(port)?;
        let mut claims = SparseMerkleTree::new(IDENTITY_LEVELS);
        let (hi, hv) = auth_claim.hi_hv().map_err(port)?;
        claims.add(hi, hv).map_err(port)?;
        Ok(Self {
            did: Did::new(format!("did:iden3:polygon:amoy:{id}")).map_err(port)?,
            id,
            key,
            auth_claim,
            claims,
            revocations: SparseMerkleTree::new(IDENTITY_LEVELS),
        })
    }

    /// DID of the identity.
    pub fn did(&self) -> &Did {
        &self.did
    }

    /// Numeric id.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Auth BJJ claim.
    pub fn auth_claim(&self) -> &Claim {
        &self.auth_claim
    }

    /// Auth public key.
    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Current tree state. The roots tree is empty.
    pub fn tree_state(&self) -> Result<TreeState, PortError> {
        TreeState::new(self.claims.root(), self.revocations.root(), Hash::ZERO).map_err(port)
    }

    /// Add `claim` to the claims tree.
    pub fn add_claim(&mut self, claim: &Claim) -> Result<(), PortError> {
        let (hi, hv) = claim.hi_hv().map_err(port)?;
        self.claims.add(hi, hv).map_err(port)
    }

    /// Revoke revocation nonce `nonce`.
    pub fn revoke(&mut self, nonce: u64) -> Result<(), PortError> {
        self.revocations.add(Hash::from_u64(nonce), Hash::ZERO).map_err(port)
    }

    /// Sign `msg` with the auth key.
    pub fn sign(&self, msg: &Hash) -> Result<Signature, PortError> {
        self.key.sign_poseidon(msg).map_err(port)
    }

    /// Auth claim proofs against `at`, or the current state.
    pub fn auth_proofs(&self, at: Option<&TreeState>) -> Result<AuthClaimProofs, PortError> {
        let tree_state = match at {
            Some(ts) => *ts,
            None => self.tree_state()?,
        };
        let (hi, _) = self.auth_claim.hi_hv().map_err(port)?;
        let (inc_proof, _) = self.claims.generate_proof_at(&hi, tree_state.claims_root).map_err(port)?;
        let nonce = Hash::from_u64(self.auth_claim.revocation_nonce());
        let (non_rev_proof, _) = self
            .revocations
            .generate_proof_at(&nonce, tree_state.revocation_root)
            .map_err(port)?;
        Ok(AuthClaimProofs {
            claim: self.auth_claim,
            tree_state,
            inc_proof,
            non_rev_proof,
        })
    }

    /// Status object for revocation nonce `nonce`.
    pub fn credential_status(&self, nonce: u64) -> CredentialStatus {
        CredentialStatus {
            id: format!("{}/credentialStatus?revocationNonce={nonce}", self.did),
            status_type: "SparseMerkleTreeProof".into(),
            revocation_nonce: nonce,
            status_issuer: None,
        }
    }

    /// Issue `claim` to `subject` as a credential with `proofs` attached.
    ///
    /// `fields` are the `credentialSubject` fields; the subject `id` is
    /// added. MTP issuance adds the claim to the claims tree first.
    pub fn issue(
        &mut self,
        subject: &Did,
        claim: Claim,
        fields: Value,
        proofs: IssuanceProofs,
    ) -> Result<W3cCredential, PortError> {
        let Value::Object(mut subject_fields) = fields else {
            return Err(PortError::new("credential subject fields must be an object"));
        };
        subject_fields.insert("id".into(), Value::String(subject.to_string()));

        if matches!(proofs, IssuanceProofs::Mtp | IssuanceProofs::Both) {
            self.add_claim(&claim)?;
        }
        let state = state_json(&self.tree_state()?);
        let (hi, hv) = claim.hi_hv().map_err(port)?;
        let mut attached = Vec::new();

        if matches!(proofs, IssuanceProofs::Mtp | IssuanceProofs::Both) {
            let (mtp, _) = self.claims.generate_proof(&hi).map_err(port)?;
            attached.push(json!({
                "type": "Iden3SparseMerkleTreeProof",
                "issuerData": {"id": self.did.to_string(), "state": state.clone()},
                "coreClaim": claim.to_hex(),
                "mtp": serde_json::to_value(&mtp).map_err(port)?,
            }));
        }
        if matches!(proofs, IssuanceProofs::Signature | IssuanceProofs::Both) {
            let msg = poseidon::hash(&[hi, hv]).map_err(port)?;
            let signature = self.sign(&msg)?;
            let (auth_hi, _) = self.auth_claim.hi_hv().map_err(port)?;
            let (auth_mtp, _) = self.claims.generate_proof(&auth_hi).map_err(port)?;
            let auth_status = self.credential_status(self.auth_claim.revocation_nonce());
            attached.push(json!({
                "type": "BJJSignature2021",
                "issuerData": {
                    "id": self.did.to_string(),
                    "state": state,
                    "authCoreClaim": self.auth_claim.to_hex(),
                    "mtp": serde_json::to_value(&auth_mtp).map_err(port)?,
                    "credentialStatus": serde_json::to_value(&auth_status).map_err(port)?,
                },
                "coreClaim": claim.to_hex(),
                "signature": hex::encode(signature.compress()),
            }));
        }

        let nonce = claim.revocation_nonce();
        let status = self.credential_status(nonce);
        serde_json::from_value(json!({
            "id": format!("urn:uuid:00000000-0000-4000-8000-{nonce:012}"),
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential"],
            "issuer": self.did.to_string(),
            "credentialSubject": Value::Object(subject_fields),
            "credentialStatus": serde_json::to_value(&status).map_err(port)?,
            "proof": attached,
        }))
        .map_err(port)
    }
}

fn state_json(ts: &TreeState) -> Value {
    json!({
        "value": ts.state.to_hex(),
        "claimsTreeRoot": ts.claims_root.to_hex(),
        "revocationTreeRoot": ts.revocation_root.to_hex(),
        "rootOfRoots": ts.root_of_roots.to_hex(),
    })
}

/// Wallet over registered [`MockIdentity`] values.
#[derive(Default)]
pub struct MockWallet {
    identities: RwLock<HashMap<Did, MockIdentity>>,
}

impl MockWallet {
    /// Empty wallet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity`, replacing any identity with the same DID.
    pub fn insert(&self, identity: MockIdentity) {
        self.identities.write().insert(identity.did.clone(), identity);
    }

    /// Run `f` on the identity of `did`.
    pub fn update<R>(&self, did: &Did, f: impl FnOnce(&mut MockIdentity) -> R) -> Result<R, PortError> {
        let mut identities = self.identities.write();
        let identity = identities
            .get_mut(did)
            .ok_or_else(|| PortError::new(format!("identity {did} not found")))?;
        Ok(f(identity))
    }

    /// Current tree state of `did`.
    pub fn tree_state(&self, did: &Did) -> Result<TreeState, PortError> {
        self.with(did, MockIdentity::tree_state)
    }

    fn with<R>(&self, did: &Did, f: impl FnOnce(&MockIdentity) -> Result<R, PortError>) -> Result<R, PortError> {
        let identities = self.identities.read();
        let identity = identities
            .get(did)
            .ok_or_else(|| PortError::new(format!("identity {did} not found")))?;
        f(identity)
    }
}

impl IdentityWallet for MockWallet {
    fn wallet_name(&self) -> &str {
        "mock-wallet"
    }

    fn auth_claim(&self, did: &Did, at: Option<&TreeState>) -> Result<AuthClaimProofs, PortError> {
        self.with(did, |identity| identity.auth_proofs(at))
    }

    fn sign_challenge(&self, did: &Did, challenge: &Hash) -> Result<Signature, PortError> {
        self.with(did, |identity| identity.sign(challenge))
    }
}

#[derive(Clone)]
struct IssuerSnapshot {
    state: TreeState,
    revocations: SparseMerkleTree,
}

/// Revocation status over published issuer snapshots.
#[derive(Default)]
pub struct MockStatusResolver {
    issuers: RwLock<HashMap<Did, IssuerSnapshot>>,
}

impl MockStatusResolver {
    /// Resolver with no issuers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the current state and revocation tree of `issuer`.
    pub fn publish(&self, issuer: &MockIdentity) -> Result<(), PortError> {
        let snapshot = IssuerSnapshot {
            state: issuer.tree_state()?,
            revocations: issuer.revocations.clone(),
        };
        self.issuers.write().insert(issuer.did.clone(), snapshot);
        Ok(())
    }
}

impl CredentialStatusResolver for MockStatusResolver {
    fn resolver_name(&self) -> &str {
        "mock-status"
    }

    fn revocation_status(&self, status: &CredentialStatus, issuer: &Did) -> Result<RevocationStatus, VcError> {
        let issuers = self.issuers.read();
        let snapshot = issuers
            .get(issuer)
            .ok_or_else(|| VcError::StatusResolution(format!("issuer {issuer} not published")))?;
        let (mtp, _) = snapshot
            .revocations
            .generate_proof(&Hash::from_u64(status.revocation_nonce))
            .map_err(|e| VcError::StatusResolution(e.to_string()))?;
        Ok(RevocationStatus {
            issuer: snapshot.state,
            mtp,
        })
    }
}

/// Global identity state tree in memory.
pub struct MockStateStorage {
    gist: RwLock<SparseMerkleTree>,
}

impl Default for MockStateStorage {
    fn default() -> Self {
        Self {
            gist: RwLock::new(SparseMerkleTree::new(GIST_LEVELS)),
        }
    }
}

impl MockStateStorage {
    /// Empty GIST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `state` for `id`. Each id can be published once.
    pub fn publish(&self, id: &Id, state: &Hash) -> Result<(), PortError> {
        self.gist.write().add(id.to_hash(), *state).map_err(port)
    }

    /// Current GIST root.
    pub fn root(&self) -> Hash {
        self.gist.read().root()
    }
}

impl StateStorage for MockStateStorage {
    fn storage_name(&self) -> &str {
        "mock-state"
    }

    fn gist_proof(&self, id: &Id) -> Result<GistProof, PortError> {
        let gist = self.gist.read();
        let (proof, _) = gist.generate_proof(&id.to_hash()).map_err(port)?;
        Ok(GistProof {
            root: gist.root(),
            proof,
        })
    }
}

/// Field resolver over a fixed field map.
///
/// Literal operands encode as: unsigned integers as themselves, booleans as
/// 1/0, strings with [`encode_string`].
#[derive(Debug, Clone, Default)]
pub struct MockFieldResolver {
    fields: HashMap<String, FieldLocation>,
}

impl MockFieldResolver {
    /// Resolver with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `field` to claim slot `slot`.
    pub fn with_slot(mut self, field: &str, slot: u64) -> Self {
        self.fields.insert(field.to_string(), FieldLocation::Slot(slot));
        self
    }

    /// Map `field` to a merklized path proof.
    pub fn with_merklized(mut self, field: &str, proof: zkid_zkp::ValueProof) -> Self {
        self.fields.insert(field.to_string(), FieldLocation::Merklized(proof));
        self
    }
}

impl FieldResolver for MockFieldResolver {
    fn resolver_name(&self) -> &str {
        "mock-fields"
    }

    fn resolve_field(&self, _credential: &W3cCredential, field: &str) -> Result<FieldLocation, PortError> {
        self.fields
            .get(field)
            .cloned()
            .ok_or_else(|| PortError::new(format!("field {field} is not in the schema")))
    }

    fn encode_value(&self, _credential: &W3cCredential, field: &str, value: &Value) -> Result<Hash, PortError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(Hash::from_u64)
                .ok_or_else(|| PortError::new(format!("{field}: {n} is not an unsigned integer"))),
            Value::Bool(b) => Ok(Hash::from_u64(u64::from(*b))),
            Value::String(s) => encode_string(s).map_err(port),
            other => Err(PortError::new(format!("{field}: cannot encode {other}"))),
        }
    }
}

/// Field encoding of a string: the sponge hash of its UTF-8 bytes in
/// 31-byte little-endian chunks. The empty string encodes as zero.
pub fn encode_string(text: &str) -> Result<Hash, CoreError> {
    if text.is_empty() {
        return Ok(Hash::ZERO);
    }
    let chunks = text
        .as_bytes()
        .chunks(31)
        .map(|chunk| {
            let mut bytes = [0u8; 32];
            bytes[..chunk.len()].copy_from_slice(chunk);
            Hash::from_le_bytes(&bytes)
        })
        .collect::<Result<Vec<_>, _>>()?;
    poseidon::sponge_hash(&chunks, 16)
}
