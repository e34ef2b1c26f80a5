//! # Collaborator Ports
//!
//! The input generator reaches outside this workspace through three ports:
//!
//! - [`IdentityWallet`]: the prover's own identity. Signs challenges and
//!   returns the auth claim with its proofs against a tree state.
//! - [`StateStorage`]: read-only access to the global identity state tree.
//! - [`FieldResolver`]: the schema and JSON-LD view of a credential. Locates
//!   a queried field and encodes literal operands as field elements.
//!
//! Credential status resolution is the `zkid-vc` port
//! [`CredentialStatusResolver`](zkid_vc::CredentialStatusResolver).
//!
//! Ports are synchronous and object-safe (`Send + Sync`) so the generator
//! can hold them as `Arc<dyn ...>`. Failures are reported as [`PortError`];
//! any retry policy lives inside the implementation.

use thiserror::Error;
use zkid_core::{Claim, Did, GistProof, Hash, Id, Proof, TreeState};
use zkid_crypto::Signature;
use zkid_vc::W3cCredential;
use zkid_zkp::ValueProof;

/// Failure reported by a collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PortError {
    message: String,
}

impl PortError {
    /// Error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An identity's auth claim with its proofs against one tree state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaimProofs {
    /// The auth BJJ claim.
    pub claim: Claim,
    /// Tree state the proofs are against.
    pub tree_state: TreeState,
    /// Inclusion of the claim in the claims tree.
    pub inc_proof: Proof,
    /// Non-revocation of the claim's nonce in the revocation tree.
    pub non_rev_proof: Proof,
}

/// The prover's identity wallet.
pub trait IdentityWallet: Send + Sync {
    /// Wallet name for logs and errors.
    fn wallet_name(&self) -> &str;

    /// Auth claim of `did` with proofs against `at`, or against the current
    /// state when `at` is `None`.
    fn auth_claim(&self, did: &Did, at: Option<&TreeState>) -> Result<AuthClaimProofs, PortError>;

    /// Sign `challenge` with the key of the auth claim of `did`.
    fn sign_challenge(&self, did: &Did, challenge: &Hash) -> Result<Signature, PortError>;
}

/// Read access to the global identity state tree.
pub trait StateStorage: Send + Sync {
    /// Storage name for logs and errors.
    fn storage_name(&self) -> &str;

    /// Current GIST root with the inclusion or non-inclusion proof of `id`.
    fn gist_proof(&self, id: &Id) -> Result<GistProof, PortError>;
}

/// Where a queried credential field lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLocation {
    /// A fixed slot of the core claim.
    Slot(u64),
    /// A merklized path with its proof against the credential's root.
    Merklized(ValueProof),
}

/// Schema and JSON-LD view of a credential.
pub trait FieldResolver: Send + Sync {
    /// Resolver name for logs and errors.
    fn resolver_name(&self) -> &str;

    /// Locate `field` in `credential`.
    fn resolve_field(&self, credential: &W3cCredential, field: &str) -> Result<FieldLocation, PortError>;

    /// Encode a literal operand of `field` as a field element.
    fn encode_value(
        &self,
        credential: &W3cCredential,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Hash, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Offline;

    impl StateStorage for Offline {
        fn storage_name(&self) -> &str {
            "offline"
        }

        fn gist_proof(&self, _id: &Id) -> Result<GistProof, PortError> {
            Err(PortError::new("state contract unreachable"))
        }
    }

    #[test]
    fn state_storage_is_object_safe() {
        let storage: Arc<dyn StateStorage> = Arc::new(Offline);
        assert_eq!(storage.storage_name(), "offline");
        let id = Id::new([0x0d, 0x01], [1; 27]);
        let err = storage.gist_proof(&id).unwrap_err();
        assert_eq!(err.message(), "state contract unreachable");
    }
}
