//! # Credential Status and Revocation
//!
//! A credential's `credentialStatus` names where its revocation nonce can
//! be checked. Resolving it yields a [`RevocationStatus`]: the issuer's
//! current tree state plus a proof for the nonce in the issuer's revocation
//! tree. `mtp.existence == true` means the nonce is present, i.e. the
//! credential is revoked.
//!
//! Resolution itself (reverse hash service, on-chain lookup, issuer agent)
//! is a collaborator behind [`CredentialStatusResolver`]. Retry policy, if
//! any, belongs to the collaborator.

use serde::{Deserialize, Serialize};
use tracing::debug;
use zkid_core::{Did, Proof, TreeState};

use crate::credential::W3cCredential;
use crate::error::VcError;

/// The `credentialStatus` object of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    /// Status endpoint or contract reference.
    pub id: String,
    /// Status method, e.g. `SparseMerkleTreeProof`.
    #[serde(rename = "type")]
    pub status_type: String,
    /// Revocation nonce of the claim.
    pub revocation_nonce: u64,
    /// Status of the status issuer, for delegated status services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_issuer: Option<Box<CredentialStatus>>,
}

/// Issuer tree state plus a revocation tree proof for one nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationStatus {
    /// Issuer state the proof is against.
    pub issuer: TreeState,
    /// Proof for the nonce in the revocation tree.
    pub mtp: Proof,
}

impl RevocationStatus {
    /// Whether the nonce is present in the revocation tree.
    pub fn is_revoked(&self) -> bool {
        self.mtp.existence()
    }
}

/// Resolves credential status objects.
///
/// Implementations must be object-safe (`Send + Sync`) so the generator can
/// hold them as `Arc<dyn CredentialStatusResolver>`.
pub trait CredentialStatusResolver: Send + Sync {
    /// Human-readable resolver name for logs.
    fn resolver_name(&self) -> &str;

    /// Resolve the revocation status for `status`, issued by `issuer`.
    fn revocation_status(
        &self,
        status: &CredentialStatus,
        issuer: &Did,
    ) -> Result<RevocationStatus, VcError>;
}

/// First candidate whose revocation nonce is absent from its issuer's
/// revocation tree, with its resolved status.
///
/// Candidates are checked in order and the first non-revoked one wins.
pub fn find_non_revoked_credential<'a>(
    candidates: &'a [W3cCredential],
    resolver: &dyn CredentialStatusResolver,
) -> Result<(&'a W3cCredential, RevocationStatus), VcError> {
    for credential in candidates {
        let issuer = credential.issuer_did()?;
        let status = resolver.revocation_status(&credential.credential_status, &issuer)?;
        if status.is_revoked() {
            debug!(
                resolver = resolver.resolver_name(),
                nonce = credential.credential_status.revocation_nonce,
                "skipping revoked credential"
            );
            continue;
        }
        return Ok((credential, status));
    }
    Err(VcError::AllClaimsRevoked)
}
