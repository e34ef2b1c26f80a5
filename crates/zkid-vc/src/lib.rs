//! # zkid-vc: Verifiable Credentials
//!
//! Credential-side inputs of the proving pipeline.
//!
//! ## Modules
//!
//! - **Credential** (`credential.rs`): W3C credential envelope with an
//!   extensible `credentialSubject` and one or many embedded proofs.
//! - **Proof** (`proof.rs`): the embedded proof objects as a tagged union
//!   (`Iden3SparseMerkleTreeProof` | `BJJSignature2021`), resolved once at
//!   parse time.
//! - **Status** (`status.rs`): credential status, revocation status, the
//!   `CredentialStatusResolver` port, and non-revoked credential selection.
//! - **Circuit claim** (`circuit_claim.rs`): assembles the inclusion,
//!   non-revocation and signature proofs a circuit consumes.
//!
//! ## Crate Policy
//!
//! - Depends on `zkid-core` and `zkid-crypto` internally.
//! - Resolver ports are synchronous, object-safe `Send + Sync` traits.

pub mod circuit_claim;
pub mod credential;
pub mod error;
pub mod proof;
pub mod status;

pub use circuit_claim::{
    select_proof_type, BjjSignatureClaim, CircuitClaim, CircuitClaimBuilder, MtProof,
    PreparedCredential, ProofType,
};
pub use credential::W3cCredential;
pub use error::VcError;
pub use proof::{BjjSignatureProof, CredentialProof, IssuerData, IssuerState, SparseMerkleTreeProof};
pub use status::{
    find_non_revoked_credential, CredentialStatus, CredentialStatusResolver, RevocationStatus,
};
