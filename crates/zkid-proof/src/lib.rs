//! # zkid-proof: Proof Input Generation
//!
//! Turns a verifier's proof request into circuit inputs, and optionally a
//! proof, for the prover's identity.
//!
//! ## Architecture
//!
//! - **Request** (`request.rs`): the proof request object of authorization
//!   and contract-invoke messages.
//! - **Query** (`query.rs`): `credentialSubject` predicate parsing and
//!   field resolution into circuit queries.
//! - **Ports** (`ports.rs`): the wallet, state storage and field resolver
//!   traits the generator depends on.
//! - **Generator** (`generator.rs`): credential selection and the
//!   per-circuit input dispatch.
//! - **Mock** (`mock.rs`): in-memory collaborators backed by real sparse
//!   Merkle trees.
//!
//! ## Crate Policy
//!
//! - Depends on `zkid-core`, `zkid-crypto`, `zkid-vc` and `zkid-zkp`.
//! - No network or storage I/O of its own; every lookup is a port.
//! - No `unsafe`.

pub mod config;
pub mod error;
pub mod generator;
pub mod mock;
pub mod ports;
pub mod query;
pub mod request;

pub use config::{Clock, InputGeneratorConfig};
pub use error::GenerationError;
pub use generator::{GeneratedInputs, GenerationContext, GenerationParams, InputGenerator, StateTransitionParams};
pub use ports::{AuthClaimProofs, FieldLocation, FieldResolver, IdentityWallet, PortError, StateStorage};
pub use query::{build_queries, check_support, parse_query_request, PropertyQuery};
pub use request::{ProofRequest, QueryRequest, RequestParams};
