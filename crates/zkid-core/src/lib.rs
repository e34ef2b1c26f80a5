//! # zkid-core: Foundational Types for the zkid Identity Stack
//!
//! This crate defines the value types every other crate in the workspace
//! builds on. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One field-element type.** `Hash` wraps a BN254 scalar field element.
//!    Every Merkle root, claim slot, and circuit signal value flows through
//!    it, and every conversion from text or bytes rejects values outside the
//!    field.
//!
//! 2. **Circom-compatible Poseidon only.** `poseidon::hash` and
//!    `poseidon::sponge_hash` are the only hashing entry points. They must
//!    bit-match the in-circuit hash.
//!
//! 3. **Validated identifiers.** `Id` is constructed with its checksum, and
//!    `Did` is a validated string wrapper. No bare byte arrays or strings.
//!
//! 4. **Immutable claims and proofs.** `Claim`, `Proof`, `TreeState` and
//!    `GistProof` are request-scoped values with invariants checked on
//!    construction.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `zkid-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod claim;
pub mod error;
pub mod field;
pub mod identity;
pub mod merkle;
pub mod poseidon;
pub mod smt;
pub mod state;

// Re-export primary types for ergonomic imports.
pub use claim::{Claim, MerklizedPosition, SchemaHash, SubjectFlag, AUTH_BJJ_SCHEMA_HASH};
pub use error::{CoreError, TreeError};
pub use field::Hash;
pub use identity::{Did, Id};
pub use merkle::{NodeAux, Proof};
pub use smt::SparseMerkleTree;
pub use state::{GistProof, TreeState};
