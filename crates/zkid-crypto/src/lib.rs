//! # zkid-crypto: Cryptographic Primitives
//!
//! Provides the Baby Jubjub curve used for iden3 auth keys and EdDSA
//! signatures hashed with Poseidon.
//!
//! ## Modules
//!
//! - **Baby Jubjub** (`babyjub.rs`): twisted Edwards arithmetic over BN254
//!   Fr, point compression, compressed signature decoding, and
//!   EdDSA-Poseidon signing and verification.
//!
//! ## Crate Policy
//!
//! - Depends only on `zkid-core` internally.
//! - Secret scalars are zeroized on drop.
//! - No `unsafe` code.

pub mod babyjub;
pub mod error;

pub use babyjub::{Point, PublicKey, SecretScalar, Signature};
pub use error::CryptoError;
