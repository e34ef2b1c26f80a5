//! # zkid-zkp: Zero-Knowledge Proving
//!
//! Everything between a circuit claim and a Groth16 proof.
//!
//! ## Architecture
//!
//! - **Circuits** (`circuits/`): the circuit registry (`CircuitId`,
//!   families, depth builds, operator allow-lists) and one Input/PubSignals
//!   pair per circuit. Inputs validate and marshal to the witness
//!   calculator's JSON; public signals decode the positional array a proof
//!   carries.
//! - **Query** (`query.rs`): `Query`, `Operator`, value padding, and the
//!   V2/V3/linked query hashes, which must match the in-circuit Poseidon
//!   commitments exactly.
//! - **Witness** (`witness/`): the circom WASM witness engine and the
//!   `.wtns` container.
//! - **Groth16** (`groth16.rs`): proving from a `.zkey`, verification from
//!   a snarkjs key, snarkjs proof JSON.
//! - **Storage** (`storage.rs`): the `CircuitStorage` port with
//!   file-system, in-memory and cached stores.
//! - **Prover** (`traits.rs`, `prover.rs`, `session.rs`): the `ZkProver`
//!   interface and its in-process implementation with scoped curve
//!   sessions.
//!
//! ## Crate Policy
//!
//! - Depends on `zkid-core`, `zkid-crypto` and `zkid-vc` internally.
//! - No `unsafe`.
//! - Verification never fails: every error degrades to `false`.

pub mod circuits;
pub mod error;
pub mod groth16;
pub mod prover;
pub mod query;
pub mod session;
pub mod storage;
pub mod traits;
pub mod witness;

pub use circuits::atomic::{claim_depths, OnChainAuth, QueryPubSignals};
pub use circuits::auth_v2::{AuthV2Inputs, AuthV2PubSignals};
pub use circuits::linked::{
    LinkedMultiQueryInputs, LinkedMultiQueryPubSignals, LinkedNullifierInputs, LinkedNullifierPubSignals,
};
pub use circuits::mtp_v2::{
    AtomicQueryMtpV2Inputs, AtomicQueryMtpV2OnChainInputs, AtomicQueryMtpV2OnChainPubSignals,
    AtomicQueryMtpV2PubSignals,
};
pub use circuits::sig_v2::{
    AtomicQuerySigV2Inputs, AtomicQuerySigV2OnChainInputs, AtomicQuerySigV2OnChainPubSignals,
    AtomicQuerySigV2PubSignals,
};
pub use circuits::state_transition::{StateTransitionInputs, StateTransitionPubSignals};
pub use circuits::v3::{
    AtomicQueryV3Inputs, AtomicQueryV3OnChainInputs, AtomicQueryV3OnChainPubSignals, AtomicQueryV3PubSignals,
    V3Outputs,
};
pub use circuits::{
    select_target_circuit, CircuitFamily, CircuitId, CircuitInputs, CircuitLevels, ProofDepths, PubSignals,
};
pub use error::CircuitError;
pub use prover::NativeProver;
pub use query::{Operator, Query, ValueProof, VALUE_ARRAY_SIZE};
pub use session::{CurveSession, SessionTracker};
pub use storage::{
    CachedCircuitStorage, CircuitData, CircuitStorage, CircuitStorageConfig, ConfigError, FsCircuitStorage,
    MemoryCircuitStorage, StorageError,
};
pub use traits::{ProofData, ProverError, VerifyError, ZkProof, ZkProver};
pub use witness::{Witness, WitnessEngine, WitnessError};
