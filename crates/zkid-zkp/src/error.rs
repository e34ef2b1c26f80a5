//! # Error Types
//!
//! Errors raised while checking, marshaling, or unmarshaling circuit
//! inputs and public signals.

use thiserror::Error;
use zkid_core::CoreError;

/// Error in circuit input or public signal handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError {
    /// The circuit id string is not in the registry.
    #[error("unknown circuit id: {0}")]
    UnknownCircuit(String),

    /// The query operator is outside the circuit's allow-list.
    #[error("operator not supported: {operator} is not allowed by {circuit}")]
    OperatorNotSupported {
        /// Circuit id.
        circuit: String,
        /// Operator name.
        operator: String,
    },

    /// More queries than the circuit has slots for.
    #[error("{circuit} accepts at most {max} queries, got {got}")]
    TooManyQueries {
        /// Circuit id.
        circuit: String,
        /// Query slots of the circuit.
        max: usize,
        /// Queries requested.
        got: usize,
    },

    /// A required input is absent.
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    /// A query carries more values than the value array holds.
    #[error("too many query values: {got} exceeds {max}")]
    TooManyValues {
        /// Values supplied.
        got: usize,
        /// Value array size.
        max: usize,
    },

    /// Input shape or content is invalid.
    #[error("invalid circuit input: {0}")]
    InvalidInput(String),

    /// Public signals array is malformed.
    #[error("invalid public signals: {0}")]
    InvalidPubSignals(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(String),

    /// A core value was rejected.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for CircuitError {
    fn from(err: serde_json::Error) -> Self {
        CircuitError::Json(err.to_string())
    }
}
