//! # Witness Computation
//!
//! [`WitnessEngine`] drives a circom witness generator compiled to WASM;
//! [`wtns`] reads and writes the binary `.wtns` container the Groth16
//! backend consumes.
//!
//! The witness holds every private input of the proof, so [`Witness`]
//! zeroizes its values on drop and its `Debug` output shows only the size.

pub mod engine;
pub mod wtns;

use std::fmt;

use ark_bn254::Fr;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use engine::WitnessEngine;

/// Full assignment of a circuit's signals; index 0 is the constant 1.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Witness {
    values: Vec<Fr>,
}

impl Witness {
    /// Wrap computed signal values.
    pub fn from_values(values: Vec<Fr>) -> Self {
        Self { values }
    }

    /// Signal values in witness order.
    pub fn values(&self) -> &[Fr] {
        &self.values
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the witness has no signals.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Witness").field("len", &self.values.len()).finish_non_exhaustive()
    }
}

/// Error while computing or decoding a witness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessError {
    /// The WASM module could not be compiled, linked, or instantiated.
    #[error("witness module: {0}")]
    Module(String),

    /// The module was built by an unsupported circom version.
    #[error("unsupported witness generator version {0}, expected 2")]
    UnsupportedVersion(u32),

    /// The module's field prime is not the BN254 scalar field.
    #[error("witness generator prime {0} is not the BN254 scalar field")]
    PrimeMismatch(String),

    /// The input JSON is malformed.
    #[error("invalid witness input: {0}")]
    InvalidInput(String),

    /// The circuit has no input signal with this name.
    #[error("signal not found: {0}")]
    SignalNotFound(String),

    /// An input signal received the wrong number of values.
    #[error("input signal {name} expects {expected} values, got {got}")]
    InputSize {
        /// Signal name.
        name: String,
        /// Values the signal declares.
        expected: usize,
        /// Values supplied.
        got: usize,
    },

    /// Not every input signal was set before reading the witness.
    #[error("{expected} input values expected, {set} set")]
    IncompleteInputs {
        /// Total input values of the circuit.
        expected: usize,
        /// Values written.
        set: usize,
    },

    /// The circuit raised a runtime exception.
    #[error("witness runtime exception {code}: {message}")]
    Exception {
        /// circom exception code.
        code: i32,
        /// Exception text and accumulated error messages.
        message: String,
    },

    /// The module trapped outside the circom exception protocol.
    #[error("witness trap: {0}")]
    Trap(String),

    /// Malformed `.wtns` bytes.
    #[error("invalid wtns: {0}")]
    Format(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_does_not_print_values() {
        let witness = Witness::from_values(vec![Fr::from(1u64), Fr::from(123_456_789u64)]);
        let text = format!("{witness:?}");
        assert!(text.contains("len: 2"));
        assert!(!text.contains("123456789"));
    }

    #[test]
    fn exception_error_carries_the_message() {
        let err = WitnessError::Exception {
            code: 4,
            message: "Assert Failed. Error in template Foo_1 line: 12".into(),
        };
        assert!(err.to_string().contains("Error in template Foo_1"));
    }
}
