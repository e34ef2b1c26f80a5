//! # Circuit Registry
//!
//! Every supported circuit by its string id, with the fixed parameters the
//! compiled circuit was built with: Merkle depths, value array size, query
//! slots, and the operator allow-list.
//!
//! ## Families
//!
//! [`CircuitFamily`] groups ids that share one input layout. Consumers
//! dispatch on the family with an exhaustive `match`.
//!
//! ## Sub-variants
//!
//! V3 circuits ship in reduced-depth builds (`-16-16-64`, `-8-8-64`, and
//! the on-chain `-16-16-64-16-32`, `-8-8-64-8-32`). [`select_target_circuit`]
//! picks the smallest build whose depths fit every proof of a request.

pub mod atomic;
pub mod auth_v2;
pub mod linked;
pub mod marshal;
pub mod mtp_v2;
pub mod sig_v2;
pub mod state_transition;
pub mod v3;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CircuitError;
use crate::query::{Operator, VALUE_ARRAY_SIZE};

/// Circuits with a registered input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CircuitId {
    /// `authV2`.
    AuthV2,
    /// `stateTransition`.
    StateTransition,
    /// `credentialAtomicQueryMTPV2`.
    AtomicQueryMtpV2,
    /// `credentialAtomicQueryMTPV2OnChain`.
    AtomicQueryMtpV2OnChain,
    /// `credentialAtomicQuerySigV2`.
    AtomicQuerySigV2,
    /// `credentialAtomicQuerySigV2OnChain`.
    AtomicQuerySigV2OnChain,
    /// `credentialAtomicQueryV3`.
    AtomicQueryV3,
    /// `credentialAtomicQueryV3-16-16-64`.
    AtomicQueryV3Levels16,
    /// `credentialAtomicQueryV3-8-8-64`.
    AtomicQueryV3Levels8,
    /// `credentialAtomicQueryV3OnChain`.
    AtomicQueryV3OnChain,
    /// `credentialAtomicQueryV3OnChain-16-16-64-16-32`.
    AtomicQueryV3OnChainLevels16,
    /// `credentialAtomicQueryV3OnChain-8-8-64-8-32`.
    AtomicQueryV3OnChainLevels8,
    /// `linkedMultiQuery3`.
    LinkedMultiQuery3,
    /// `linkedMultiQuery5`.
    LinkedMultiQuery5,
    /// `linkedMultiQuery10`.
    LinkedMultiQuery10,
    /// `linkedNullifier`.
    LinkedNullifier,
}

/// Input layout shared by a group of circuit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitFamily {
    /// Authentication.
    AuthV2,
    /// Identity state transition.
    StateTransition,
    /// Off-chain MTP query.
    AtomicQueryMtpV2,
    /// On-chain MTP query.
    AtomicQueryMtpV2OnChain,
    /// Off-chain signature query.
    AtomicQuerySigV2,
    /// On-chain signature query.
    AtomicQuerySigV2OnChain,
    /// Off-chain V3 query, any depth build.
    AtomicQueryV3,
    /// On-chain V3 query, any depth build.
    AtomicQueryV3OnChain,
    /// Linked multi-query, any query count.
    LinkedMultiQuery,
    /// Linked nullifier.
    LinkedNullifier,
}

/// Fixed Merkle depths of a compiled circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitLevels {
    /// Identity trees: claims, revocation, roots.
    pub identity: usize,
    /// Credential claim path tree.
    pub claim: usize,
    /// Global identity state tree.
    pub gist: usize,
    /// Query value array.
    pub value_array: usize,
}

impl CircuitLevels {
    const fn new(identity: usize, claim: usize, gist: usize) -> Self {
        Self {
            identity,
            claim,
            gist,
            value_array: VALUE_ARRAY_SIZE,
        }
    }
}

/// Actual depths of the proofs in one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProofDepths {
    /// Deepest identity tree proof.
    pub identity: usize,
    /// Deepest claim path proof.
    pub claim: usize,
    /// GIST proof depth.
    pub gist: usize,
}

impl ProofDepths {
    /// Whether every depth fits `levels`.
    pub fn fit(&self, levels: &CircuitLevels) -> bool {
        self.identity <= levels.identity && self.claim <= levels.claim && self.gist <= levels.gist
    }
}

const V2_OPERATORS: &[Operator] = &[
    Operator::Noop,
    Operator::Eq,
    Operator::Lt,
    Operator::Gt,
    Operator::In,
    Operator::Nin,
    Operator::Ne,
    Operator::Sd,
];

impl CircuitId {
    /// Every registered circuit.
    pub const ALL: [CircuitId; 16] = [
        CircuitId::AuthV2,
        CircuitId::StateTransition,
        CircuitId::AtomicQueryMtpV2,
        CircuitId::AtomicQueryMtpV2OnChain,
        CircuitId::AtomicQuerySigV2,
        CircuitId::AtomicQuerySigV2OnChain,
        CircuitId::AtomicQueryV3,
        CircuitId::AtomicQueryV3Levels16,
        CircuitId::AtomicQueryV3Levels8,
        CircuitId::AtomicQueryV3OnChain,
        CircuitId::AtomicQueryV3OnChainLevels16,
        CircuitId::AtomicQueryV3OnChainLevels8,
        CircuitId::LinkedMultiQuery3,
        CircuitId::LinkedMultiQuery5,
        CircuitId::LinkedMultiQuery10,
        CircuitId::LinkedNullifier,
    ];

    /// Registry string id.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitId::AuthV2 => "authV2",
            CircuitId::StateTransition => "stateTransition",
            CircuitId::AtomicQueryMtpV2 => "credentialAtomicQueryMTPV2",
            CircuitId::AtomicQueryMtpV2OnChain => "credentialAtomicQueryMTPV2OnChain",
            CircuitId::AtomicQuerySigV2 => "credentialAtomicQuerySigV2",
            CircuitId::AtomicQuerySigV2OnChain => "credentialAtomicQuerySigV2OnChain",
            CircuitId::AtomicQueryV3 => "credentialAtomicQueryV3",
            CircuitId::AtomicQueryV3Levels16 => "credentialAtomicQueryV3-16-16-64",
            CircuitId::AtomicQueryV3Levels8 => "credentialAtomicQueryV3-8-8-64",
            CircuitId::AtomicQueryV3OnChain => "credentialAtomicQueryV3OnChain",
            CircuitId::AtomicQueryV3OnChainLevels16 => "credentialAtomicQueryV3OnChain-16-16-64-16-32",
            CircuitId::AtomicQueryV3OnChainLevels8 => "credentialAtomicQueryV3OnChain-8-8-64-8-32",
            CircuitId::LinkedMultiQuery3 => "linkedMultiQuery3",
            CircuitId::LinkedMultiQuery5 => "linkedMultiQuery5",
            CircuitId::LinkedMultiQuery10 => "linkedMultiQuery10",
            CircuitId::LinkedNullifier => "linkedNullifier",
        }
    }

    /// Input layout family.
    pub fn family(&self) -> CircuitFamily {
        match self {
            CircuitId::AuthV2 => CircuitFamily::AuthV2,
            CircuitId::StateTransition => CircuitFamily::StateTransition,
            CircuitId::AtomicQueryMtpV2 => CircuitFamily::AtomicQueryMtpV2,
            CircuitId::AtomicQueryMtpV2OnChain => CircuitFamily::AtomicQueryMtpV2OnChain,
            CircuitId::AtomicQuerySigV2 => CircuitFamily::AtomicQuerySigV2,
            CircuitId::AtomicQuerySigV2OnChain => CircuitFamily::AtomicQuerySigV2OnChain,
            CircuitId::AtomicQueryV3 | CircuitId::AtomicQueryV3Levels16 | CircuitId::AtomicQueryV3Levels8 => {
                CircuitFamily::AtomicQueryV3
            }
            CircuitId::AtomicQueryV3OnChain
            | CircuitId::AtomicQueryV3OnChainLevels16
            | CircuitId::AtomicQueryV3OnChainLevels8 => CircuitFamily::AtomicQueryV3OnChain,
            CircuitId::LinkedMultiQuery3 | CircuitId::LinkedMultiQuery5 | CircuitId::LinkedMultiQuery10 => {
                CircuitFamily::LinkedMultiQuery
            }
            CircuitId::LinkedNullifier => CircuitFamily::LinkedNullifier,
        }
    }

    /// Fixed Merkle depths.
    pub fn levels(&self) -> CircuitLevels {
        match self {
            CircuitId::AtomicQueryV3Levels16 => CircuitLevels::new(16, 16, 64),
            CircuitId::AtomicQueryV3Levels8 => CircuitLevels::new(8, 8, 64),
            CircuitId::AtomicQueryV3OnChainLevels16 => CircuitLevels::new(16, 16, 32),
            CircuitId::AtomicQueryV3OnChainLevels8 => CircuitLevels::new(8, 8, 32),
            _ => CircuitLevels::new(40, 32, 64),
        }
    }

    /// Query slots. Zero for circuits that take no query.
    pub fn max_queries(&self) -> usize {
        match self {
            CircuitId::AuthV2 | CircuitId::StateTransition | CircuitId::LinkedNullifier => 0,
            CircuitId::LinkedMultiQuery3 => 3,
            CircuitId::LinkedMultiQuery5 => 5,
            CircuitId::LinkedMultiQuery10 => 10,
            _ => 1,
        }
    }

    /// Operators the circuit evaluates.
    pub fn supported_operators(&self) -> &'static [Operator] {
        match self.family() {
            CircuitFamily::AuthV2 | CircuitFamily::StateTransition | CircuitFamily::LinkedNullifier => &[],
            CircuitFamily::AtomicQueryMtpV2
            | CircuitFamily::AtomicQueryMtpV2OnChain
            | CircuitFamily::AtomicQuerySigV2
            | CircuitFamily::AtomicQuerySigV2OnChain => V2_OPERATORS,
            CircuitFamily::AtomicQueryV3 | CircuitFamily::AtomicQueryV3OnChain | CircuitFamily::LinkedMultiQuery => {
                &Operator::ALL
            }
        }
    }

    /// Whether `operator` is in the allow-list.
    pub fn supports_operator(&self, operator: Operator) -> bool {
        self.supported_operators().contains(&operator)
    }

    /// Fail unless `operator` is in the allow-list.
    pub fn check_operator(&self, operator: Operator) -> Result<(), CircuitError> {
        if self.supports_operator(operator) {
            return Ok(());
        }
        Err(CircuitError::OperatorNotSupported {
            circuit: self.as_str().to_string(),
            operator: operator.to_string(),
        })
    }

    /// Fail when `count` queries exceed the circuit's slots.
    pub fn check_query_count(&self, count: usize) -> Result<(), CircuitError> {
        let max = self.max_queries();
        if count > max {
            return Err(CircuitError::TooManyQueries {
                circuit: self.as_str().to_string(),
                max,
                got: count,
            });
        }
        Ok(())
    }

    /// Reduced-depth builds of this circuit, smallest first.
    pub fn sub_variants(&self) -> &'static [CircuitId] {
        match self {
            CircuitId::AtomicQueryV3 => &[CircuitId::AtomicQueryV3Levels8, CircuitId::AtomicQueryV3Levels16],
            CircuitId::AtomicQueryV3OnChain => &[
                CircuitId::AtomicQueryV3OnChainLevels8,
                CircuitId::AtomicQueryV3OnChainLevels16,
            ],
            _ => &[],
        }
    }

    /// Full-depth id of this circuit's family.
    pub fn nominal(&self) -> CircuitId {
        match self {
            CircuitId::AtomicQueryV3Levels16 | CircuitId::AtomicQueryV3Levels8 => CircuitId::AtomicQueryV3,
            CircuitId::AtomicQueryV3OnChainLevels16 | CircuitId::AtomicQueryV3OnChainLevels8 => {
                CircuitId::AtomicQueryV3OnChain
            }
            other => *other,
        }
    }

    /// Whether the circuit produces proofs for on-chain verifiers.
    pub fn is_on_chain(&self) -> bool {
        matches!(
            self.family(),
            CircuitFamily::AtomicQueryMtpV2OnChain
                | CircuitFamily::AtomicQuerySigV2OnChain
                | CircuitFamily::AtomicQueryV3OnChain
        )
    }
}

/// Smallest build of `nominal` whose depths fit `depths`, or the nominal id
/// itself when no reduced build fits.
pub fn select_target_circuit(nominal: CircuitId, depths: &ProofDepths) -> CircuitId {
    nominal
        .nominal()
        .sub_variants()
        .iter()
        .copied()
        .find(|variant| depths.fit(&variant.levels()))
        .unwrap_or_else(|| nominal.nominal())
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CircuitError::UnknownCircuit(s.to_string()))
    }
}

impl Serialize for CircuitId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CircuitId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Circuit inputs that can be checked and serialized for the witness
/// calculator.
pub trait CircuitInputs {
    /// Circuit the inputs are laid out for.
    fn circuit_id(&self) -> CircuitId;

    /// Check required fields and shape.
    fn validate(&self) -> Result<(), CircuitError>;

    /// Validate, then serialize to the witness calculator's JSON object
    /// with every value as a decimal string.
    fn inputs_marshal(&self) -> Result<Vec<u8>, CircuitError>;
}

/// Public signals decoded from a proof's positional signal array.
pub trait PubSignals: Sized {
    /// Decode from the JSON array of decimal strings.
    fn pub_signals_unmarshal(data: &[u8]) -> Result<Self, CircuitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        for id in CircuitId::ALL {
            assert_eq!(id.as_str().parse::<CircuitId>().unwrap(), id);
        }
        assert_eq!(
            "credentialAtomicQueryV4".parse::<CircuitId>().unwrap_err(),
            CircuitError::UnknownCircuit("credentialAtomicQueryV4".into())
        );
    }

    #[test]
    fn v2_allow_list() {
        let sig = CircuitId::AtomicQuerySigV2;
        for op in [Operator::Lte, Operator::Gte, Operator::Between, Operator::NonBetween, Operator::Exists] {
            let err = sig.check_operator(op).unwrap_err();
            assert!(err.to_string().starts_with("operator not supported"));
        }
        assert!(sig.check_operator(Operator::Sd).is_ok());
        assert!(CircuitId::AtomicQueryV3.check_operator(Operator::Between).is_ok());
        assert!(CircuitId::AuthV2.check_operator(Operator::Eq).is_err());
    }

    #[test]
    fn query_slots() {
        assert_eq!(CircuitId::LinkedMultiQuery10.max_queries(), 10);
        assert!(CircuitId::AtomicQueryMtpV2.check_query_count(2).is_err());
        assert!(CircuitId::AuthV2.check_query_count(0).is_ok());
    }

    #[test]
    fn smallest_fitting_sub_variant_is_selected() {
        let shallow = ProofDepths { identity: 5, claim: 3, gist: 10 };
        assert_eq!(
            select_target_circuit(CircuitId::AtomicQueryV3, &shallow),
            CircuitId::AtomicQueryV3Levels8
        );
        let medium = ProofDepths { identity: 12, claim: 3, gist: 10 };
        assert_eq!(
            select_target_circuit(CircuitId::AtomicQueryV3, &medium),
            CircuitId::AtomicQueryV3Levels16
        );
        let deep = ProofDepths { identity: 30, claim: 3, gist: 10 };
        assert_eq!(select_target_circuit(CircuitId::AtomicQueryV3, &deep), CircuitId::AtomicQueryV3);
    }

    #[test]
    fn on_chain_sub_variant_respects_gist_depth() {
        let depths = ProofDepths { identity: 4, claim: 4, gist: 12 };
        assert_eq!(
            select_target_circuit(CircuitId::AtomicQueryV3OnChain, &depths),
            CircuitId::AtomicQueryV3OnChainLevels8
        );
        let deep_gist = ProofDepths { identity: 4, claim: 4, gist: 40 };
        assert_eq!(
            select_target_circuit(CircuitId::AtomicQueryV3OnChain, &deep_gist),
            CircuitId::AtomicQueryV3OnChain
        );
        assert_eq!(
            select_target_circuit(CircuitId::AtomicQueryMtpV2, &depths),
            CircuitId::AtomicQueryMtpV2
        );
    }

    #[test]
    fn sub_variants_share_the_family() {
        for id in CircuitId::ALL {
            for variant in id.sub_variants() {
                assert_eq!(variant.family(), id.family());
                assert_eq!(variant.nominal(), id);
            }
        }
    }
}
