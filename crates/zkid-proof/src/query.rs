//! # Query Request Parsing
//!
//! A request's `credentialSubject` is an object of field predicates:
//!
//! ```json
//! {"birthday": {"$lt": 20000101}, "countryCode": {"$nin": [800, 840]}}
//! ```
//!
//! [`parse_query_request`] turns it into [`PropertyQuery`] values without
//! touching the credential. [`build_queries`] then locates each field in a
//! credential through the [`FieldResolver`] and produces circuit
//! [`Query`] values.
//!
//! ## Rules
//!
//! - An absent or empty `credentialSubject` is a single `$noop` query.
//! - `{"field": {}}` is selective disclosure of `field`.
//! - One operator per field; more is `multiple predicates per field`.
//! - `$in`/`$nin` take an array of at most 64 values, `$between` and
//!   `$nonbetween` exactly two, `$exists` a boolean, every other operator
//!   exactly one scalar.

use serde_json::{Map, Value};
use tracing::debug;
use zkid_core::{Claim, Hash};
use zkid_vc::W3cCredential;
use zkid_zkp::{CircuitFamily, CircuitId, Operator, Query, VALUE_ARRAY_SIZE};

use crate::error::GenerationError;
use crate::ports::{FieldLocation, FieldResolver, PortError};

/// One field predicate from a request.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyQuery {
    /// Queried field; `None` for the no-op query.
    pub field: Option<String>,
    /// Operator.
    pub operator: Operator,
    /// Literal operands in request order.
    pub operands: Vec<Value>,
}

impl PropertyQuery {
    /// The query of a request without predicates.
    pub fn noop() -> Self {
        Self {
            field: None,
            operator: Operator::Noop,
            operands: Vec::new(),
        }
    }
}

/// Parse the `credentialSubject` predicates of a request.
pub fn parse_query_request(subject: Option<&Map<String, Value>>) -> Result<Vec<PropertyQuery>, GenerationError> {
    let Some(subject) = subject.filter(|s| !s.is_empty()) else {
        return Ok(vec![PropertyQuery::noop()]);
    };
    subject.iter().map(|(field, predicate)| parse_predicate(field, predicate)).collect()
}

fn parse_predicate(field: &str, predicate: &Value) -> Result<PropertyQuery, GenerationError> {
    let Value::Object(ops) = predicate else {
        return Err(GenerationError::validation(format!("predicate of {field} must be an object")));
    };
    let mut iter = ops.iter();
    let Some((key, operand)) = iter.next() else {
        return Ok(PropertyQuery {
            field: Some(field.to_string()),
            operator: Operator::Sd,
            operands: Vec::new(),
        });
    };
    if iter.next().is_some() {
        return Err(GenerationError::validation(format!("multiple predicates per field: {field}")));
    }
    let operator: Operator = key.parse().map_err(GenerationError::validation)?;
    let operands = operands_for(field, operator, operand)?;
    Ok(PropertyQuery {
        field: Some(field.to_string()),
        operator,
        operands,
    })
}

fn operands_for(field: &str, operator: Operator, operand: &Value) -> Result<Vec<Value>, GenerationError> {
    let invalid = |what: &str| GenerationError::validation(format!("{operator} on {field} {what}"));
    match operator {
        Operator::Noop | Operator::Sd | Operator::Nullify => Err(invalid("cannot be requested explicitly")),
        Operator::In | Operator::Nin => match operand {
            Value::Array(values) if values.is_empty() => Err(invalid("needs at least one value")),
            Value::Array(values) if values.len() > VALUE_ARRAY_SIZE => {
                Err(invalid(&format!("takes at most {VALUE_ARRAY_SIZE} values, got {}", values.len())))
            }
            Value::Array(values) => Ok(values.clone()),
            _ => Err(invalid("needs an array")),
        },
        Operator::Between | Operator::NonBetween => match operand {
            Value::Array(values) if values.len() == 2 => Ok(values.clone()),
            _ => Err(invalid("needs exactly two values")),
        },
        Operator::Exists => match operand {
            Value::Bool(_) => Ok(vec![operand.clone()]),
            _ => Err(invalid("needs a boolean")),
        },
        _ => match operand {
            Value::Array(_) | Value::Object(_) | Value::Null => Err(invalid("needs exactly one value")),
            scalar => Ok(vec![scalar.clone()]),
        },
    }
}

/// Fail unless `circuit` can evaluate every query of `props`.
pub fn check_support(circuit: CircuitId, props: &[PropertyQuery]) -> Result<(), GenerationError> {
    circuit.check_query_count(props.len()).map_err(GenerationError::validation)?;
    for prop in props {
        circuit.check_operator(prop.operator).map_err(GenerationError::validation)?;
    }
    Ok(())
}

/// Locate and encode `props` against `credential` for `circuit`.
///
/// The V2 query circuits have no disclosure output, so selective
/// disclosure is sent to them as `$eq` against the credential's own value.
pub fn build_queries(
    circuit: CircuitId,
    credential: &W3cCredential,
    core_claim: &Claim,
    props: &[PropertyQuery],
    resolver: &dyn FieldResolver,
) -> Result<Vec<Query>, GenerationError> {
    check_support(circuit, props)?;
    props
        .iter()
        .map(|prop| build_query(circuit, credential, core_claim, prop, resolver))
        .collect()
}

fn build_query(
    circuit: CircuitId,
    credential: &W3cCredential,
    core_claim: &Claim,
    prop: &PropertyQuery,
    resolver: &dyn FieldResolver,
) -> Result<Query, GenerationError> {
    let Some(field) = prop.field.as_deref() else {
        return Ok(Query::slot(0, Operator::Noop, Vec::new()));
    };
    let port = |e: PortError| GenerationError::collaborator(resolver.resolver_name(), e);
    let location = resolver.resolve_field(credential, field).map_err(port)?;

    let mut values = Vec::with_capacity(prop.operands.len());
    for operand in &prop.operands {
        let value = match (prop.operator, operand) {
            (Operator::Exists, Value::Bool(exists)) => Hash::from_u64(u64::from(*exists)),
            _ => resolver.encode_value(credential, field, operand).map_err(port)?,
        };
        values.push(value);
    }

    let mut operator = prop.operator;
    if operator == Operator::Sd && is_v2(circuit) {
        operator = Operator::Eq;
        values = vec![match &location {
            FieldLocation::Slot(slot) => core_claim.slot(slot_position(*slot)?)?,
            FieldLocation::Merklized(vp) => vp.value,
        }];
    }

    debug!(field, operator = %operator, resolver = resolver.resolver_name(), "query field resolved");
    Ok(match location {
        FieldLocation::Slot(slot) => Query::slot(slot, operator, values),
        FieldLocation::Merklized(vp) => Query::merklized(operator, values, vp),
    })
}

fn slot_position(slot: u64) -> Result<usize, GenerationError> {
    usize::try_from(slot)
        .ok()
        .filter(|s| *s < 8)
        .ok_or_else(|| GenerationError::validation(format!("slot index {slot} is outside the claim")))
}

fn is_v2(circuit: CircuitId) -> bool {
    matches!(
        circuit.family(),
        CircuitFamily::AtomicQueryMtpV2
            | CircuitFamily::AtomicQueryMtpV2OnChain
            | CircuitFamily::AtomicQuerySigV2
            | CircuitFamily::AtomicQuerySigV2OnChain
    )
}
