//! Registry-wide checks: every circuit's operator allow-list and query
//! slots, the depth parameters encoded in reduced-build names, and the
//! public signal array lengths.

use std::str::FromStr;

use zkid_core::{Claim, Hash, Id, SchemaHash, SparseMerkleTree};
use zkid_zkp::{
    AtomicQueryMtpV2OnChainPubSignals, AtomicQueryMtpV2PubSignals, AtomicQuerySigV2OnChainPubSignals,
    AtomicQuerySigV2PubSignals, AtomicQueryV3OnChainPubSignals, AtomicQueryV3PubSignals, AuthV2PubSignals,
    CircuitError, CircuitFamily, CircuitId, CircuitInputs, LinkedMultiQueryInputs, LinkedNullifierPubSignals,
    Operator, PubSignals, Query, StateTransitionPubSignals, ValueProof,
};

const V2_SET: [Operator; 8] = [
    Operator::Noop,
    Operator::Eq,
    Operator::Lt,
    Operator::Gt,
    Operator::In,
    Operator::Nin,
    Operator::Ne,
    Operator::Sd,
];

#[test]
fn operator_allow_list_of_every_circuit() {
    for circuit in CircuitId::ALL {
        for op in Operator::ALL {
            let expected = match circuit.family() {
                CircuitFamily::AuthV2 | CircuitFamily::StateTransition | CircuitFamily::LinkedNullifier => false,
                CircuitFamily::AtomicQueryMtpV2
                | CircuitFamily::AtomicQueryMtpV2OnChain
                | CircuitFamily::AtomicQuerySigV2
                | CircuitFamily::AtomicQuerySigV2OnChain => V2_SET.contains(&op),
                CircuitFamily::AtomicQueryV3
                | CircuitFamily::AtomicQueryV3OnChain
                | CircuitFamily::LinkedMultiQuery => true,
            };
            assert_eq!(circuit.supports_operator(op), expected, "{circuit} {op}");
            assert_eq!(circuit.check_operator(op).is_ok(), expected, "{circuit} {op}");
        }
    }
}

#[test]
fn query_slots_of_every_circuit() {
    for circuit in CircuitId::ALL {
        let max = circuit.max_queries();
        assert!(circuit.check_query_count(max).is_ok(), "{circuit}");
        let err = circuit.check_query_count(max + 1).unwrap_err();
        assert!(matches!(err, CircuitError::TooManyQueries { .. }), "{circuit}");
    }
}

#[test]
fn reduced_build_names_match_their_levels() {
    for circuit in CircuitId::ALL {
        let name = circuit.as_str();
        let parts: Vec<&str> = name.split('-').collect();
        if parts.len() == 1 {
            assert!(circuit.sub_variants().iter().all(|v| v.nominal() == circuit));
            continue;
        }
        let levels = circuit.levels();
        let numbers: Vec<usize> = parts[1..].iter().map(|p| p.parse().unwrap()).collect();
        assert_eq!(numbers[0], levels.identity, "{name}");
        assert_eq!(numbers[1], levels.claim, "{name}");
        assert_eq!(numbers[2], levels.value_array, "{name}");
        if numbers.len() == 5 {
            assert_eq!(numbers[3], levels.identity, "{name}");
            assert_eq!(numbers[4], levels.gist, "{name}");
        }
        assert_ne!(circuit.nominal(), circuit);
        assert_eq!(circuit.nominal().family(), circuit.family());
        assert!(circuit.nominal().sub_variants().contains(&circuit));
        assert_eq!(CircuitId::from_str(name).unwrap(), circuit);
    }
}

#[test]
fn public_signal_counts_are_enforced() {
    fn count<P: PubSignals>(n: usize) -> Result<P, CircuitError> {
        let signals = vec!["0".to_string(); n];
        P::pub_signals_unmarshal(&serde_json::to_vec(&signals).unwrap())
    }
    fn rejects_wrong_length<P: PubSignals>(expected: usize) {
        assert!(matches!(count::<P>(expected - 1), Err(CircuitError::InvalidPubSignals(_))));
        assert!(matches!(count::<P>(expected + 1), Err(CircuitError::InvalidPubSignals(_))));
    }

    rejects_wrong_length::<AuthV2PubSignals>(3);
    rejects_wrong_length::<StateTransitionPubSignals>(4);
    rejects_wrong_length::<AtomicQueryMtpV2PubSignals>(13 + 64);
    rejects_wrong_length::<AtomicQuerySigV2PubSignals>(13 + 64);
    rejects_wrong_length::<AtomicQueryMtpV2OnChainPubSignals>(11);
    rejects_wrong_length::<AtomicQueryV3PubSignals>(14);
    rejects_wrong_length::<LinkedNullifierPubSignals>(4);
    assert!(count::<AtomicQuerySigV2OnChainPubSignals>(0).is_err());
    assert!(count::<AtomicQueryV3OnChainPubSignals>(0).is_err());
}

#[test]
fn signals_must_be_decimal_strings() {
    let data = serde_json::to_vec(&vec!["0x01", "2", "3"]).unwrap();
    assert!(AuthV2PubSignals::pub_signals_unmarshal(&data).is_err());
    assert!(AuthV2PubSignals::pub_signals_unmarshal(b"not json").is_err());
}

#[test]
fn linked_multi_query_pads_every_slot() {
    let mut tree = SparseMerkleTree::new(32);
    let path = Hash::from_u64(77);
    tree.add(path, Hash::from_u64(1)).unwrap();
    tree.add(Hash::from_u64(78), Hash::from_u64(2)).unwrap();
    let (mtp, value) = tree.generate_proof(&path).unwrap();
    let merklized = Query::merklized(
        Operator::Eq,
        vec![value],
        ValueProof { path, value, mtp },
    );
    let inputs = LinkedMultiQueryInputs {
        circuit_id: CircuitId::LinkedMultiQuery5,
        link_nonce: Hash::from_u64(9),
        claim: Claim::new(SchemaHash::from_hex("2e2d1c11ad3e500de68d7ce16a0a559e").unwrap()),
        queries: vec![merklized, Query::slot(2, Operator::Lt, vec![Hash::from_u64(10)])],
    };
    let json: serde_json::Value = serde_json::from_slice(&inputs.inputs_marshal().unwrap()).unwrap();

    let paths = json["claimPathMtp"].as_array().unwrap();
    assert_eq!(paths.len(), 5);
    assert!(paths.iter().all(|p| p.as_array().unwrap().len() == 32));
    assert_eq!(json["claimPathKey"][0], "77");
    assert_eq!(json["claimPathKey"][1], "0");
    assert_eq!(json["operator"], serde_json::json!(["1", "2", "0", "0", "0"]));
    assert_eq!(json["valueArraySize"], serde_json::json!(["1", "1", "0", "0", "0"]));
    assert!(json["value"].as_array().unwrap().iter().all(|v| v.as_array().unwrap().len() == 64));
}

#[test]
fn ids_decode_from_user_signals() {
    let user = Id::new([0x0d, 0x01], [0x11; 27]);
    let signals = vec![user.to_hash().to_decimal(), "5".into(), "6".into()];
    let out = AuthV2PubSignals::pub_signals_unmarshal(&serde_json::to_vec(&signals).unwrap()).unwrap();
    assert_eq!(out.user_id, user);
    assert_eq!(out.challenge, Hash::from_u64(5));
    assert_eq!(out.gist_root, Hash::from_u64(6));
}
