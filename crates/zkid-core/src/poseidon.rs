//! # Poseidon Hashing
//!
//! Circom-parameterised Poseidon over BN254 via `light-poseidon`. These
//! functions are the only hashing entry points in the stack: claim
//! hashing, Merkle nodes, identity state and query commitments all go
//! through them, and each must bit-match the in-circuit computation.
//!
//! ## Sponge
//!
//! `sponge_hash` absorbs an arbitrary-length input in frames of
//! `frame_size` elements. The first frame takes `frame_size` inputs; every
//! later frame starts with the previous digest and takes `frame_size - 1`
//! inputs. A trailing partial frame is zero-filled and hashed.

use ark_bn254::Fr;
use ark_ff::AdditiveGroup;
use light_poseidon::{Poseidon, PoseidonHasher};

use crate::error::CoreError;
use crate::field::Hash;

/// Largest input arity supported by the circom parameter set.
pub const MAX_WIDTH: usize = 12;

/// Upper bound on sponge input length.
pub const SPONGE_MAX_INPUTS: usize = 256;

/// Poseidon hash of up to [`MAX_WIDTH`] field elements.
pub fn hash_fr(inputs: &[Fr]) -> Result<Fr, CoreError> {
    if inputs.is_empty() || inputs.len() > MAX_WIDTH {
        return Err(CoreError::Poseidon(format!(
            "unsupported input count {}, expected 1..={MAX_WIDTH}",
            inputs.len()
        )));
    }
    let mut hasher =
        Poseidon::<Fr>::new_circom(inputs.len()).map_err(|e| CoreError::Poseidon(e.to_string()))?;
    hasher
        .hash(inputs)
        .map_err(|e| CoreError::Poseidon(e.to_string()))
}

/// Poseidon hash of up to [`MAX_WIDTH`] hashes.
pub fn hash(inputs: &[Hash]) -> Result<Hash, CoreError> {
    let elems: Vec<Fr> = inputs.iter().map(Hash::fr).collect();
    hash_fr(&elems).map(Hash::from_fr)
}

/// Sponge hash with the given frame size (`2..=16`).
pub fn sponge_hash(inputs: &[Hash], frame_size: usize) -> Result<Hash, CoreError> {
    if !(2..=16).contains(&frame_size) || frame_size > MAX_WIDTH {
        return Err(CoreError::Poseidon(format!(
            "unsupported sponge frame size {frame_size}"
        )));
    }
    if inputs.is_empty() || inputs.len() > SPONGE_MAX_INPUTS {
        return Err(CoreError::Poseidon(format!(
            "unsupported sponge input count {}",
            inputs.len()
        )));
    }

    let mut frame = vec![Fr::ZERO; frame_size];
    let mut digest = Fr::ZERO;
    let mut dirty = false;
    let mut k = 0;
    for input in inputs {
        dirty = true;
        frame[k] = input.fr();
        if k == frame_size - 1 {
            digest = hash_fr(&frame)?;
            dirty = false;
            frame = vec![Fr::ZERO; frame_size];
            frame[0] = digest;
            k = 1;
        } else {
            k += 1;
        }
    }
    if dirty {
        digest = hash_fr(&frame)?;
    }
    Ok(Hash::from_fr(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_of_one_two_matches_circomlib() {
        let h = hash(&[Hash::from_u64(1), Hash::from_u64(2)]).unwrap();
        assert_eq!(
            h.to_decimal(),
            "7853200120776062878684798364095072458815029376092732009249414926327459813530"
        );
    }

    #[test]
    fn width_bounds_are_enforced() {
        assert!(hash(&[]).is_err());
        assert!(hash(&vec![Hash::ZERO; MAX_WIDTH + 1]).is_err());
        assert!(hash(&vec![Hash::ZERO; MAX_WIDTH]).is_ok());
    }

    #[test]
    fn sponge_of_one_full_frame_is_plain_hash() {
        let inputs: Vec<Hash> = (1..=6).map(Hash::from_u64).collect();
        assert_eq!(sponge_hash(&inputs, 6).unwrap(), hash(&inputs).unwrap());
    }

    #[test]
    fn sponge_pads_partial_frame_with_zeros() {
        let inputs = [Hash::from_u64(7), Hash::from_u64(8)];
        let expected = hash(&[
            Hash::from_u64(7),
            Hash::from_u64(8),
            Hash::ZERO,
            Hash::ZERO,
            Hash::ZERO,
            Hash::ZERO,
        ])
        .unwrap();
        assert_eq!(sponge_hash(&inputs, 6).unwrap(), expected);
    }

    #[test]
    fn sponge_chains_previous_digest() {
        let inputs: Vec<Hash> = (1..=8).map(Hash::from_u64).collect();
        let first = hash(&inputs[..6]).unwrap();
        let expected = hash(&[
            first,
            Hash::from_u64(7),
            Hash::from_u64(8),
            Hash::ZERO,
            Hash::ZERO,
            Hash::ZERO,
        ])
        .unwrap();
        assert_eq!(sponge_hash(&inputs, 6).unwrap(), expected);
    }

    #[test]
    fn sponge_rejects_bad_frame_and_length() {
        assert!(sponge_hash(&[Hash::ZERO], 1).is_err());
        assert!(sponge_hash(&[], 6).is_err());
        assert!(sponge_hash(&vec![Hash::ZERO; SPONGE_MAX_INPUTS + 1], 6).is_err());
    }
}
