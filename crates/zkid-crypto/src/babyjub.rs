//! # Baby Jubjub and EdDSA-Poseidon
//!
//! The twisted Edwards curve `a·x² + y² = 1 + d·x²·y²` over the BN254
//! scalar field with `a = 168700` and `d = 168696`, as used by circomlib.
//!
//! ## Signatures
//!
//! A signature is `(R8, S)` with `R8` a curve point and `S < L`, the prime
//! subgroup order. It verifies against public key `A` and message `m` iff
//!
//! ```text
//! S·B8 == R8 + (8·Poseidon(R8x, R8y, Ax, Ay, m))·A
//! ```
//!
//! The compressed 64-byte form is `compress(R8) ‖ S` with `S`
//! little-endian. A compressed point is `y` little-endian with the top bit
//! of byte 31 set when `x` is in the upper half of the field.

use std::fmt;

use ark_bn254::Fr;
use ark_ff::{Field, MontFp, One, PrimeField, Zero};
use num_bigint::BigUint;
use zeroize::{Zeroize, ZeroizeOnDrop};
use zkid_core::{poseidon, Hash};

use crate::error::CryptoError;

const BASE8_X: Fr =
    MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553");
const BASE8_Y: Fr =
    MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203");
const SUBORDER: Fr =
    MontFp!("2736030358979909402780800718157159386076813972158567259200215660948447373041");

fn curve_a() -> Fr {
    Fr::from(168_700u64)
}

fn curve_d() -> Fr {
    Fr::from(168_696u64)
}

/// Order of the prime subgroup generated by `B8`.
pub fn subgroup_order() -> BigUint {
    BigUint::from(SUBORDER.into_bigint())
}

fn to_biguint(f: &Fr) -> BigUint {
    BigUint::from(f.into_bigint())
}

fn is_upper_half(f: &Fr) -> bool {
    to_biguint(f) > (BigUint::from(Fr::MODULUS) >> 1u32)
}

/// Affine point on Baby Jubjub.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Point {
    x: Fr,
    y: Fr,
}

impl Point {
    /// The neutral element `(0, 1)`.
    pub fn identity() -> Self {
        Self { x: Fr::zero(), y: Fr::one() }
    }

    /// The subgroup generator `B8`.
    pub fn base8() -> Self {
        Self { x: BASE8_X, y: BASE8_Y }
    }

    /// Build from coordinates, checking curve membership.
    pub fn from_coordinates(x: Hash, y: Hash) -> Result<Self, CryptoError> {
        let p = Self { x: x.fr(), y: y.fr() };
        if !p.is_on_curve() {
            return Err(CryptoError::InvalidPoint(format!("({x}, {y}) is not on the curve")));
        }
        Ok(p)
    }

    /// X coordinate.
    pub fn x(&self) -> Hash {
        Hash::from_fr(self.x)
    }

    /// Y coordinate.
    pub fn y(&self) -> Hash {
        Hash::from_fr(self.y)
    }

    /// Whether the point satisfies the curve equation.
    pub fn is_on_curve(&self) -> bool {
        let x2 = self.x.square();
        let y2 = self.y.square();
        curve_a() * x2 + y2 == Fr::one() + curve_d() * x2 * y2
    }

    /// Whether the point is in the prime-order subgroup.
    pub fn in_subgroup(&self) -> bool {
        self.is_on_curve() && self.mul_scalar(&subgroup_order()) == Self::identity()
    }

    /// Point addition.
    pub fn add(&self, other: &Point) -> Point {
        let x1x2 = self.x * other.x;
        let y1y2 = self.y * other.y;
        let dxy = curve_d() * x1x2 * y1y2;
        let x = (self.x * other.y + self.y * other.x) / (Fr::one() + dxy);
        let y = (y1y2 - curve_a() * x1x2) / (Fr::one() - dxy);
        Point { x, y }
    }

    /// Scalar multiplication by double-and-add.
    pub fn mul_scalar(&self, k: &BigUint) -> Point {
        let mut acc = Self::identity();
        for i in (0..k.bits()).rev() {
            acc = acc.add(&acc);
            if k.bit(i) {
                acc = acc.add(self);
            }
        }
        acc
    }

    /// 32-byte compressed form.
    pub fn compress(&self) -> [u8; 32] {
        let mut out = Hash::from_fr(self.y).to_le_bytes();
        if is_upper_half(&self.x) {
            out[31] |= 0x80;
        }
        out
    }

    /// Decode the 32-byte compressed form.
    pub fn decompress(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let mut buf = *bytes;
        let sign = buf[31] & 0x80 != 0;
        buf[31] &= 0x7f;
        let y = Hash::from_le_bytes(&buf)
            .map_err(|e| CryptoError::InvalidPoint(e.to_string()))?
            .fr();

        let y2 = y.square();
        let denominator = curve_a() - curve_d() * y2;
        let inverse = denominator
            .inverse()
            .ok_or_else(|| CryptoError::InvalidPoint("degenerate y coordinate".into()))?;
        let x2 = (Fr::one() - y2) * inverse;
        let mut x = x2
            .sqrt()
            .ok_or_else(|| CryptoError::InvalidPoint("x is not a square".into()))?;
        if sign != is_upper_half(&x) {
            x = -x;
        }
        Ok(Point { x, y })
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({}, {})", self.x(), self.y())
    }
}

/// Baby Jubjub public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(Point);

impl PublicKey {
    /// Build from the `(Ax, Ay)` coordinates stored in an auth claim.
    pub fn from_coordinates(x: Hash, y: Hash) -> Result<Self, CryptoError> {
        let p = Point::from_coordinates(x, y)?;
        if !p.in_subgroup() {
            return Err(CryptoError::InvalidPoint("public key outside the subgroup".into()));
        }
        Ok(Self(p))
    }

    /// The underlying point.
    pub fn point(&self) -> &Point {
        &self.0
    }

    /// Verify an EdDSA-Poseidon signature over `msg`.
    pub fn verify_poseidon(&self, msg: &Hash, signature: &Signature) -> bool {
        if !signature.r8.is_on_curve() || signature.s.to_biguint() >= subgroup_order() {
            return false;
        }
        let hm = match challenge_hash(&signature.r8, &self.0, msg) {
            Ok(hm) => hm,
            Err(_) => return false,
        };
        let left = Point::base8().mul_scalar(&signature.s.to_biguint());
        let right = signature
            .r8
            .add(&self.0.mul_scalar(&(hm.to_biguint() * 8u32)));
        left == right
    }
}

fn challenge_hash(r8: &Point, a: &Point, msg: &Hash) -> Result<Hash, CryptoError> {
    Ok(poseidon::hash(&[r8.x(), r8.y(), a.x(), a.y(), *msg])?)
}

/// EdDSA signature `(R8, S)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    r8: Point,
    s: Hash,
}

impl Signature {
    /// Decode the 64-byte compressed form.
    pub fn decompress(bytes: &[u8; 64]) -> Result<Self, CryptoError> {
        let mut r8_bytes = [0u8; 32];
        r8_bytes.copy_from_slice(&bytes[..32]);
        let r8 = Point::decompress(&r8_bytes)
            .map_err(|e| CryptoError::InvalidSignature(format!("R8: {e}")))?;
        let s = BigUint::from_bytes_le(&bytes[32..]);
        if s >= subgroup_order() {
            return Err(CryptoError::InvalidSignature("S is not below the subgroup order".into()));
        }
        let s = Hash::from_biguint(&s)?;
        Ok(Self { r8, s })
    }

    /// Decode the hex of the 64-byte compressed form.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(text.trim()).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let bytes: [u8; 64] = raw.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidSignature(format!("expected 64 bytes, got {}", raw.len()))
        })?;
        Self::decompress(&bytes)
    }

    /// 64-byte compressed form.
    pub fn compress(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r8.compress());
        out[32..].copy_from_slice(&self.s.to_le_bytes());
        out
    }

    /// `R8.x`, the `*SignatureR8x` circuit signal.
    pub fn r8x(&self) -> Hash {
        self.r8.x()
    }

    /// `R8.y`.
    pub fn r8y(&self) -> Hash {
        self.r8.y()
    }

    /// `S`.
    pub fn s(&self) -> Hash {
        self.s
    }
}

/// Secret signing scalar `s` with public key `s·B8`.
///
/// Deriving the scalar from raw private-key bytes is the wallet's concern;
/// this type starts from the derived scalar.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretScalar([u8; 32]);

impl SecretScalar {
    /// Wrap a scalar in `1..L`.
    pub fn from_biguint(value: &BigUint) -> Result<Self, CryptoError> {
        if value.bits() == 0 || *value >= subgroup_order() {
            return Err(CryptoError::InvalidScalar("must be in 1..L".into()));
        }
        let mut out = [0u8; 32];
        let bytes = value.to_bytes_le();
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(Self(out))
    }

    fn value(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Public key `s·B8`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(Point::base8().mul_scalar(&self.value()))
    }

    /// Sign `msg` with a Poseidon-derived deterministic nonce.
    pub fn sign_poseidon(&self, msg: &Hash) -> Result<Signature, CryptoError> {
        let order = subgroup_order();
        let secret = self.value();
        let secret_hash = Hash::from_biguint(&secret)?;
        let nonce = poseidon::hash(&[secret_hash, *msg, Hash::from_u64(1)])?.to_biguint() % &order;
        if nonce.bits() == 0 {
            return Err(CryptoError::InvalidScalar("degenerate nonce".into()));
        }
        let r8 = Point::base8().mul_scalar(&nonce);
        let a = self.public_key();
        let hm = challenge_hash(&r8, a.point(), msg)?;
        let s = (nonce + hm.to_biguint() * 8u32 * secret) % &order;
        Ok(Signature {
            r8,
            s: Hash::from_biguint(&s)?,
        })
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar([REDACTED])")
    }
}
