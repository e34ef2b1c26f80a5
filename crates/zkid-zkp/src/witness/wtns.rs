//! `.wtns` container: `"wtns"`, version 2, two sections.
//!
//! ```text
//! magic "wtns" | u32 version | u32 nSections
//! u32 id=1 | u64 len | u32 n8 | prime (n8 bytes LE) | u32 count
//! u32 id=2 | u64 len | count × element (n8 bytes LE)
//! ```
//!
//! All integers are little-endian.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use zeroize::Zeroizing;

use super::{Witness, WitnessError};

/// File magic.
pub const MAGIC: &[u8; 4] = b"wtns";
/// Container version.
pub const VERSION: u32 = 2;
/// Bytes per BN254 field element.
pub const N8: usize = 32;

const SECTIONS: u32 = 2;
const HEADER_SECTION: u32 = 1;
const DATA_SECTION: u32 = 2;

fn prime_le() -> Vec<u8> {
    Fr::MODULUS.to_bytes_le()
}

/// Serialize `witness`. The buffer holds private inputs and is zeroized
/// on drop.
pub fn write(witness: &Witness) -> Zeroizing<Vec<u8>> {
    let count = witness.len();
    let mut out = Zeroizing::new(Vec::with_capacity(12 + 12 + 8 + N8 + 12 + count * N8));
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&SECTIONS.to_le_bytes());

    out.extend_from_slice(&HEADER_SECTION.to_le_bytes());
    out.extend_from_slice(&((4 + N8 + 4) as u64).to_le_bytes());
    out.extend_from_slice(&(N8 as u32).to_le_bytes());
    out.extend_from_slice(&prime_le());
    out.extend_from_slice(&(count as u32).to_le_bytes());

    out.extend_from_slice(&DATA_SECTION.to_le_bytes());
    out.extend_from_slice(&((count * N8) as u64).to_le_bytes());
    for value in witness.values() {
        let mut bytes = value.into_bigint().to_bytes_le();
        out.extend_from_slice(&bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
    }
    out
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WitnessError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| WitnessError::Format(format!("truncated at byte {}", self.pos)))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, WitnessError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64, WitnessError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

/// Parse a `.wtns` container over the BN254 scalar field.
pub fn read(data: &[u8]) -> Result<Witness, WitnessError> {
    let mut c = Cursor { data, pos: 0 };
    if c.take(4)? != MAGIC {
        return Err(WitnessError::Format("bad magic".into()));
    }
    let version = c.u32()?;
    if version != VERSION {
        return Err(WitnessError::Format(format!("version {version}, expected {VERSION}")));
    }
    let sections = c.u32()?;

    let mut header: Option<(usize, usize)> = None;
    let mut body: Option<&[u8]> = None;
    for _ in 0..sections {
        let id = c.u32()?;
        let len = usize::try_from(c.u64()?).map_err(|_| WitnessError::Format("section too large".into()))?;
        let section = c.take(len)?;
        match id {
            HEADER_SECTION => {
                let mut s = Cursor { data: section, pos: 0 };
                let n8 = s.u32()? as usize;
                if n8 != N8 {
                    return Err(WitnessError::Format(format!("field size {n8}, expected {N8}")));
                }
                if s.take(n8)? != prime_le().as_slice() {
                    return Err(WitnessError::Format("prime is not the BN254 scalar field".into()));
                }
                header = Some((n8, s.u32()? as usize));
            }
            DATA_SECTION => body = Some(section),
            _ => {}
        }
    }
    let (n8, count) = header.ok_or_else(|| WitnessError::Format("missing header section".into()))?;
    let body = body.ok_or_else(|| WitnessError::Format("missing witness section".into()))?;
    if body.len() != n8 * count {
        return Err(WitnessError::Format(format!(
            "witness section holds {} bytes for {count} elements",
            body.len()
        )));
    }
    let modulus = Fr::MODULUS.to_bytes_le();
    let mut values = Vec::with_capacity(count);
    for chunk in body.chunks_exact(n8) {
        if !lt_le(chunk, &modulus) {
            return Err(WitnessError::Format("element not in the field".into()));
        }
        values.push(Fr::from_le_bytes_mod_order(chunk));
    }
    Ok(Witness::from_values(values))
}

fn lt_le(a: &[u8], b: &[u8]) -> bool {
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        if x != y {
            return x < y;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn witness(n: u64) -> Witness {
        Witness::from_values((0..n).map(|i| Fr::from(i + 1)).collect())
    }

    #[test]
    fn header_layout() {
        let bytes = write(&witness(3));
        assert_eq!(&bytes[0..4], b"wtns");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(bytes[16..24].try_into().unwrap()), 40);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 32);
        assert_eq!(u32::from_le_bytes(bytes[60..64].try_into().unwrap()), 3);
        assert_eq!(bytes.len(), 64 + 12 + 3 * 32);
    }

    #[test]
    fn rejects_foreign_prime() {
        let mut bytes = write(&witness(1)).to_vec();
        bytes[28] ^= 1;
        assert!(read(&bytes).unwrap_err().to_string().contains("prime"));
    }

    #[test]
    fn rejects_truncated_data() {
        let bytes = write(&witness(2));
        assert!(read(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = write(&witness(1)).to_vec();
        bytes[4] = 1;
        assert!(read(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn declared_count_matches_values(values in proptest::collection::vec(any::<u64>(), 0..40)) {
            let w = Witness::from_values(values.iter().map(|v| Fr::from(*v)).collect());
            let bytes = write(&w);
            prop_assert_eq!(u32::from_le_bytes(bytes[60..64].try_into().unwrap()) as usize, values.len());
            prop_assert_eq!(read(&bytes).unwrap(), w);
        }
    }
}
