//! Field element type and its canonical byte encodings.
//!
//! Every value that enters a hash is first brought into the BN254 scalar
//! field and then written as a fixed 32-byte big-endian string, so a numeric
//! zero always contributes 32 zero bytes.

use ark_ff::{BigInteger, PrimeField};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// BN254 scalar field element. Tree nodes, keys and randomness all live here.
pub type Fe = ark_bn254::Fr;

/// Width of a canonical field element encoding.
pub const FE_BYTES: usize = 32;

/// Number of bits in the field modulus (254 for BN254).
pub const FIELD_BITS: usize = Fe::MODULUS_BIT_SIZE as usize;

/// Canonical 32-byte big-endian encoding.
pub fn to_be_bytes(fe: &Fe) -> [u8; FE_BYTES] {
    let bytes = fe.into_bigint().to_bytes_be();
    let mut out = [0u8; FE_BYTES];
    out[FE_BYTES - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Strict decoding: `None` when the value is not below the field modulus.
pub fn from_be_bytes(bytes: &[u8; FE_BYTES]) -> Option<Fe> {
    let fe = Fe::from_be_bytes_mod_order(bytes);
    (to_be_bytes(&fe) == *bytes).then_some(fe)
}

/// Lenient decoding that reduces modulo the field order.
pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Fe {
    Fe::from_be_bytes_mod_order(bytes)
}

/// Bit `i` of the canonical integer representative (bit 0 = least significant).
pub fn bit(fe: &Fe, i: usize) -> bool {
    i < FIELD_BITS && fe.into_bigint().get_bit(i)
}

/// Lower-case hex with a `0x` prefix.
pub fn to_hex(fe: &Fe) -> String {
    format!("0x{}", hex::encode(to_be_bytes(fe)))
}

/// Parses the output of [`to_hex`]. The prefix is optional; short strings are
/// left-padded with zeros.
pub fn from_hex(s: &str) -> Option<Fe> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() > FE_BYTES * 2 {
        return None;
    }
    let padded = format!("{digits:0>64}");
    let raw = hex::decode(padded).ok()?;
    let bytes: [u8; FE_BYTES] = raw.try_into().ok()?;
    from_be_bytes(&bytes)
}

/// Splits `data` into `element_size`-byte windows and reads each window as a
/// big-endian integer. A short final window is zero-filled on the right.
/// Exactly `count` elements are produced; windows past the end of `data` are
/// zero and windows past `count` are dropped.
pub fn bytes_to_elements(data: &[u8], element_size: usize, count: usize) -> Vec<Fe> {
    let mut buf = vec![0u8; element_size];
    (0..count)
        .map(|i| {
            let start = i * element_size;
            if start >= data.len() {
                return Fe::from(0u64);
            }
            let end = (start + element_size).min(data.len());
            buf.fill(0);
            buf[..end - start].copy_from_slice(&data[start..end]);
            Fe::from_be_bytes_mod_order(&buf)
        })
        .collect()
}

/// Inverse of [`bytes_to_elements`]. Each element contributes its low
/// `element_size` bytes; the result is cut to `original_len` when that is
/// shorter.
pub fn elements_to_bytes(elements: &[Fe], element_size: usize, original_len: Option<usize>) -> Vec<u8> {
    let mut out = Vec::with_capacity(elements.len() * element_size);
    for fe in elements {
        let bytes = to_be_bytes(fe);
        let take = element_size.min(FE_BYTES);
        let mut window = vec![0u8; element_size - take];
        window.extend_from_slice(&bytes[FE_BYTES - take..]);
        out.extend_from_slice(&window);
    }
    if let Some(len) = original_len {
        out.truncate(len);
    }
    out
}

/// Hex wrapper used by the serde helpers below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FeHex(Fe);

impl Serialize for FeHex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for FeHex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        from_hex(&s)
            .map(FeHex)
            .ok_or_else(|| de::Error::custom(format!("invalid field element: {s}")))
    }
}

/// `#[serde(with = "smt::field::serde_fe")]` for a single element.
pub mod serde_fe {
    use super::{Fe, FeHex};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(fe: &Fe, serializer: S) -> Result<S::Ok, S::Error> {
        FeHex(*fe).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fe, D::Error> {
        FeHex::deserialize(deserializer).map(|h| h.0)
    }
}

/// `#[serde(with = "smt::field::serde_fe_vec")]` for a sequence of elements.
pub mod serde_fe_vec {
    use super::{Fe, FeHex};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &[Fe], serializer: S) -> Result<S::Ok, S::Error> {
        let wrapped: Vec<FeHex> = v.iter().copied().map(FeHex).collect();
        wrapped.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Fe>, D::Error> {
        let wrapped = Vec::<FeHex>::deserialize(deserializer)?;
        Ok(wrapped.into_iter().map(|h| h.0).collect())
    }
}
