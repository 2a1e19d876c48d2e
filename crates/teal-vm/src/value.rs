//! Stack values: unsigned 64-bit integers and byte strings

use crate::error::{Fault, FaultResult};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variant tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `uint64`
    Uint,
    /// `[]byte`
    Bytes,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Uint => write!(f, "uint64"),
            ValueKind::Bytes => write!(f, "[]byte"),
        }
    }
}

/// A value on the operand stack, in scratch space or in application state
///
/// Serialized as `{"uint": 7}` or `{"bytes": "6b6579"}` (hex).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    /// Unsigned 64-bit integer
    Uint(u64),
    /// Byte string
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
}

impl Value {
    /// Integer zero, the initial content of every scratch slot
    pub const ZERO: Value = Value::Uint(0);

    /// Variant tag
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Uint(_) => ValueKind::Uint,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// The integer, or an `InvalidType` fault
    pub fn as_uint(&self) -> FaultResult<u64> {
        match self {
            Value::Uint(n) => Ok(*n),
            Value::Bytes(_) => Err(Fault::InvalidType {
                expected: ValueKind::Uint,
                found: ValueKind::Bytes,
            }),
        }
    }

    /// The byte string, or an `InvalidType` fault
    pub fn as_bytes(&self) -> FaultResult<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::Uint(_) => Err(Fault::InvalidType {
                expected: ValueKind::Bytes,
                found: ValueKind::Uint,
            }),
        }
    }

    /// Owned byte string, or an `InvalidType` fault
    pub fn into_bytes(self) -> FaultResult<Vec<u8>> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::Uint(_) => Err(Fault::InvalidType {
                expected: ValueKind::Bytes,
                found: ValueKind::Uint,
            }),
        }
    }

    /// Whether this is integer zero
    pub fn is_zero_uint(&self) -> bool {
        matches!(self, Value::Uint(0))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(n) => write!(f, "{}", n),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(n) => write!(f, "Uint({})", n),
            Value::Bytes(b) => write!(f, "Bytes(0x{})", hex::encode(b)),
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Uint(b as u64)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

// ==================== Big-integer byte strings ====================

/// Decode a big-endian unsigned integer, enforcing the width limit if given
pub fn decode_biguint(bytes: &[u8], max_len: Option<usize>) -> FaultResult<BigUint> {
    if let Some(max) = max_len {
        if bytes.len() > max {
            return Err(Fault::BytesOverflow {
                len: bytes.len(),
                max,
            });
        }
    }
    Ok(BigUint::from_bytes_be(bytes))
}

/// Canonical big-endian form: no leading zero byte, zero is a single `0x00`
pub fn encode_biguint(value: &BigUint) -> Vec<u8> {
    value.to_bytes_be()
}

/// Big-endian decode of at most 8 bytes
pub fn btoi(bytes: &[u8]) -> FaultResult<u64> {
    if bytes.len() > 8 {
        return Err(Fault::BtoiTooLong(bytes.len()));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Fixed 8-byte big-endian encoding
pub fn itob(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Integer square root rounded down
pub fn isqrt(value: u64) -> u64 {
    let root = BigUint::from(value).sqrt();
    // The root of a u64 always fits a u64
    root.iter_u64_digits().next().unwrap_or(0)
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(de::Error::custom)
    }
}
