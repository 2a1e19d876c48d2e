//! Account address type (32-byte public key with checksummed text form)

use crate::base32::{self, Base32Error};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Invalid base32 text
    #[error("invalid base32 address: {0}")]
    InvalidBase32(#[from] Base32Error),
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid address length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
    /// Checksum does not match the public key
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

/// 32-byte account address
///
/// The text form is the unpadded base32 encoding of the public key followed
/// by the last four bytes of its SHA-512/256 digest (58 characters).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Size of address in bytes
    pub const LEN: usize = 32;

    /// Length of the checksum appended in the text form
    pub const CHECKSUM_LEN: usize = 4;

    /// Length of the text form
    pub const TEXT_LEN: usize = 58;

    /// Zero address
    pub const ZERO: Address = Address([0u8; 32]);

    /// Create address from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    /// Create address from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        if slice.len() != Self::LEN {
            return Err(AddressError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Address(bytes))
    }

    /// Parse the checksummed base32 text form
    pub fn from_text(s: &str) -> Result<Self, AddressError> {
        let raw = base32::decode(s)?;
        if raw.len() != Self::LEN + Self::CHECKSUM_LEN {
            return Err(AddressError::InvalidLength(raw.len()));
        }
        let (key, checksum) = raw.split_at(Self::LEN);
        let address = Self::from_slice(key)?;
        if address.checksum() != checksum {
            return Err(AddressError::ChecksumMismatch);
        }
        Ok(address)
    }

    /// Parse address from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Last four bytes of the SHA-512/256 digest of the public key
    pub fn checksum(&self) -> [u8; 4] {
        let digest = Sha512_256::digest(self.0);
        let mut out = [0u8; 4];
        out.copy_from_slice(&digest[digest.len() - Self::CHECKSUM_LEN..]);
        out
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy into an owned byte vector
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to the checksummed base32 text form
    pub fn to_text(&self) -> String {
        let mut raw = Vec::with_capacity(Self::LEN + Self::CHECKSUM_LEN);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&self.checksum());
        base32::encode(&raw)
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_text())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_text())
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Address::from_text(&s).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_TEXT: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ";

    // ==================== Text form ====================

    #[test]
    fn test_zero_address_text() {
        assert_eq!(Address::ZERO.to_text(), ZERO_TEXT);
        assert_eq!(Address::from_text(ZERO_TEXT).unwrap(), Address::ZERO);
    }

    #[test]
    fn test_text_length() {
        let addr = Address::from_bytes([0x5a; 32]);
        assert_eq!(addr.to_text().len(), Address::TEXT_LEN);
    }

    #[test]
    fn test_text_roundtrip() {
        for seed in [0x01u8, 0x7f, 0xff] {
            let mut bytes = [0u8; 32];
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = seed.wrapping_mul(i as u8 + 1);
            }
            let addr = Address::from_bytes(bytes);
            assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut text = Address::from_bytes([0x11; 32]).to_text().into_bytes();
        // Flip a symbol inside the public key part
        text[0] = if text[0] == b'A' { b'B' } else { b'A' };
        let text = String::from_utf8(text).unwrap();
        assert_eq!(Address::from_text(&text), Err(AddressError::ChecksumMismatch));
    }

    #[test]
    fn test_wrong_length_text() {
        // Valid base32, but encodes 5 bytes
        let result = Address::from_text("MZXW6YTB");
        assert_eq!(result, Err(AddressError::InvalidLength(5)));
    }

    #[test]
    fn test_lowercase_text_rejected() {
        let result = Address::from_text(&ZERO_TEXT.to_lowercase());
        assert!(matches!(result, Err(AddressError::InvalidBase32(_))));
    }

    // ==================== Byte conversions ====================

    #[test]
    fn test_from_slice() {
        assert!(Address::from_slice(&[0u8; 32]).unwrap().is_zero());
        assert_eq!(Address::from_slice(&[0u8; 31]), Err(AddressError::InvalidLength(31)));
        assert_eq!(Address::from_slice(&[0u8; 33]), Err(AddressError::InvalidLength(33)));
    }

    #[test]
    fn test_from_hex() {
        let hex_text = format!("0x{}", "ab".repeat(32));
        let addr = Address::from_hex(&hex_text).unwrap();
        assert_eq!(addr.as_bytes(), &[0xab; 32]);
        assert_eq!(addr.to_hex(), hex_text);
        assert!(matches!(Address::from_hex("0xzz"), Err(AddressError::InvalidHex(_))));
    }

    #[test]
    fn test_debug_display() {
        let addr = Address::ZERO;
        assert_eq!(format!("{}", addr), ZERO_TEXT);
        assert_eq!(format!("{:?}", addr), format!("Address({})", ZERO_TEXT));
    }
}
