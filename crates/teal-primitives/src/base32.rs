//! RFC 4648 base32 codec without padding
//!
//! Account addresses are written as unpadded upper-case base32, so only that
//! variant is implemented.

use thiserror::Error;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Base32 decoding error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Base32Error {
    /// Character outside the base32 alphabet
    #[error("invalid base32 character {0:?} at position {1}")]
    InvalidChar(char, usize),
    /// Length that no byte string encodes to
    #[error("invalid base32 length: {0}")]
    InvalidLength(usize),
    /// Trailing bits that are not zero
    #[error("non-zero trailing bits")]
    TrailingBits,
}

fn symbol_value(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'2'..=b'7' => Some(c - b'2' + 26),
        _ => None,
    }
}

/// Encode bytes as unpadded base32
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u16 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | byte as u16;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1F) as usize;
            out.push(ALPHABET[index] as char);
        }
    }
    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1F) as usize;
        out.push(ALPHABET[index] as char);
    }

    out
}

/// Decode unpadded base32
pub fn decode(text: &str) -> Result<Vec<u8>, Base32Error> {
    // Valid unpadded lengths leave 0, 2, 4, 5 or 7 symbols in the last group
    if matches!(text.len() % 8, 1 | 3 | 6) {
        return Err(Base32Error::InvalidLength(text.len()));
    }

    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u16 = 0;
    let mut bits = 0u32;

    for (i, c) in text.bytes().enumerate() {
        let value = symbol_value(c).ok_or(Base32Error::InvalidChar(c as char, i))?;
        buffer = (buffer << 5) | value as u16;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
        buffer &= (1 << bits) - 1;
    }
    if buffer != 0 {
        return Err(Base32Error::TrailingBits);
    }

    Ok(out)
}
