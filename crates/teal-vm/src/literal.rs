//! Immediate literals: `int`, `byte` and `addr` arguments

use crate::context::OnComplete;
use crate::error::{Fault, FaultResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use teal_primitives::Address;

/// `TypeEnum` of an application call
pub const APPL_TYPE_ENUM: u64 = 6;

/// Transaction type names accepted by `int`
const TXN_TYPES: [(&str, u64); 6] = [
    ("pay", 1),
    ("keyreg", 2),
    ("acfg", 3),
    ("axfer", 4),
    ("afrz", 5),
    ("appl", APPL_TYPE_ENUM),
];

/// Parse an `int` argument: decimal, `0x` hex, or a named constant
pub fn parse_int(arg: &str) -> FaultResult<u64> {
    if let Some(oc) = OnComplete::from_name(arg) {
        return Ok(oc.as_u64());
    }
    if let Some(&(_, value)) = TXN_TYPES.iter().find(|(name, _)| *name == arg) {
        return Ok(value);
    }
    if let Some(digits) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid_int(arg));
        }
        return u64::from_str_radix(digits, 16).map_err(|_| Fault::IntOutOfRange(arg.to_string()));
    }
    let unsigned = arg.strip_prefix('-').unwrap_or(arg);
    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid_int(arg));
    }
    if arg.starts_with('-') {
        return Err(Fault::IntOutOfRange(arg.to_string()));
    }
    arg.parse::<u64>()
        .map_err(|_| Fault::IntOutOfRange(arg.to_string()))
}

fn invalid_int(arg: &str) -> Fault {
    Fault::InvalidImmediate {
        op: "int",
        arg: arg.to_string(),
    }
}

/// Parse a `byte` operand (everything after the mnemonic)
///
/// Accepted forms: `"text"` with `\n \r \t \\ \" \xNN` escapes, `0x` hex,
/// `base64(...)`, `b64(...)`, `base64 ...` and `b64 ...`.
pub fn parse_bytes(operand: &str) -> FaultResult<Vec<u8>> {
    let operand = operand.trim();
    let invalid = || Fault::InvalidByteLiteral(operand.to_string());

    if operand.starts_with('"') {
        let (bytes, rest) = parse_quoted(operand).ok_or_else(invalid)?;
        if !rest.trim().is_empty() {
            return Err(invalid());
        }
        return Ok(bytes);
    }
    if let Some(digits) = operand.strip_prefix("0x") {
        return hex::decode(digits).map_err(|_| invalid());
    }
    for prefix in ["base64", "b64"] {
        let Some(rest) = operand.strip_prefix(prefix) else {
            continue;
        };
        let encoded = if let Some(inner) = rest.strip_prefix('(') {
            inner.strip_suffix(')').ok_or_else(invalid)?
        } else if rest.starts_with(char::is_whitespace) {
            rest.trim()
        } else {
            continue;
        };
        return STANDARD.decode(encoded).map_err(|_| invalid());
    }
    Err(invalid())
}

/// Decode a quoted string starting at `s[0] == '"'`
///
/// Returns the decoded bytes and whatever follows the closing quote.
pub fn parse_quoted(s: &str) -> Option<(Vec<u8>, &str)> {
    let mut chars = s.char_indices();
    if chars.next()?.1 != '"' {
        return None;
    }
    let mut out = Vec::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &s[i + 1..])),
            '\\' => match chars.next()?.1 {
                'n' => out.push(b'\n'),
                'r' => out.push(b'\r'),
                't' => out.push(b'\t'),
                '\\' => out.push(b'\\'),
                '"' => out.push(b'"'),
                'x' => {
                    let hi = chars.next()?.1.to_digit(16)?;
                    let lo = chars.next()?.1.to_digit(16)?;
                    out.push((hi * 16 + lo) as u8);
                }
                _ => return None,
            },
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    None
}

/// Parse an `addr` argument into its 32 raw bytes
pub fn parse_addr(arg: &str) -> FaultResult<Vec<u8>> {
    Address::from_text(arg)
        .map(|a| a.to_vec())
        .map_err(|e| Fault::InvalidAddress(format!("{}: {}", arg, e)))
}
