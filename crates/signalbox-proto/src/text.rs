//! UTF-16LE text helpers.
//!
//! Server and clients must agree on the text encoding byte for byte, so every
//! conversion between Rust strings and wire bytes goes through this module.

use bytes::BufMut;

use crate::errors::{ProtocolError, Result};

/// Bytes per UTF-16 code unit.
pub const CODE_UNIT_SIZE: usize = 2;

/// Number of UTF-16 code units needed to encode `text`.
pub fn code_units(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Append `text` to `dst` as UTF-16LE.
pub fn encode_into(text: &str, dst: &mut impl BufMut) {
    for unit in text.encode_utf16() {
        dst.put_u16_le(unit);
    }
}

/// Encode `text` as UTF-16LE bytes.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * CODE_UNIT_SIZE);
    encode_into(text, &mut out);
    out
}

fn units(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes.chunks_exact(CODE_UNIT_SIZE).map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

/// Decode UTF-16LE bytes, rejecting odd lengths and unpaired surrogates.
pub fn decode(bytes: &[u8]) -> Result<String> {
    if bytes.len() % CODE_UNIT_SIZE != 0 {
        return Err(ProtocolError::InvalidText);
    }
    char::decode_utf16(units(bytes))
        .collect::<std::result::Result<String, _>>()
        .map_err(|_| ProtocolError::InvalidText)
}

/// Decode UTF-16LE bytes, replacing anything invalid. A trailing odd byte is
/// ignored.
pub fn decode_lossy(bytes: &[u8]) -> String {
    char::decode_utf16(units(bytes)).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect()
}

/// Position of the first occurrence of `needle` in `haystack` that starts on
/// a code-unit boundary, searching from byte offset `from`.
///
/// `from` is rounded up to the next boundary.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let start = from.next_multiple_of(CODE_UNIT_SIZE);
    let last = haystack.len().checked_sub(needle.len())?;
    (start..=last).step_by(CODE_UNIT_SIZE).find(|&at| haystack[at..].starts_with(needle))
}
