//! # Content Decoder
//!
//! Turns ledger payloads into display text. Decoding is total: corrupted or
//! legacy content degrades to replacement characters or an empty string and
//! never fails the page.

use crate::models::Payload;

const HEX_MARKER: &str = "0x";

/// Decodes a payload of either wire form into text.
pub fn decode_text(payload: &Payload) -> String {
    match payload {
        Payload::Raw(bytes) => decode_bytes(bytes),
        Payload::Encoded(text) => decode_encoded(text),
    }
}

/// Best-effort UTF-8; invalid sequences become U+FFFD.
pub fn decode_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// `0x`-prefixed strings are hex; anything else is already text.
/// A marker followed by invalid hex yields an empty string.
fn decode_encoded(text: &str) -> String {
    let Some(digits) = strip_marker(text) else {
        return text.to_string();
    };
    match hex::decode(digits) {
        Ok(bytes) => decode_bytes(&bytes),
        Err(_) => String::new(),
    }
}

fn strip_marker(text: &str) -> Option<&str> {
    text.strip_prefix(HEX_MARKER)
        .or_else(|| text.strip_prefix("0X"))
}
