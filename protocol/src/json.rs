//! JSON helpers for header transport.
//!
//! Header values cross the wire as JSON. Decoding is forgiving since clients
//! and security scanners send arbitrary bytes, while encoding escapes all
//! non-ASCII characters so values survive transports that only pass
//! low-ASCII header bytes.

use serde_json::Value;
use tracing::error;

/// JSON object representation used throughout the workspace.
pub type JsonObject = serde_json::Map<String, Value>;

/// Decodes a JSON header value, returning `None` when malformed.
///
/// A crafted header must never crash the request cycle, and raising on bad
/// input would let scanners flood error notifications. Malformed JSON is
/// logged once and treated as absent.
pub fn decode_lenient(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => {
            error!("ignoring malformed JSON in X-Up header");
            None
        }
    }
}

/// Encodes a value as compact JSON safe for header transport.
pub fn encode_ascii(value: &Value) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| String::from("null"));
    escape_non_ascii(&json)
}

/// Replaces every non-ASCII character with `\uXXXX` escape sequences.
///
/// Escapes are UTF-16 code units, so characters outside the BMP become
/// surrogate pairs, matching what JSON parsers on the frontend expect.
pub fn escape_non_ascii(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for ch in json.chars() {
        if ch.is_ascii() {
            escaped.push(ch);
        } else {
            for unit in ch.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    escaped
}

/// Reports whether a string is empty or whitespace-only.
///
/// Note that `"false"` is not blank. It is a legal wire value (the legacy
/// expire-cache flag) and must round-trip.
pub fn is_blank_str(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decode_lenient_accepts_valid_json() {
        assert_eq!(decode_lenient("{\"foo\":\"bar\"}"), Some(json!({"foo": "bar"})));
        assert_eq!(decode_lenient("[1,2]"), Some(json!([1, 2])));
    }

    #[test]
    fn decode_lenient_swallows_malformed_json() {
        assert_eq!(decode_lenient("{\"foo\":"), None);
        assert_eq!(decode_lenient("{{{"), None);
    }

    #[test]
    fn encode_ascii_escapes_high_ascii_characters() {
        assert_eq!(encode_ascii(&json!("xäy")), "\"x\\u00e4y\"");
        assert_eq!(encode_ascii(&json!({"key": "ö"})), "{\"key\":\"\\u00f6\"}");
    }

    #[test]
    fn escape_non_ascii_uses_surrogate_pairs_outside_the_bmp() {
        // 😀 is U+1F600, which UTF-16 encodes as d83d de00.
        assert_eq!(escape_non_ascii("\"😀\""), "\"\\ud83d\\ude00\"");
    }

    #[test]
    fn escape_non_ascii_leaves_ascii_untouched() {
        assert_eq!(escape_non_ascii("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn blank_strings() {
        assert!(is_blank_str(""));
        assert!(is_blank_str("   "));
        assert!(!is_blank_str("false"));
        assert!(!is_blank_str(".content"));
    }
}
