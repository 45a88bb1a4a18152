//! Label codec: turning request parameters into DNS-safe labels.
//!
//! Per RFC 1035, colons are invalid in DNS labels, so typed prefixes end in
//! a hyphen. Parameter bytes travel as `hex-` (short values) or `b64-`
//! (everything else); free text is sanitized down to `[a-z0-9-]`.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Encoded-payload label prefix (URL-safe base64, no padding).
pub const PREFIX_BASE64: &str = "b64-";
/// Encoded-parameter label prefix (lowercase hex).
pub const PREFIX_HEX: &str = "hex-";
/// Per-request HMAC auth label prefix.
pub const PREFIX_AUTH: &str = "auth-";
/// Anonymous device token prefix.
pub const PREFIX_BDT: &str = "bdt-";
/// Cohort token prefix.
pub const PREFIX_CTP: &str = "ctp-";
/// Namespace-bound signature prefix.
pub const PREFIX_SIG: &str = "sig-";

/// Maximum bytes per DNS label (RFC 1035).
pub const MAX_LABEL_LEN: usize = 63;
/// Maximum total query name length.
pub const MAX_NAME_LEN: usize = 253;

/// Encode data as URL-safe base64 without padding.
pub fn encode_base64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode URL-safe base64 data, accepting unpadded then padded input.
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    match URL_SAFE_NO_PAD.decode(s) {
        Ok(data) => Ok(data),
        Err(_) => URL_SAFE
            .decode(s)
            .map_err(|e| Error::Encoding(format!("base64 decode: {e}"))),
    }
}

/// Encode data as lowercase hexadecimal.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode hexadecimal data, folding case first.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.to_lowercase()).map_err(|e| Error::Encoding(format!("hex decode: {e}")))
}

/// Marshal a value to JSON and base64-encode it for label transport.
pub fn encode_json<T: Serialize>(v: &T) -> Result<String> {
    let data = serde_json::to_vec(v)?;
    Ok(encode_base64(&data))
}

/// Base64-decode and unmarshal JSON data.
pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> {
    let data = decode_base64(s)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Encode a parameter value for use in a DNS label.
///
/// Hex wins for short values (smaller label than base64 overhead would
/// allow); base64 for everything longer than 16 bytes.
pub fn encode_param(data: &[u8]) -> String {
    if data.len() <= 16 {
        format!("{PREFIX_HEX}{}", encode_hex(data))
    } else {
        format!("{PREFIX_BASE64}{}", encode_base64(data))
    }
}

/// Decode a parameter value from a DNS label.
///
/// Labels without a recognized prefix are treated as plain text bytes.
pub fn decode_param(s: &str) -> Result<Vec<u8>> {
    if let Some(rest) = s.strip_prefix(PREFIX_BASE64) {
        decode_base64(rest)
    } else if let Some(rest) = s.strip_prefix(PREFIX_HEX) {
        decode_hex(rest)
    } else {
        Ok(s.as_bytes().to_vec())
    }
}

/// Sanitize a string for use as a DNS label.
///
/// Lowercases, keeps `[a-z0-9-]`, folds `_` and space to `-`, drops
/// everything else, trims leading/trailing hyphens, and truncates to 63
/// bytes (re-trimming so the label still ends alphanumeric).
pub fn sanitize_label(s: &str) -> String {
    let mut label = String::with_capacity(s.len());
    for c in s.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            label.push(c);
        } else if c == '_' || c == ' ' {
            label.push('-');
        }
    }
    let mut label = label.trim_matches('-').to_string();
    if label.len() > MAX_LABEL_LEN {
        label.truncate(MAX_LABEL_LEN);
        while label.ends_with('-') {
            label.pop();
        }
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label_basic() {
        assert_eq!(sanitize_label("new york"), "new-york");
        assert_eq!(sanitize_label("Hello_World"), "hello-world");
        assert_eq!(sanitize_label("Quebec"), "quebec");
        assert_eq!(sanitize_label("--weird--"), "weird");
        assert_eq!(sanitize_label("a!b@c#d"), "abcd");
    }

    #[test]
    fn test_sanitize_label_empty_when_nothing_allowed() {
        assert_eq!(sanitize_label("!!!"), "");
        assert_eq!(sanitize_label("___"), "");
        assert_eq!(sanitize_label(""), "");
    }

    #[test]
    fn test_sanitize_label_truncates_to_63() {
        let long = "a".repeat(100);
        let label = sanitize_label(&long);
        assert_eq!(label.len(), 63);

        // Truncation must not leave a trailing hyphen
        let tricky = format!("{}-{}", "a".repeat(62), "b".repeat(20));
        let label = sanitize_label(&tricky);
        assert!(label.len() <= 63);
        assert!(!label.ends_with('-'));
    }

    #[test]
    fn test_sanitize_label_is_valid_dns() {
        for input in ["New York", "foo_bar_baz", "UPPER", "123abc", "a-b-c", "-x-"] {
            let label = sanitize_label(input);
            assert!(!label.is_empty());
            assert!(label.len() <= 63);
            assert!(label.chars().all(|c| c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c == '-'));
            assert!(!label.starts_with('-'));
            assert!(!label.ends_with('-'));
        }
    }

    #[test]
    fn test_param_round_trip() {
        for len in [0usize, 1, 8, 16, 17, 64, 255, 1024] {
            let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let encoded = encode_param(&data);
            if len <= 16 {
                assert!(encoded.starts_with(PREFIX_HEX), "len {len}: {encoded}");
            } else {
                assert!(encoded.starts_with(PREFIX_BASE64), "len {len}: {encoded}");
            }
            assert_eq!(decode_param(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn test_decode_param_plain_text() {
        assert_eq!(decode_param("hello").unwrap(), b"hello");
    }

    #[test]
    fn test_base64_accepts_padded_and_unpadded() {
        let data = b"some binary payload";
        let unpadded = encode_base64(data);
        assert!(!unpadded.contains('='));
        assert_eq!(decode_base64(&unpadded).unwrap(), data);

        let padded = URL_SAFE.encode(data);
        assert_eq!(decode_base64(&padded).unwrap(), data);
    }

    #[test]
    fn test_decode_hex_folds_case() {
        assert_eq!(decode_hex("DEADBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_json_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Cfg {
            name: String,
            port: u16,
        }
        let cfg = Cfg {
            name: "sensor".into(),
            port: 8883,
        };
        let encoded = encode_json(&cfg).unwrap();
        let decoded: Cfg = decode_json(&encoded).unwrap();
        assert_eq!(decoded, cfg);
    }
}
