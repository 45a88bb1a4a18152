//! Security tokens carried as query-name labels.
//!
//! Three kinds:
//!
//! - **BDT** (anonymous device token): `bdt-<32-hex>`, 128 bits of entropy.
//!   Lets devices query without revealing identity; rotate weekly.
//! - **CTP** (cohort token): `ctp-<base64url(AEAD(json))>`, an encrypted
//!   `{uid, coh, ts, nonce}` payload for cohort targeting.
//! - **NBA** (namespace-bound signature): `sig-<16-byte-hmac-hex>-t-<unix>`,
//!   binding a query to its tenant namespace.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::encoding::{decode_base64, encode_base64, PREFIX_BDT, PREFIX_CTP, PREFIX_SIG};
use crate::error::{Error, Result};
use crate::security::crypto::{decrypt, encrypt, KEY_SIZE};
use crate::security::hash::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

/// Allowed clock skew for token timestamps, in seconds.
const REPLAY_WINDOW_SECS: i64 = 30;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Compute an HMAC-SHA-256 tag over a message, truncated to the first 16
/// bytes (128 bits) and hex-encoded. Shared by NBA signatures and the
/// per-request auth label.
pub(crate) fn hmac_tag_hex(key: &[u8], message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC accepts any key size per RFC 2104");
    mac.update(message.as_bytes());
    let tag = mac.finalize().into_bytes();
    hex::encode(&tag[..16])
}

/// Anonymous device token.
///
/// Format: `bdt-` followed by exactly 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bdt {
    token: String,
}

impl Bdt {
    /// Generate a fresh token from 16 random bytes.
    pub fn new() -> Result<Bdt> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::Crypto(format!("generate random: {e}")))?;
        Ok(Bdt {
            token: format!("{PREFIX_BDT}{}", hex::encode(bytes)),
        })
    }

    /// Validate an existing token string: exact length, prefix, hex body.
    pub fn from_string(token: &str) -> Result<Bdt> {
        let expected_len = PREFIX_BDT.len() + 32;
        if token.len() != expected_len {
            return Err(Error::InvalidToken(format!(
                "BDT must be {expected_len} chars, got {}",
                token.len()
            )));
        }
        let Some(hex_part) = token.strip_prefix(PREFIX_BDT) else {
            return Err(Error::InvalidToken(format!(
                "BDT must start with {PREFIX_BDT:?}"
            )));
        };
        if hex::decode(hex_part).is_err() {
            return Err(Error::InvalidToken("BDT body is not hex".into()));
        }
        Ok(Bdt {
            token: token.to_string(),
        })
    }

    /// The token string as placed in a query name.
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

/// Encrypted payload carried inside a CTP token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtpPayload {
    /// User identifier.
    #[serde(rename = "uid")]
    pub user_id: String,
    /// Cohort name, omitted when empty.
    #[serde(rename = "coh", default, skip_serializing_if = "String::is_empty")]
    pub cohort: String,
    /// Unix timestamp at construction.
    #[serde(rename = "ts")]
    pub timestamp: i64,
    /// Random nonce for replay protection, hex-encoded.
    pub nonce: String,
}

/// Cohort token: user targeting without exposing identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctp {
    token: String,
}

impl Ctp {
    /// Build a token by sealing the payload with the given 32-byte key.
    pub fn new(user_id: &str, cohort: &str, key: &[u8; KEY_SIZE]) -> Result<Ctp> {
        let mut nonce_bytes = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| Error::Crypto(format!("generate nonce: {e}")))?;

        let payload = CtpPayload {
            user_id: user_id.to_string(),
            cohort: cohort.to_string(),
            timestamp: unix_now(),
            nonce: hex::encode(nonce_bytes),
        };

        let data = serde_json::to_vec(&payload)?;
        let encrypted = encrypt(&data, key)?;
        Ok(Ctp {
            token: format!("{PREFIX_CTP}{}", encode_base64(&encrypted)),
        })
    }

    /// The token string as placed in a query name.
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

/// Validate and decrypt a CTP token, enforcing the 30-second replay window.
pub fn validate_ctp(token: &str, key: &[u8; KEY_SIZE]) -> Result<CtpPayload> {
    let Some(encoded) = token.strip_prefix(PREFIX_CTP) else {
        return Err(Error::InvalidToken("invalid CTP format".into()));
    };

    let encrypted = decode_base64(encoded)
        .map_err(|_| Error::InvalidToken("invalid CTP encoding".into()))?;
    let decrypted = decrypt(&encrypted, key)?;
    let payload: CtpPayload = serde_json::from_slice(&decrypted)?;

    let now = unix_now();
    if payload.timestamp < now - REPLAY_WINDOW_SECS || payload.timestamp > now + REPLAY_WINDOW_SECS
    {
        return Err(Error::InvalidToken("token expired or future-dated".into()));
    }

    Ok(payload)
}

/// Namespace-bound signature.
///
/// Format: `sig-<16-byte-hmac-hex>-t-<unix-timestamp>`, HMAC-SHA-256 over
/// `namespace|resource|key|timestamp` keyed with the tenant signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nba {
    token: String,
    timestamp: i64,
}

impl Nba {
    /// Sign a query binding for the current time.
    pub fn new(namespace: &str, resource: &str, key: &str, signing_key: &[u8]) -> Nba {
        let timestamp = unix_now();
        let message = format!("{namespace}|{resource}|{key}|{timestamp}");
        let sig = hmac_tag_hex(signing_key, &message);
        Nba {
            token: format!("{PREFIX_SIG}{sig}-t-{timestamp}"),
            timestamp,
        }
    }

    /// The signature string as placed in a query name.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Unix timestamp the signature was issued at.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Validate an NBA signature: timestamp window, then constant-time tag
/// comparison against a recomputed signature.
pub fn validate_nba(
    token: &str,
    namespace: &str,
    resource: &str,
    key: &str,
    signing_key: &[u8],
    max_age: Duration,
) -> Result<()> {
    if token.len() < PREFIX_SIG.len() + 32 {
        return Err(Error::InvalidToken("invalid NBA format".into()));
    }
    let Some(body) = token.strip_prefix(PREFIX_SIG) else {
        return Err(Error::InvalidToken("invalid NBA format".into()));
    };

    // The hex tag cannot contain '-', so the final '-' starts the timestamp
    // and must be preceded by the literal "-t".
    let Some(idx) = body.rfind('-') else {
        return Err(Error::InvalidToken("invalid NBA format: missing timestamp".into()));
    };
    if idx < 3 || &body[idx - 2..idx] != "-t" {
        return Err(Error::InvalidToken("invalid NBA format: missing timestamp".into()));
    }

    let sig_hex = &body[..idx - 2];
    let timestamp: i64 = body[idx + 1..]
        .parse()
        .map_err(|_| Error::InvalidToken("invalid timestamp".into()))?;

    let now = unix_now();
    if timestamp < now - max_age.as_secs() as i64 || timestamp > now + REPLAY_WINDOW_SECS {
        return Err(Error::InvalidToken("signature expired or future-dated".into()));
    }

    let message = format!("{namespace}|{resource}|{key}|{timestamp}");
    let expected = hmac_tag_hex(signing_key, &message);
    if !constant_time_eq(sig_hex.as_bytes(), expected.as_bytes()) {
        return Err(Error::InvalidToken("signature mismatch".into()));
    }

    Ok(())
}
