//! HKDF-SHA-256 key derivation for session keys.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Error, Result};

/// Derive a key of the given length using HKDF-SHA-256.
pub fn derive_key(secret: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt, secret);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|_| Error::Crypto("hkdf expand failed".into()))?;
    Ok(okm)
}

/// Derive a 32-byte (256-bit) key.
pub fn derive_key32(secret: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    let derived = derive_key(secret, salt, info, 32)?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&derived);
    Ok(key)
}

/// Build the HKDF info parameter binding a session to its query name, key
/// exchange, and freshness.
///
/// Layout: `len2(fqdn) || fqdn || len2(client_pub) || client_pub ||
/// len2(server_pub) || server_pub || be64(timestamp) || len2(nonce) || nonce`
/// with unsigned big-endian 16-bit length prefixes.
pub fn build_hkdf_info(
    fqdn: &str,
    client_pub_key: &[u8],
    server_pub_key: &[u8],
    timestamp: i64,
    nonce: &[u8],
) -> Vec<u8> {
    let mut info = Vec::with_capacity(
        fqdn.len() + client_pub_key.len() + server_pub_key.len() + nonce.len() + 16,
    );

    info.extend_from_slice(&(fqdn.len() as u16).to_be_bytes());
    info.extend_from_slice(fqdn.as_bytes());

    info.extend_from_slice(&(client_pub_key.len() as u16).to_be_bytes());
    info.extend_from_slice(client_pub_key);

    info.extend_from_slice(&(server_pub_key.len() as u16).to_be_bytes());
    info.extend_from_slice(server_pub_key);

    info.extend_from_slice(&timestamp.to_be_bytes());

    info.extend_from_slice(&(nonce.len() as u16).to_be_bytes());
    info.extend_from_slice(nonce);

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let a = derive_key(b"secret", b"salt", b"info", 32).unwrap();
        let b = derive_key(b"secret", b"salt", b"info", 32).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_derive_key_varies_with_inputs() {
        let base = derive_key(b"secret", b"salt", b"info", 32).unwrap();
        assert_ne!(base, derive_key(b"other", b"salt", b"info", 32).unwrap());
        assert_ne!(base, derive_key(b"secret", b"pepper", b"info", 32).unwrap());
        assert_ne!(base, derive_key(b"secret", b"salt", b"other", 32).unwrap());
    }

    #[test]
    fn test_derive_key32() {
        let key = derive_key32(b"secret", b"", b"info").unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_info_layout() {
        let info = build_hkdf_info("a.example.net", b"cpub", b"spub", 0x0102030405060708, b"nn");

        let mut expected = Vec::new();
        expected.extend_from_slice(&13u16.to_be_bytes());
        expected.extend_from_slice(b"a.example.net");
        expected.extend_from_slice(&4u16.to_be_bytes());
        expected.extend_from_slice(b"cpub");
        expected.extend_from_slice(&4u16.to_be_bytes());
        expected.extend_from_slice(b"spub");
        expected.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        expected.extend_from_slice(&2u16.to_be_bytes());
        expected.extend_from_slice(b"nn");

        assert_eq!(info, expected);
    }
}
