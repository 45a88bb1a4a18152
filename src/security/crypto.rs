//! AES-256-GCM authenticated encryption.
//!
//! Two modes: standalone calls with fully random nonces, and a session
//! [`EncryptionContext`] whose nonces mix an atomic counter with fresh
//! randomness. Output layout is always `nonce || ciphertext || tag`.

use std::sync::atomic::{AtomicU64, Ordering};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Standard nonce size for AES-GCM.
pub const AES_GCM_NONCE_SIZE: usize = 12;
/// Authentication tag size for AES-GCM.
pub const AES_GCM_TAG_SIZE: usize = 16;
/// AES-256 key size.
pub const KEY_SIZE: usize = 32;

/// AES-256-GCM encryption with nonce tracking.
///
/// Nonces are `8-byte big-endian counter || 4 random bytes`: the counter
/// guarantees uniqueness within the context, the random tail tolerates
/// process snapshots and forks. A counter wrap aborts with
/// [`Error::NonceExhausted`].
pub struct EncryptionContext {
    key: [u8; KEY_SIZE],
    counter: AtomicU64,
}

impl EncryptionContext {
    /// Create a new encryption context from a 32-byte key.
    pub fn new(key: &[u8]) -> Result<EncryptionContext> {
        if key.len() != KEY_SIZE {
            return Err(Error::Crypto(format!(
                "key must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let mut k = [0u8; KEY_SIZE];
        k.copy_from_slice(key);
        Ok(EncryptionContext {
            key: k,
            counter: AtomicU64::new(0),
        })
    }

    /// Encrypt plaintext, returning `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes = self.next_nonce()?;
        seal(&self.key, &nonce_bytes, plaintext)
    }

    /// Decrypt `nonce || ciphertext || tag`.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        open(&self.key, data)
    }

    /// Generate a unique nonce from the counter plus randomness.
    fn next_nonce(&self) -> Result<[u8; AES_GCM_NONCE_SIZE]> {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if counter == 0 {
            return Err(Error::NonceExhausted);
        }

        let mut nonce = [0u8; AES_GCM_NONCE_SIZE];
        nonce[..8].copy_from_slice(&counter.to_be_bytes());
        OsRng
            .try_fill_bytes(&mut nonce[8..])
            .map_err(|e| Error::Crypto(format!("generate random: {e}")))?;
        Ok(nonce)
    }

    /// Zero the key material.
    ///
    /// Copies made by the runtime cannot be scrubbed; for highly sensitive
    /// deployments keep the key in locked memory to begin with.
    pub fn zero_key(&mut self) {
        self.key.zeroize();
    }
}

impl Drop for EncryptionContext {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Encrypt plaintext with a fully random nonce.
///
/// Safe for standalone calls: no counter state is shared, so uniqueness
/// rests on the 96-bit random nonce.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; AES_GCM_NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| Error::Crypto(format!("generate nonce: {e}")))?;
    seal(key, &nonce, plaintext)
}

/// Decrypt `nonce || ciphertext || tag` with the given key.
pub fn decrypt(data: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>> {
    open(key, data)
}

/// Generate a random 256-bit encryption key.
pub fn generate_key() -> Result<[u8; KEY_SIZE]> {
    let mut key = [0u8; KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut key)
        .map_err(|e| Error::Crypto(format!("generate key: {e}")))?;
    Ok(key)
}

fn seal(key: &[u8; KEY_SIZE], nonce: &[u8; AES_GCM_NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("create cipher: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::Crypto("encryption failed".into()))?;

    let mut out = Vec::with_capacity(AES_GCM_NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(key: &[u8; KEY_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE {
        return Err(Error::ChunkIntegrity);
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("create cipher: {e}")))?;
    let (nonce, ciphertext) = data.split_at(AES_GCM_NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::ChunkIntegrity)
}
