//! Cryptographic primitives: authenticated encryption, hashing, key
//! derivation, and the three security tokens.

mod crypto;
mod hash;
mod hkdf;
mod tokens;

pub use crypto::{
    decrypt, encrypt, generate_key, EncryptionContext, AES_GCM_NONCE_SIZE, AES_GCM_TAG_SIZE,
    KEY_SIZE,
};
pub use hash::{constant_time_eq, sha256, sha256_hex, verify_chunk_integrity, verify_hash};
pub use hkdf::{build_hkdf_info, derive_key, derive_key32};
pub use tokens::{validate_ctp, validate_nba, Bdt, Ctp, CtpPayload, Nba};

pub(crate) use tokens::hmac_tag_hex;
