//! Key derivation functions
//!
//! `wrapping_key` — HKDF-SHA256, turns the 16-byte machine boot secret plus
//!   the database's salt into the key that opens the sealed key-encryption
//!   key.
//!
//! `record_key` — HKDF-SHA256, derives the per-record key that opens one
//!   account's sealed secret fields.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::UnsealError;

/// 16-byte machine boot secret. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct BootSecret(pub [u8; 16]);

/// 32-byte key-encryption key recovered from the database. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct KekKey(pub [u8; 32]);

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
///
/// `salt` may be empty (HKDF will use a zeroed salt).
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), UnsealError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| UnsealError::KeyDerivation(e.to_string()))
}

/// Derive the 32-byte wrapping key for the sealed key-encryption key.
/// `salt` is the per-database salt embedded in the sealed blob (not secret).
pub fn wrapping_key(boot: &BootSecret, salt: &[u8; 16]) -> Result<[u8; 32], UnsealError> {
    let mut key = [0u8; 32];
    hkdf_expand(&boot.0, Some(salt), b"dl-dit-kek", &mut key)?;
    Ok(key)
}

/// Derive the per-record key that opens one account's sealed secrets.
///
/// `record_salt` is present only on newer database formats; older rows
/// derive from the record identifier alone.
pub fn record_key(
    kek: &KekKey,
    record_id: u64,
    record_salt: Option<&[u8; 16]>,
) -> Result<[u8; 32], UnsealError> {
    let mut info = Vec::with_capacity(8 + 13);
    info.extend_from_slice(&record_id.to_le_bytes());
    info.extend_from_slice(b"dl-dit-record");
    let mut key = [0u8; 32];
    hkdf_expand(&kek.0, record_salt.map(|s| s.as_slice()), &info, &mut key)?;
    Ok(key)
}

/// Generate a fresh random 16-byte salt (used when provisioning a database).
pub fn generate_salt() -> [u8; 16] {
    use rand::RngCore;
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
