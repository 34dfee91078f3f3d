//! Sealed blobs — XChaCha20-Poly1305 (192-bit nonce).
//!
//! Key size: 32 bytes.  Nonce: 24 bytes (random).  Tag: 16 bytes.
//! The authentication tag is the blob's integrity check: a tag mismatch
//! after decryption means the wrong key or a corrupted blob.
//!
//! Key-encryption-key blob wire format:
//!   [ magic "DLSK" (4) | version u32 LE (4) | salt (16) | nonce (24) | ciphertext + tag ]
//!
//! Per-record secret wire format (no header; the record row supplies the
//! salt and identifier):
//!   [ nonce (24 bytes) | ciphertext + tag ]

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    XChaCha20Poly1305,
};
use zeroize::Zeroizing;

use crate::error::UnsealError;

pub const SEAL_MAGIC: &[u8] = b"DLSK";
pub const SEAL_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 4 + 4 + 16 + 24;

/// Associated data binding a blob to its role in the key hierarchy.
pub const KEK_AAD: &[u8] = b"dl-dit-kek-v1";
pub const SECRET_AAD: &[u8] = b"dl-dit-secret-v1";

/// A parsed sealed key-encryption-key blob.
#[derive(Debug, Clone)]
pub struct SealedBlob {
    pub version: u32,
    /// Per-database salt, stored alongside the ciphertext (not secret).
    pub salt: [u8; 16],
    nonce: [u8; 24],
    ciphertext: Vec<u8>,
}

impl SealedBlob {
    pub fn from_bytes(buf: &[u8]) -> Result<Self, UnsealError> {
        if buf.len() < HEADER_LEN + 16 {
            return Err(UnsealError::Malformed("blob shorter than header".into()));
        }
        if &buf[..4] != SEAL_MAGIC {
            return Err(UnsealError::Malformed("bad magic".into()));
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version != SEAL_VERSION {
            return Err(UnsealError::Malformed(format!(
                "unsupported seal version {version}"
            )));
        }
        Ok(Self {
            version,
            salt: buf[8..24].try_into().unwrap(),
            nonce: buf[24..48].try_into().unwrap(),
            ciphertext: buf[48..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(SEAL_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Open the blob with a 32-byte key derived via [`crate::kdf::wrapping_key`].
    pub fn unseal(&self, key: &[u8; 32], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, UnsealError> {
        open_with_nonce(key, &self.nonce, &self.ciphertext, aad)
    }
}

/// Seal `plaintext` into a full key-encryption-key blob (header + ciphertext).
/// Used when provisioning a database and by test fixtures.
pub fn seal(
    key: &[u8; 32],
    salt: &[u8; 16],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, UnsealError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, chacha20poly1305::aead::Payload { msg: plaintext, aad })
        .map_err(|_| UnsealError::SealFailed)?;
    let blob = SealedBlob {
        version: SEAL_VERSION,
        salt: *salt,
        nonce: nonce.into(),
        ciphertext,
    };
    Ok(blob.to_bytes())
}

/// Seal a per-record secret: `[nonce | ciphertext + tag]`, no header.
pub fn seal_bytes(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, UnsealError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
    let ciphertext = cipher
        .encrypt(&nonce, chacha20poly1305::aead::Payload { msg: plaintext, aad })
        .map_err(|_| UnsealError::SealFailed)?;
    let mut out = Vec::with_capacity(24 + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a per-record secret (`[nonce | ciphertext + tag]`).
pub fn open_bytes(
    key: &[u8; 32],
    data: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, UnsealError> {
    if data.len() < 24 + 16 {
        return Err(UnsealError::Malformed("secret shorter than nonce and tag".into()));
    }
    let (nonce, ciphertext) = data.split_at(24);
    open_with_nonce(key, nonce.try_into().unwrap(), ciphertext, aad)
}

fn open_with_nonce(
    key: &[u8; 32],
    nonce: &[u8; 24],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, UnsealError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let plaintext = cipher
        .decrypt(
            nonce.into(),
            chacha20poly1305::aead::Payload { msg: ciphertext, aad },
        )
        .map_err(|_| UnsealError::TagMismatch)?;
    Ok(Zeroizing::new(plaintext))
}
