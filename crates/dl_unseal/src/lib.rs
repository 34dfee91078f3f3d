//! dl_unseal — Darklock Directory Export key-unsealing primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Key material moves through opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `kdf`   — HKDF-SHA256 derivation of the key-encryption key's wrapping
//!             key (from the machine boot secret) and of per-record keys
//! - `seal`  — sealed-blob wire format and XChaCha20-Poly1305 open/seal
//! - `error` — unified error type

pub mod error;
pub mod kdf;
pub mod seal;

pub use error::UnsealError;
pub use kdf::{BootSecret, KekKey};
pub use seal::SealedBlob;
