//! Key-encryption-key recovery.
//!
//! The database keeps its key-encryption key sealed inside a fixed system
//! row, wrapped under a key derived from the machine boot secret and a
//! per-database salt embedded in the sealed blob. Recovery happens exactly
//! once per session, before any account record is decoded. There is no
//! partial-key state: either the full key comes back or setup fails.

use tracing::debug;

use dl_unseal::seal::KEK_AAD;
use dl_unseal::{kdf, BootSecret, KekKey, SealedBlob, UnsealError};

use crate::error::ExportError;
use crate::schema::{ColumnSchema, SYSTEM_RECORD_KEY};
use crate::session::EngineSession;

/// Locate, read and unseal the key-encryption key.
///
/// `PekNotFound` if the system row or its sealed cell is missing;
/// `KeyDecrypt` if the blob is malformed or its tag does not verify
/// (wrong boot secret or corrupted blob). Both are terminal for the whole
/// extraction.
pub fn recover_kek(
    session: &mut EngineSession,
    schema: &ColumnSchema,
    boot: &BootSecret,
) -> Result<KekKey, ExportError> {
    if !session.seek_key(SYSTEM_RECORD_KEY)? {
        return Err(ExportError::PekNotFound);
    }
    let raw = session
        .read_column(schema.sealed_kek)?
        .ok_or(ExportError::PekNotFound)?;

    let sealed = SealedBlob::from_bytes(&raw).map_err(ExportError::KeyDecrypt)?;
    let wrapping = kdf::wrapping_key(boot, &sealed.salt).map_err(ExportError::KeyDecrypt)?;
    let plain = sealed
        .unseal(&wrapping, KEK_AAD)
        .map_err(ExportError::KeyDecrypt)?;

    let key: [u8; 32] = plain.as_slice().try_into().map_err(|_| {
        ExportError::KeyDecrypt(UnsealError::Malformed(format!(
            "unsealed key is {} bytes, expected 32",
            plain.len()
        )))
    })?;

    debug!("key-encryption key recovered");
    Ok(KekKey(key))
}
