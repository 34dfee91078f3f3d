//! One row → one [`AccountRecord`].
//!
//! Identity attributes are read directly from the row. Each secret
//! attribute, when present, is opened with a key derived from the session's
//! key-encryption key, the record identifier and (on newer formats) a
//! per-record salt column. A null secret cell means the account simply has
//! no secret of that kind; it is recorded as absent, never as an error.

use chrono::DateTime;
use zeroize::Zeroizing;

use dl_records::account::flags;
use dl_records::AccountRecord;
use dl_unseal::seal::{open_bytes, SECRET_AAD};
use dl_unseal::{kdf, KekKey};

use crate::engine::ColumnId;
use crate::error::ExportError;
use crate::schema::ColumnSchema;
use crate::session::EngineSession;

/// Each prior credential hash in the sealed history plaintext.
const HISTORY_ENTRY_LEN: usize = 16;

/// Decode the account under the cursor.
///
/// Fails with `RecordDecode` when a present secret fails to open or a field
/// is malformed; the stream layer decides whether that is fatal to the call.
pub fn decode_current(
    session: &mut EngineSession,
    schema: &ColumnSchema,
    kek: &KekKey,
) -> Result<AccountRecord, ExportError> {
    let record_id = match session.read_column(schema.record_id)? {
        Some(bytes) if bytes.len() == 8 => u64::from_le_bytes(bytes[..8].try_into().unwrap()),
        Some(bytes) => {
            return Err(decode_err(0, format!("record identifier is {} bytes", bytes.len())))
        }
        None => return Err(decode_err(0, "record identifier cell is null")),
    };

    let principal_name = session
        .read_column(schema.principal_name)?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();

    let raw_flags = match session.read_column(schema.account_flags)? {
        Some(bytes) if bytes.len() >= 4 => u32::from_le_bytes(bytes[..4].try_into().unwrap()),
        _ => 0,
    };

    let description = read_optional(session, schema.description)?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

    let last_secret_change = match read_optional(session, schema.last_secret_change)? {
        Some(bytes) if bytes.len() == 8 => {
            let secs = i64::from_le_bytes(bytes[..8].try_into().unwrap());
            Some(
                DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| decode_err(record_id, "secret-change timestamp out of range"))?,
            )
        }
        Some(_) => return Err(decode_err(record_id, "secret-change timestamp malformed")),
        None => None,
    };

    let logon_count = match read_optional(session, schema.logon_count)? {
        Some(bytes) if bytes.len() >= 4 => {
            Some(u32::from_le_bytes(bytes[..4].try_into().unwrap()))
        }
        Some(_) => return Err(decode_err(record_id, "logon count malformed")),
        None => None,
    };

    let record_salt = match read_optional(session, schema.secret_salt)? {
        Some(bytes) => Some(
            <[u8; 16]>::try_from(bytes.as_slice())
                .map_err(|_| decode_err(record_id, "record salt is not 16 bytes"))?,
        ),
        None => None,
    };

    let sealed_primary = session.read_column(schema.sealed_primary_secret)?;
    let sealed_legacy = session.read_column(schema.sealed_legacy_secret)?;
    let sealed_history = session.read_column(schema.sealed_secret_history)?;

    // Derive the per-record key only when the row actually carries secrets.
    let mut primary_secret = None;
    let mut legacy_secret = None;
    let mut secret_history = None;
    if sealed_primary.is_some() || sealed_legacy.is_some() || sealed_history.is_some() {
        let key = kdf::record_key(kek, record_id, record_salt.as_ref())
            .map_err(|err| decode_err(record_id, err))?;

        primary_secret = open_secret(&key, sealed_primary.as_deref(), record_id)?;
        legacy_secret = open_secret(&key, sealed_legacy.as_deref(), record_id)?;
        secret_history = match open_secret_raw(&key, sealed_history.as_deref(), record_id)? {
            Some(plain) => Some(split_history(plain.as_slice(), record_id)?),
            None => None,
        };
    }

    Ok(AccountRecord {
        record_id,
        principal_name,
        description,
        flags: raw_flags,
        disabled: flags::is_disabled(raw_flags),
        locked_out: flags::is_locked_out(raw_flags),
        no_secret_expiry: flags::has_no_secret_expiry(raw_flags),
        last_secret_change,
        logon_count,
        primary_secret,
        legacy_secret,
        secret_history,
    })
}

fn read_optional(
    session: &mut EngineSession,
    column: Option<ColumnId>,
) -> Result<Option<Vec<u8>>, ExportError> {
    match column {
        Some(column) => Ok(session.read_column(column)?),
        None => Ok(None),
    }
}

fn open_secret(
    key: &[u8; 32],
    sealed: Option<&[u8]>,
    record_id: u64,
) -> Result<Option<String>, ExportError> {
    Ok(open_secret_raw(key, sealed, record_id)?.map(|plain| hex::encode(plain.as_slice())))
}

fn open_secret_raw(
    key: &[u8; 32],
    sealed: Option<&[u8]>,
    record_id: u64,
) -> Result<Option<Zeroizing<Vec<u8>>>, ExportError> {
    match sealed {
        Some(sealed) => {
            let plain = open_bytes(key, sealed, SECRET_AAD)
                .map_err(|err| decode_err(record_id, err))?;
            Ok(Some(plain))
        }
        None => Ok(None),
    }
}

fn split_history(plain: &[u8], record_id: u64) -> Result<Vec<String>, ExportError> {
    if plain.len() % HISTORY_ENTRY_LEN != 0 {
        return Err(decode_err(record_id, "secret history length is not a whole number of entries"));
    }
    Ok(plain.chunks(HISTORY_ENTRY_LEN).map(hex::encode).collect())
}

fn decode_err(record_id: u64, detail: impl ToString) -> ExportError {
    ExportError::RecordDecode {
        record_id,
        detail: detail.to_string(),
    }
}
