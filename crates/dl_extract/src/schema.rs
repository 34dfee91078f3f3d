//! Logical column catalog and name → id resolution.
//!
//! The database carries no fixed schema contract; column ids differ between
//! files and format versions. The pipeline therefore resolves the columns
//! it needs by name, once per session, and reads through the resulting
//! mapping from then on. Required columns gate the format version: if one
//! is absent the database is an unsupported version and extraction stops
//! before any record is produced. Optional columns absorb drift: newer
//! formats add them, older ones simply lack them.

use crate::engine::ColumnId;
use crate::error::ExportError;
use crate::session::EngineSession;

/// On-disk name of the table holding every directory object.
pub const OBJECT_TABLE: &str = "datatable";

/// Primary key of the system row carrying the sealed key-encryption key.
pub const SYSTEM_RECORD_KEY: &[u8] = b"system";

/// Object-type value marking a user account row.
pub const USER_OBJECT_TYPE: u32 = 0x3000_0000;

/// Logical column names, resolved against the live catalog.
pub mod columns {
    pub const RECORD_ID: &str = "record_id";
    pub const PRINCIPAL_NAME: &str = "principal_name";
    pub const OBJECT_TYPE: &str = "object_type";
    pub const ACCOUNT_FLAGS: &str = "account_flags";
    pub const SEALED_KEK: &str = "sealed_kek";
    pub const SEALED_PRIMARY_SECRET: &str = "sealed_primary_secret";
    pub const SEALED_LEGACY_SECRET: &str = "sealed_legacy_secret";
    pub const SEALED_SECRET_HISTORY: &str = "sealed_secret_history";
    pub const SECRET_SALT: &str = "secret_salt";
    pub const DESCRIPTION: &str = "description";
    pub const LAST_SECRET_CHANGE: &str = "last_secret_change";
    pub const LOGON_COUNT: &str = "logon_count";
}

/// Name → engine-native id mapping for one session. Immutable once built.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub record_id: ColumnId,
    pub principal_name: ColumnId,
    pub object_type: ColumnId,
    pub account_flags: ColumnId,
    pub sealed_kek: ColumnId,
    pub sealed_primary_secret: ColumnId,
    pub sealed_legacy_secret: ColumnId,
    pub sealed_secret_history: ColumnId,
    pub secret_salt: Option<ColumnId>,
    pub description: Option<ColumnId>,
    pub last_secret_change: Option<ColumnId>,
    pub logon_count: Option<ColumnId>,
}

impl ColumnSchema {
    pub fn resolve(session: &mut EngineSession) -> Result<Self, ExportError> {
        Ok(Self {
            record_id: required(session, columns::RECORD_ID)?,
            principal_name: required(session, columns::PRINCIPAL_NAME)?,
            object_type: required(session, columns::OBJECT_TYPE)?,
            account_flags: required(session, columns::ACCOUNT_FLAGS)?,
            sealed_kek: required(session, columns::SEALED_KEK)?,
            sealed_primary_secret: required(session, columns::SEALED_PRIMARY_SECRET)?,
            sealed_legacy_secret: required(session, columns::SEALED_LEGACY_SECRET)?,
            sealed_secret_history: required(session, columns::SEALED_SECRET_HISTORY)?,
            secret_salt: optional(session, columns::SECRET_SALT)?,
            description: optional(session, columns::DESCRIPTION)?,
            last_secret_change: optional(session, columns::LAST_SECRET_CHANGE)?,
            logon_count: optional(session, columns::LOGON_COUNT)?,
        })
    }
}

fn required(session: &mut EngineSession, column: &'static str) -> Result<ColumnId, ExportError> {
    session
        .resolve_column(column)?
        .ok_or(ExportError::SchemaMismatch { column })
}

fn optional(
    session: &mut EngineSession,
    column: &'static str,
) -> Result<Option<ColumnId>, ExportError> {
    Ok(session.resolve_column(column)?)
}
