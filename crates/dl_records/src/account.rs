//! One decoded directory account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account-control flag bits, as stored in the directory's flags column.
pub mod flags {
    /// Account is administratively disabled.
    pub const DISABLED: u32 = 0x0002;
    /// Account is locked out after failed authentication attempts.
    pub const LOCKED_OUT: u32 = 0x0010;
    /// The account's secret never expires.
    pub const NO_SECRET_EXPIRY: u32 = 0x1_0000;

    pub fn is_disabled(bits: u32) -> bool {
        bits & DISABLED != 0
    }

    pub fn is_locked_out(bits: u32) -> bool {
        bits & LOCKED_OUT != 0
    }

    pub fn has_no_secret_expiry(bits: u32) -> bool {
        bits & NO_SECRET_EXPIRY != 0
    }
}

/// One account pulled from the directory database.
///
/// Identity fields are read directly from the row. Secret fields are
/// decrypted during extraction and carried here hex-encoded; a `None`
/// means the source row had no secret of that kind, which is a normal
/// state and not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Stable row identifier within this database snapshot.
    pub record_id: u64,
    pub principal_name: String,
    pub description: Option<String>,
    /// Raw account-control bits (see [`flags`]).
    pub flags: u32,
    pub disabled: bool,
    pub locked_out: bool,
    pub no_secret_expiry: bool,
    pub last_secret_change: Option<DateTime<Utc>>,
    pub logon_count: Option<u32>,
    /// Current-format credential hash, hex.
    pub primary_secret: Option<String>,
    /// Legacy-format credential hash, hex.
    pub legacy_secret: Option<String>,
    /// Prior credential hashes, newest first, hex.
    pub secret_history: Option<Vec<String>>,
}
