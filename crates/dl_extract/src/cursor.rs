//! Forward-only positioning over qualifying account rows.
//!
//! The object table mixes user accounts with every other directory object
//! type; the cursor layer hides the non-qualifying rows so the rest of the
//! pipeline only ever sees user accounts. Positioning is forward-only:
//! one pass per session, no rewind.

use crate::error::ExportError;
use crate::schema::{ColumnSchema, USER_OBJECT_TYPE};
use crate::session::EngineSession;

/// Where `advance_to_user` starts testing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Test the row under the cursor first (initial positioning).
    FromCurrent,
    /// Step off the current row before testing (steady-state iteration).
    FromNext,
}

/// Position the cursor on the table's first row.
/// `CursorSeek` if the table is empty.
pub fn seek_first(session: &mut EngineSession) -> Result<(), ExportError> {
    if session.move_first()? {
        Ok(())
    } else {
        Err(ExportError::CursorSeek)
    }
}

/// Move the cursor forward until it rests on a user-account row.
///
/// Returns `Ok(false)` when the table is exhausted. That is the normal
/// end-of-data signal, not an error. Skipped rows are invisible to batch
/// accounting. An `Err` is an underlying engine I/O failure.
pub fn advance_to_user(
    session: &mut EngineSession,
    schema: &ColumnSchema,
    from: Advance,
) -> Result<bool, ExportError> {
    if from == Advance::FromNext && !session.move_next()? {
        return Ok(false);
    }
    loop {
        if is_user_row(session, schema)? {
            return Ok(true);
        }
        if !session.move_next()? {
            return Ok(false);
        }
    }
}

/// A row qualifies when its object-type cell carries the user marker.
/// Rows with a null or short type cell never qualify.
fn is_user_row(session: &mut EngineSession, schema: &ColumnSchema) -> Result<bool, ExportError> {
    let cell = session.read_column(schema.object_type)?;
    Ok(match cell {
        Some(bytes) if bytes.len() >= 4 => {
            u32::from_le_bytes(bytes[..4].try_into().unwrap()) == USER_OBJECT_TYPE
        }
        _ => false,
    })
}
