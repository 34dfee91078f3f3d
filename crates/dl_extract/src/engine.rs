//! Storage-engine capability.
//!
//! The directory database's storage engine is an external collaborator; the
//! pipeline consumes it through this trait and nothing else. The surface is
//! deliberately handle-based (one engine instance carries one session, one
//! attached database and any number of open tables) so that a native
//! engine binding can map each call directly onto its own API.
//!
//! Call order is the acquisition ladder: `start` → `begin_session` →
//! `attach` → `open_table`; teardown mirrors it in reverse (`close_table` →
//! `detach` → `end_session` → `terminate`). [`crate::session::EngineSession`]
//! owns that ladder; nothing else in the pipeline calls teardown.
//!
//! Column value encodings: integers little-endian, strings UTF-8, blobs raw.

use std::path::Path;

use thiserror::Error;

/// Engine-native handle for an open table cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub u32);

/// Engine-native handle for a resolved column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub u32);

/// Failure codes crossing the capability seam. Mapped into
/// [`crate::error::ExportError`] by the pipeline; never surfaced raw.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine startup: {0}")]
    Startup(String),

    #[error("session: {0}")]
    Session(String),

    #[error("attach: {0}")]
    Attach(String),

    #[error("open table: {0}")]
    OpenTable(String),

    #[error("invalid handle")]
    InvalidHandle,

    #[error("I/O: {0}")]
    Io(String),
}

/// One storage-engine instance giving read-only, forward-sequential access
/// to one database file.
///
/// Cursor semantics: `seek_key`/`move_first`/`move_next` position the
/// table's single cursor; `read_column` reads from the row under it.
/// `Ok(false)` from a positioning call means "no such row" (not found,
/// empty table, end of table); an `Err` is reserved for real I/O failures.
pub trait DirectoryEngine {
    fn start(&mut self) -> Result<(), EngineError>;

    fn begin_session(&mut self) -> Result<(), EngineError>;

    /// Attach the database file, read-only.
    fn attach(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Open a named table for read-only, forward-sequential scans.
    fn open_table(&mut self, name: &str) -> Result<TableId, EngineError>;

    /// Resolve a column name against the table's live catalog.
    /// `Ok(None)` means the column does not exist in this database version.
    fn resolve_column(
        &mut self,
        table: TableId,
        name: &str,
    ) -> Result<Option<ColumnId>, EngineError>;

    /// Position the cursor on the row with the given primary key.
    fn seek_key(&mut self, table: TableId, key: &[u8]) -> Result<bool, EngineError>;

    /// Position the cursor on the table's first row.
    fn move_first(&mut self, table: TableId) -> Result<bool, EngineError>;

    /// Advance the cursor one row.
    fn move_next(&mut self, table: TableId) -> Result<bool, EngineError>;

    /// Read one cell from the row under the cursor. `Ok(None)` is a
    /// null/absent cell, which is a normal state for optional attributes.
    fn read_column(
        &mut self,
        table: TableId,
        column: ColumnId,
    ) -> Result<Option<Vec<u8>>, EngineError>;

    fn close_table(&mut self, table: TableId) -> Result<(), EngineError>;

    fn end_session(&mut self) -> Result<(), EngineError>;

    fn detach(&mut self) -> Result<(), EngineError>;

    fn terminate(&mut self) -> Result<(), EngineError>;
}
