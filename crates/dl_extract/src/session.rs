//! Engine session lifecycle.
//!
//! `EngineSession` owns the storage-engine instance and the open account
//! table for exactly one extraction pass. Acquisition runs start →
//! session → attach → open table; any failure releases everything acquired
//! so far, in reverse order, before the error surfaces. Teardown is
//! idempotent and also runs from `Drop` as a backstop, but the stream's
//! `close` is the intended path.

use std::path::Path;

use tracing::{debug, warn};

use crate::engine::{ColumnId, DirectoryEngine, EngineError, TableId};
use crate::error::ExportError;
use crate::schema::OBJECT_TABLE;

pub struct EngineSession {
    engine: Box<dyn DirectoryEngine>,
    table: TableId,
    closed: bool,
}

impl EngineSession {
    /// Open a read-only session over the database at `path` and the account
    /// table inside it.
    pub fn open(
        mut engine: Box<dyn DirectoryEngine>,
        path: &Path,
    ) -> Result<Self, ExportError> {
        if !path.is_file() {
            return Err(ExportError::NotFound(path.to_path_buf()));
        }

        engine.start().map_err(ExportError::EngineStartup)?;

        if let Err(err) = engine.begin_session() {
            release(&mut *engine, &[Teardown::Terminate]);
            return Err(ExportError::Session(err));
        }
        if let Err(err) = engine.attach(path) {
            release(&mut *engine, &[Teardown::EndSession, Teardown::Terminate]);
            return Err(ExportError::Attach(err));
        }
        let table = match engine.open_table(OBJECT_TABLE) {
            Ok(table) => table,
            Err(err) => {
                release(
                    &mut *engine,
                    &[Teardown::Detach, Teardown::EndSession, Teardown::Terminate],
                );
                return Err(ExportError::TableOpen(err));
            }
        };

        debug!(path = %path.display(), "engine session established");
        Ok(Self {
            engine,
            table,
            closed: false,
        })
    }

    /// Release the table, session, attachment and instance, in that order.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let table = self.table;
        if let Err(err) = self.engine.close_table(table) {
            warn!(error = %err, "close table during teardown");
        }
        release(
            &mut *self.engine,
            &[Teardown::Detach, Teardown::EndSession, Teardown::Terminate],
        );
        debug!("engine session closed");
    }

    // Cursor and catalog operations, forwarded to the engine with the
    // session's table handle. Engine errors pass through as `EngineError`
    // so each caller can map them to its own taxonomy variant.

    pub fn resolve_column(&mut self, name: &str) -> Result<Option<ColumnId>, EngineError> {
        let table = self.table;
        self.engine.resolve_column(table, name)
    }

    pub fn seek_key(&mut self, key: &[u8]) -> Result<bool, EngineError> {
        let table = self.table;
        self.engine.seek_key(table, key)
    }

    pub fn move_first(&mut self) -> Result<bool, EngineError> {
        let table = self.table;
        self.engine.move_first(table)
    }

    pub fn move_next(&mut self) -> Result<bool, EngineError> {
        let table = self.table;
        self.engine.move_next(table)
    }

    pub fn read_column(&mut self, column: ColumnId) -> Result<Option<Vec<u8>>, EngineError> {
        let table = self.table;
        self.engine.read_column(table, column)
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.close();
    }
}

enum Teardown {
    Detach,
    EndSession,
    Terminate,
}

fn release(engine: &mut dyn DirectoryEngine, steps: &[Teardown]) {
    for step in steps {
        let result = match step {
            Teardown::Detach => engine.detach(),
            Teardown::EndSession => engine.end_session(),
            Teardown::Terminate => engine.terminate(),
        };
        if let Err(err) = result {
            warn!(error = %err, "engine teardown step failed");
        }
    }
}
