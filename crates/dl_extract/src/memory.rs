//! In-memory reference implementation of the storage-engine capability.
//!
//! Used by the test suites and as a wiring reference for real engine
//! bindings. It enforces the acquisition ladder strictly (calls out of
//! order fail the same way a native engine would) so lifecycle bugs in the
//! pipeline surface in tests instead of against production databases.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::{ColumnId, DirectoryEngine, EngineError, TableId};

struct Row {
    key: Vec<u8>,
    cells: Vec<Option<Vec<u8>>>,
}

struct TableData {
    columns: Vec<String>,
    rows: Vec<Row>,
}

struct OpenTable {
    name: String,
    pos: Option<usize>,
}

/// An in-memory directory database plus the engine state machine over it.
#[derive(Default)]
pub struct MemoryEngine {
    tables: BTreeMap<String, TableData>,
    started: bool,
    in_session: bool,
    attached: Option<PathBuf>,
    open: BTreeMap<u32, OpenTable>,
    next_handle: u32,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table and its column catalog.
    ///
    /// Panics if the table already exists; fixtures are built once.
    pub fn define_table(&mut self, name: &str, columns: &[&str]) {
        let prev = self.tables.insert(
            name.to_string(),
            TableData {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        assert!(prev.is_none(), "table {name} defined twice");
    }

    /// Append a row. `cells` maps column names to values; unnamed columns
    /// are null. Panics on an unknown table or column name.
    pub fn insert_row(&mut self, table: &str, key: &[u8], cells: &[(&str, Vec<u8>)]) {
        let data = self.tables.get_mut(table).expect("unknown table");
        let mut row = Row {
            key: key.to_vec(),
            cells: vec![None; data.columns.len()],
        };
        for (name, value) in cells {
            let idx = data
                .columns
                .iter()
                .position(|c| c == name)
                .unwrap_or_else(|| panic!("unknown column {name}"));
            row.cells[idx] = Some(value.clone());
        }
        data.rows.push(row);
    }

    fn table(&self, handle: TableId) -> Result<(&OpenTable, &TableData), EngineError> {
        let open = self.open.get(&handle.0).ok_or(EngineError::InvalidHandle)?;
        let data = self
            .tables
            .get(&open.name)
            .ok_or(EngineError::InvalidHandle)?;
        Ok((open, data))
    }

    fn current_row(&self, handle: TableId) -> Result<&Row, EngineError> {
        let (open, data) = self.table(handle)?;
        let pos = open
            .pos
            .ok_or_else(|| EngineError::Io("no current row".into()))?;
        data.rows
            .get(pos)
            .ok_or_else(|| EngineError::Io("no current row".into()))
    }
}

impl DirectoryEngine for MemoryEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::Startup("instance already started".into()));
        }
        self.started = true;
        Ok(())
    }

    fn begin_session(&mut self) -> Result<(), EngineError> {
        if !self.started {
            return Err(EngineError::Session("instance not started".into()));
        }
        if self.in_session {
            return Err(EngineError::Session("session already active".into()));
        }
        self.in_session = true;
        Ok(())
    }

    fn attach(&mut self, path: &Path) -> Result<(), EngineError> {
        if !self.in_session {
            return Err(EngineError::Attach("no active session".into()));
        }
        if self.attached.is_some() {
            return Err(EngineError::Attach("database already attached".into()));
        }
        self.attached = Some(path.to_path_buf());
        Ok(())
    }

    fn open_table(&mut self, name: &str) -> Result<TableId, EngineError> {
        if self.attached.is_none() {
            return Err(EngineError::OpenTable("no attached database".into()));
        }
        if !self.tables.contains_key(name) {
            return Err(EngineError::OpenTable(format!("no such table {name}")));
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.open.insert(
            handle,
            OpenTable {
                name: name.to_string(),
                pos: None,
            },
        );
        Ok(TableId(handle))
    }

    fn resolve_column(
        &mut self,
        table: TableId,
        name: &str,
    ) -> Result<Option<ColumnId>, EngineError> {
        let (_, data) = self.table(table)?;
        Ok(data
            .columns
            .iter()
            .position(|c| c == name)
            .map(|idx| ColumnId(idx as u32)))
    }

    fn seek_key(&mut self, table: TableId, key: &[u8]) -> Result<bool, EngineError> {
        let (_, data) = self.table(table)?;
        let found = data.rows.iter().position(|row| row.key == key);
        let open = self.open.get_mut(&table.0).ok_or(EngineError::InvalidHandle)?;
        open.pos = found;
        Ok(found.is_some())
    }

    fn move_first(&mut self, table: TableId) -> Result<bool, EngineError> {
        let (_, data) = self.table(table)?;
        let has_rows = !data.rows.is_empty();
        let open = self.open.get_mut(&table.0).ok_or(EngineError::InvalidHandle)?;
        open.pos = has_rows.then_some(0);
        Ok(has_rows)
    }

    fn move_next(&mut self, table: TableId) -> Result<bool, EngineError> {
        let (open, data) = self.table(table)?;
        let pos = open
            .pos
            .ok_or_else(|| EngineError::Io("no current row".into()))?;
        let next = pos + 1;
        let in_range = next < data.rows.len();
        let open = self.open.get_mut(&table.0).ok_or(EngineError::InvalidHandle)?;
        open.pos = in_range.then_some(next);
        Ok(in_range)
    }

    fn read_column(
        &mut self,
        table: TableId,
        column: ColumnId,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let row = self.current_row(table)?;
        let cell = row
            .cells
            .get(column.0 as usize)
            .ok_or(EngineError::InvalidHandle)?;
        Ok(cell.clone())
    }

    fn close_table(&mut self, table: TableId) -> Result<(), EngineError> {
        self.open
            .remove(&table.0)
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle)
    }

    fn detach(&mut self) -> Result<(), EngineError> {
        if !self.open.is_empty() {
            return Err(EngineError::Attach("tables still open".into()));
        }
        if self.attached.take().is_none() {
            return Err(EngineError::Attach("no attached database".into()));
        }
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), EngineError> {
        if self.attached.is_some() {
            return Err(EngineError::Session("database still attached".into()));
        }
        if !self.in_session {
            return Err(EngineError::Session("no active session".into()));
        }
        self.in_session = false;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), EngineError> {
        if self.in_session {
            return Err(EngineError::Startup("session still active".into()));
        }
        self.started = false;
        Ok(())
    }
}
