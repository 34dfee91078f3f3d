//! One pull request's worth of decoded accounts.

use serde::{Deserialize, Serialize};

use crate::account::AccountRecord;

/// The result of a single `read` against the export stream.
///
/// `reached_end` is the stream's sticky end-of-data signal: a short batch
/// with `reached_end = true` means the cursor is exhausted and no further
/// records will ever be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub records: Vec<AccountRecord>,
    pub reached_end: bool,
}

impl RecordBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
