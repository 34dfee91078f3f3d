use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;
use dl_unseal::UnsealError;

/// Closed error taxonomy for the extraction pipeline.
///
/// Engine-native failure codes are mapped into these variants at the
/// capability seam and never propagated raw. Every setup variant
/// (`EngineStartup` through `CursorSeek`) is terminal: no partial stream is
/// ever exposed, and all engine resources acquired before the failure are
/// released before it surfaces.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Database file not found: {0}")]
    NotFound(PathBuf),

    /// Unrecoverable; the caller should abort the whole operation, not retry.
    #[error("Storage engine startup failed: {0}")]
    EngineStartup(#[source] EngineError),

    #[error("Storage session could not be started: {0}")]
    Session(#[source] EngineError),

    #[error("Database attach failed: {0}")]
    Attach(#[source] EngineError),

    #[error("Account table open failed: {0}")]
    TableOpen(#[source] EngineError),

    /// The database format is of an unsupported version.
    #[error("Required column {column} missing from table catalog")]
    SchemaMismatch { column: &'static str },

    #[error("Sealed key-encryption-key record not found")]
    PekNotFound,

    /// Wrong boot secret or corrupted key blob.
    #[error("Key-encryption key could not be unsealed: {0}")]
    KeyDecrypt(#[source] UnsealError),

    #[error("Cursor could not be positioned on the first record")]
    CursorSeek,

    /// Per-record failure; fatal to a read call only when it hits the first
    /// record of the batch.
    #[error("Record {record_id} could not be decoded: {detail}")]
    RecordDecode { record_id: u64, detail: String },

    #[error("Stream is closed")]
    StreamClosed,

    /// Cursor/read I/O failure surfaced mid-stream.
    #[error("Storage engine failure: {0}")]
    Engine(#[from] EngineError),
}
