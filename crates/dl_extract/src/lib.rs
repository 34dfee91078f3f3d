//! dl_extract — Darklock Directory Export extraction pipeline
//!
//! Pulls account credential records out of an offline directory-service
//! database and exposes them as a bounded, batched, pull-driven stream.
//! Secret attributes are stored encrypted under a key hierarchy rooted in a
//! machine boot secret; the pipeline recovers the key-encryption key once at
//! setup and opens each record's secrets with per-record derived keys.
//!
//! The storage engine itself is NOT implemented here — it is consumed
//! through the [`engine::DirectoryEngine`] capability trait. The host wires
//! in a real engine; [`memory::MemoryEngine`] is the in-tree reference used
//! by the test suites.
//!
//! # Module layout
//! - `engine`  — storage-engine capability trait and native error codes
//! - `memory`  — in-memory reference engine
//! - `session` — engine session lifecycle (open, teardown in reverse order)
//! - `schema`  — logical column catalog and name → id resolution
//! - `pek`     — key-encryption-key recovery from the fixed system row
//! - `cursor`  — forward-only positioning over qualifying account rows
//! - `decode`  — one row → one [`dl_records::AccountRecord`]
//! - `stream`  — the pull-based batch stream (read / eof / write / close)
//! - `error`   — closed error taxonomy for the whole pipeline

pub mod cursor;
pub mod decode;
pub mod engine;
pub mod error;
pub mod memory;
pub mod pek;
pub mod schema;
pub mod session;
pub mod stream;

pub use error::ExportError;
pub use session::EngineSession;
pub use stream::{ExportStream, DEFAULT_BATCH_LIMIT};
