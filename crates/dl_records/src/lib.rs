//! dl_records — Darklock Directory Export record types
//!
//! The types that cross the export-stream boundary. A host transport
//! serialises these as it sees fit; the shapes here are semantic, not
//! byte-exact.
//!
//! # Module layout
//! - `account` — one decoded directory account, plus account-control flag bits
//! - `batch`   — a bounded slice of decoded accounts from one pull request

pub mod account;
pub mod batch;

pub use account::AccountRecord;
pub use batch::RecordBatch;
