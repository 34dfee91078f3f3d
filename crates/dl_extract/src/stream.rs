//! The pull-based export stream.
//!
//! One `ExportStream` owns one engine session, one resolved schema and the
//! unsealed key-encryption key for its whole life. The host pulls bounded
//! batches with `read`; a short batch with `reached_end = true` is the
//! end-of-data signal, and the flag never clears once set. `close` is the
//! only path that releases engine resources and key material; it is
//! idempotent and also runs from `Drop`.
//!
//! Failure policy inside one `read`: if the very first decode (or the
//! advance that follows it) fails, the call fails and the stream state does
//! not change; the caller may retry or abort. A failure after at least one
//! record has been gathered is absorbed: the call succeeds with what it
//! has, and end-of-data is set. One consequence, kept deliberately: a
//! corrupt record encountered mid-batch is indistinguishable from a clean
//! end of the table on the wire. The `warn!` trace is the only breadcrumb.

use std::path::Path;

use tracing::{info, warn};

use dl_records::RecordBatch;
use dl_unseal::{BootSecret, KekKey};

use crate::cursor::{advance_to_user, seek_first, Advance};
use crate::decode::decode_current;
use crate::engine::DirectoryEngine;
use crate::error::ExportError;
use crate::pek::recover_kek;
use crate::schema::ColumnSchema;
use crate::session::EngineSession;

/// Batch size used by hosts that do not pick their own.
pub const DEFAULT_BATCH_LIMIT: usize = 20;

/// Everything one extraction pass owns. Destroyed exactly once by `close`.
struct StreamContext {
    session: EngineSession,
    schema: ColumnSchema,
    kek: KekKey,
    /// Cursor rests on a not-yet-emitted qualifying row.
    positioned: bool,
    /// Sticky end-of-data flag; never cleared once set.
    eof: bool,
}

/// Pull-based, single-consumer stream of decoded account records.
pub struct ExportStream {
    ctx: Option<StreamContext>,
}

impl core::fmt::Debug for ExportStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExportStream")
            .field("open", &self.ctx.is_some())
            .finish()
    }
}

impl ExportStream {
    /// Run the full setup: engine session, schema resolution, key recovery,
    /// initial positioning. Any failure tears down every engine resource
    /// acquired so far before surfacing; no partial stream is ever exposed.
    pub fn open(
        engine: Box<dyn DirectoryEngine>,
        path: &Path,
        boot: &BootSecret,
    ) -> Result<Self, ExportError> {
        let mut session = EngineSession::open(engine, path)?;

        let schema = match ColumnSchema::resolve(&mut session) {
            Ok(schema) => schema,
            Err(err) => {
                session.close();
                return Err(err);
            }
        };
        let kek = match recover_kek(&mut session, &schema, boot) {
            Ok(kek) => kek,
            Err(err) => {
                session.close();
                return Err(err);
            }
        };
        if let Err(err) = seek_first(&mut session) {
            session.close();
            return Err(err);
        }
        // A table with rows but no user accounts is a valid, empty export.
        let positioned = match advance_to_user(&mut session, &schema, Advance::FromCurrent) {
            Ok(positioned) => positioned,
            Err(err) => {
                session.close();
                return Err(err);
            }
        };

        info!(path = %path.display(), "export stream ready");
        Ok(Self {
            ctx: Some(StreamContext {
                session,
                schema,
                kek,
                positioned,
                eof: false,
            }),
        })
    }

    /// Pull up to `batch_limit` records.
    pub fn read(&mut self, batch_limit: usize) -> Result<RecordBatch, ExportError> {
        let ctx = self.ctx.as_mut().ok_or(ExportError::StreamClosed)?;

        if ctx.eof || batch_limit == 0 {
            return Ok(RecordBatch {
                records: Vec::new(),
                reached_end: ctx.eof,
            });
        }
        if !ctx.positioned {
            ctx.eof = true;
            return Ok(RecordBatch {
                records: Vec::new(),
                reached_end: true,
            });
        }

        let mut records = Vec::new();
        while records.len() < batch_limit {
            match decode_current(&mut ctx.session, &ctx.schema, &ctx.kek) {
                Ok(record) => records.push(record),
                Err(err) => {
                    if records.is_empty() {
                        return Err(err);
                    }
                    warn!(error = %err, "record decode failed mid-batch; ending stream early");
                    ctx.positioned = false;
                    ctx.eof = true;
                    break;
                }
            }
            match advance_to_user(&mut ctx.session, &ctx.schema, Advance::FromNext) {
                Ok(true) => {}
                Ok(false) => {
                    ctx.positioned = false;
                    ctx.eof = true;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "cursor advance failed mid-batch; ending stream early");
                    ctx.positioned = false;
                    ctx.eof = true;
                    break;
                }
            }
        }

        Ok(RecordBatch {
            records,
            reached_end: ctx.eof,
        })
    }

    /// Current end-of-data flag. O(1), no side effects.
    pub fn eof(&self) -> Result<bool, ExportError> {
        self.ctx
            .as_ref()
            .map(|ctx| ctx.eof)
            .ok_or(ExportError::StreamClosed)
    }

    /// The export channel is one-directional; writes succeed without effect.
    pub fn write(&mut self, _data: &[u8]) -> Result<(), ExportError> {
        Ok(())
    }

    /// Release the engine session and key material. Idempotent; the second
    /// and later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            ctx.session.close();
            // KekKey zeroizes as ctx drops here.
            info!("export stream closed");
        }
    }
}

impl Drop for ExportStream {
    fn drop(&mut self) {
        self.close();
    }
}
