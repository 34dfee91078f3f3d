//! End-to-end tests for the export stream over the in-memory engine.
//!
//! Fixtures build a directory database the way a provisioning tool would:
//! a system row carrying the sealed key-encryption key, then a mix of user
//! and non-user object rows, each user's secrets sealed under its own
//! per-record key.

use dl_extract::cursor;
use dl_extract::error::ExportError;
use dl_extract::memory::MemoryEngine;
use dl_extract::schema::{columns, OBJECT_TABLE, SYSTEM_RECORD_KEY, USER_OBJECT_TYPE};
use dl_extract::session::EngineSession;
use dl_extract::ExportStream;
use dl_records::account::flags;
use dl_unseal::seal::{self, KEK_AAD, SECRET_AAD};
use dl_unseal::{kdf, BootSecret, KekKey};

const ALL_COLUMNS: &[&str] = &[
    columns::RECORD_ID,
    columns::PRINCIPAL_NAME,
    columns::OBJECT_TYPE,
    columns::ACCOUNT_FLAGS,
    columns::SEALED_KEK,
    columns::SEALED_PRIMARY_SECRET,
    columns::SEALED_LEGACY_SECRET,
    columns::SEALED_SECRET_HISTORY,
    columns::SECRET_SALT,
    columns::DESCRIPTION,
    columns::LAST_SECRET_CHANGE,
    columns::LOGON_COUNT,
];

const KEK_PLAIN: [u8; 32] = [0x42; 32];
const DB_SALT: [u8; 16] = [0x11; 16];
const GROUP_OBJECT_TYPE: u32 = 0x1000_0000;

fn boot() -> BootSecret {
    BootSecret([0xA5; 16])
}

fn new_database() -> MemoryEngine {
    let mut engine = MemoryEngine::new();
    engine.define_table(OBJECT_TABLE, ALL_COLUMNS);
    let wrapping = kdf::wrapping_key(&boot(), &DB_SALT).unwrap();
    let sealed_kek = seal::seal(&wrapping, &DB_SALT, &KEK_PLAIN, KEK_AAD).unwrap();
    engine.insert_row(
        OBJECT_TABLE,
        SYSTEM_RECORD_KEY,
        &[(columns::SEALED_KEK, sealed_kek)],
    );
    engine
}

fn seal_secret(record_id: u64, record_salt: Option<&[u8; 16]>, plain: &[u8]) -> Vec<u8> {
    let key = kdf::record_key(&KekKey(KEK_PLAIN), record_id, record_salt).unwrap();
    seal::seal_bytes(&key, plain, SECRET_AAD).unwrap()
}

fn base_user_cells(record_id: u64, name: &str) -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (columns::RECORD_ID, record_id.to_le_bytes().to_vec()),
        (columns::PRINCIPAL_NAME, name.as_bytes().to_vec()),
        (columns::OBJECT_TYPE, USER_OBJECT_TYPE.to_le_bytes().to_vec()),
        (columns::ACCOUNT_FLAGS, 0u32.to_le_bytes().to_vec()),
    ]
}

fn add_plain_user(engine: &mut MemoryEngine, record_id: u64, name: &str) {
    let key = format!("rec-{record_id}");
    let mut cells = base_user_cells(record_id, name);
    cells.push((
        columns::SEALED_PRIMARY_SECRET,
        seal_secret(record_id, None, &[0xCD; 16]),
    ));
    engine.insert_row(OBJECT_TABLE, key.as_bytes(), &cells);
}

fn add_group(engine: &mut MemoryEngine, record_id: u64) {
    let key = format!("rec-{record_id}");
    engine.insert_row(
        OBJECT_TABLE,
        key.as_bytes(),
        &[
            (columns::RECORD_ID, record_id.to_le_bytes().to_vec()),
            (columns::OBJECT_TYPE, GROUP_OBJECT_TYPE.to_le_bytes().to_vec()),
        ],
    );
}

fn open_stream(engine: MemoryEngine) -> (ExportStream, tempfile::NamedTempFile) {
    let file = tempfile::NamedTempFile::new().unwrap();
    let stream = ExportStream::open(Box::new(engine), file.path(), &boot()).unwrap();
    (stream, file)
}

// ─── Setup failures ─────────────────────────────────────────────────────────

#[test]
fn missing_database_file_is_not_found() {
    let engine = new_database();
    let result = ExportStream::open(
        Box::new(engine),
        std::path::Path::new("/nonexistent/directory.db"),
        &boot(),
    );
    assert!(matches!(result, Err(ExportError::NotFound(_))));
}

#[test]
fn missing_required_column_is_schema_mismatch() {
    let mut engine = MemoryEngine::new();
    // Catalog without the sealed-KEK column: an unsupported format version.
    engine.define_table(
        OBJECT_TABLE,
        &[
            columns::RECORD_ID,
            columns::PRINCIPAL_NAME,
            columns::OBJECT_TYPE,
            columns::ACCOUNT_FLAGS,
        ],
    );
    let file = tempfile::NamedTempFile::new().unwrap();
    let result = ExportStream::open(Box::new(engine), file.path(), &boot());
    match result {
        Err(ExportError::SchemaMismatch { column }) => {
            assert_eq!(column, columns::SEALED_KEK);
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn empty_table_has_no_sealed_kek_row() {
    let mut engine = MemoryEngine::new();
    engine.define_table(OBJECT_TABLE, ALL_COLUMNS);
    let file = tempfile::NamedTempFile::new().unwrap();
    let result = ExportStream::open(Box::new(engine), file.path(), &boot());
    assert!(matches!(result, Err(ExportError::PekNotFound)));
}

#[test]
fn wrong_boot_secret_is_key_decrypt_and_yields_no_records() {
    let mut engine = new_database();
    add_plain_user(&mut engine, 2, "alice");
    let file = tempfile::NamedTempFile::new().unwrap();
    let result = ExportStream::open(Box::new(engine), file.path(), &BootSecret([0xFF; 16]));
    assert!(matches!(result, Err(ExportError::KeyDecrypt(_))));
}

#[test]
fn seek_first_on_empty_table_is_cursor_seek() {
    let mut engine = MemoryEngine::new();
    engine.define_table(OBJECT_TABLE, ALL_COLUMNS);
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut session = EngineSession::open(Box::new(engine), file.path()).unwrap();
    assert!(matches!(
        cursor::seek_first(&mut session),
        Err(ExportError::CursorSeek)
    ));
    session.close();
}

// ─── Batch semantics ────────────────────────────────────────────────────────

#[test]
fn zero_qualifying_rows_is_an_empty_ended_batch() {
    let engine = new_database();
    let (mut stream, _file) = open_stream(engine);

    assert!(!stream.eof().unwrap());
    let batch = stream.read(20).unwrap();
    assert!(batch.records.is_empty());
    assert!(batch.reached_end);
    assert!(stream.eof().unwrap());
}

#[test]
fn single_row_fits_in_one_batch() {
    let mut engine = new_database();
    add_plain_user(&mut engine, 2, "alice");
    let (mut stream, _file) = open_stream(engine);

    let batch = stream.read(20).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert!(batch.reached_end);
    assert_eq!(batch.records[0].principal_name, "alice");
    assert!(stream.eof().unwrap());
}

#[test]
fn forty_five_rows_paginate_as_twenty_twenty_five() {
    let mut engine = new_database();
    for id in 0..45u64 {
        add_plain_user(&mut engine, 100 + id, &format!("user-{id:02}"));
    }
    let (mut stream, _file) = open_stream(engine);

    let first = stream.read(20).unwrap();
    assert_eq!(first.records.len(), 20);
    assert!(!first.reached_end);
    assert!(!stream.eof().unwrap());

    let second = stream.read(20).unwrap();
    assert_eq!(second.records.len(), 20);
    assert!(!second.reached_end);

    let third = stream.read(20).unwrap();
    assert_eq!(third.records.len(), 5);
    assert!(third.reached_end);
    assert!(stream.eof().unwrap());

    // Natural forward order, no duplicates, nothing lost.
    let names: Vec<_> = first
        .records
        .iter()
        .chain(&second.records)
        .chain(&third.records)
        .map(|r| r.principal_name.clone())
        .collect();
    let expected: Vec<_> = (0..45).map(|id| format!("user-{id:02}")).collect();
    assert_eq!(names, expected);
}

#[test]
fn read_never_exceeds_batch_limit() {
    let mut engine = new_database();
    for id in 0..5u64 {
        add_plain_user(&mut engine, 10 + id, &format!("u{id}"));
    }
    let (mut stream, _file) = open_stream(engine);

    let batch = stream.read(3).unwrap();
    assert_eq!(batch.records.len(), 3);
    assert!(!batch.reached_end);
    let rest = stream.read(3).unwrap();
    assert_eq!(rest.records.len(), 2);
    assert!(rest.reached_end);
}

#[test]
fn non_qualifying_rows_are_skipped_and_do_not_consume_quota() {
    let mut engine = new_database();
    add_group(&mut engine, 50);
    add_plain_user(&mut engine, 51, "alice");
    add_group(&mut engine, 52);
    add_group(&mut engine, 53);
    add_plain_user(&mut engine, 54, "bob");
    add_group(&mut engine, 55);
    let (mut stream, _file) = open_stream(engine);

    let batch = stream.read(2).unwrap();
    let names: Vec<_> = batch.records.iter().map(|r| r.principal_name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
    // The trailing group row is all that remains; the next read finds nothing.
    let last = stream.read(2).unwrap();
    assert!(last.records.is_empty());
    assert!(last.reached_end);
}

// ─── Record contents ────────────────────────────────────────────────────────

#[test]
fn identity_and_secret_fields_are_decoded() {
    let mut engine = new_database();
    let record_id = 7u64;
    let record_salt = [0x77u8; 16];
    let history: Vec<u8> = [[0xAA; 16], [0xBB; 16]].concat();

    let mut cells = base_user_cells(record_id, "carol");
    cells.retain(|(name, _)| *name != columns::ACCOUNT_FLAGS);
    cells.push((
        columns::ACCOUNT_FLAGS,
        (flags::DISABLED | flags::NO_SECRET_EXPIRY).to_le_bytes().to_vec(),
    ));
    cells.push((columns::DESCRIPTION, b"build agent".to_vec()));
    cells.push((columns::LAST_SECRET_CHANGE, 1_700_000_000i64.to_le_bytes().to_vec()));
    cells.push((columns::LOGON_COUNT, 41u32.to_le_bytes().to_vec()));
    cells.push((columns::SECRET_SALT, record_salt.to_vec()));
    cells.push((
        columns::SEALED_PRIMARY_SECRET,
        seal_secret(record_id, Some(&record_salt), &[0x01; 16]),
    ));
    cells.push((
        columns::SEALED_LEGACY_SECRET,
        seal_secret(record_id, Some(&record_salt), &[0x02; 16]),
    ));
    cells.push((
        columns::SEALED_SECRET_HISTORY,
        seal_secret(record_id, Some(&record_salt), &history),
    ));
    engine.insert_row(OBJECT_TABLE, b"rec-7", &cells);

    let (mut stream, _file) = open_stream(engine);
    let batch = stream.read(20).unwrap();
    assert_eq!(batch.records.len(), 1);

    let record = &batch.records[0];
    assert_eq!(record.record_id, 7);
    assert_eq!(record.principal_name, "carol");
    assert_eq!(record.description.as_deref(), Some("build agent"));
    assert!(record.disabled);
    assert!(!record.locked_out);
    assert!(record.no_secret_expiry);
    assert_eq!(record.logon_count, Some(41));
    assert_eq!(
        record.last_secret_change.map(|t| t.timestamp()),
        Some(1_700_000_000)
    );
    assert_eq!(record.primary_secret.as_deref(), Some("01".repeat(16).as_str()));
    assert_eq!(record.legacy_secret.as_deref(), Some("02".repeat(16).as_str()));
    assert_eq!(
        record.secret_history,
        Some(vec!["aa".repeat(16), "bb".repeat(16)])
    );
}

#[test]
fn older_format_without_optional_columns_still_exports() {
    // Catalog predating the per-record salt, description, timestamp and
    // logon-count columns. Resolution tolerates their absence and records
    // decode with those fields absent.
    let mut engine = MemoryEngine::new();
    engine.define_table(
        OBJECT_TABLE,
        &[
            columns::RECORD_ID,
            columns::PRINCIPAL_NAME,
            columns::OBJECT_TYPE,
            columns::ACCOUNT_FLAGS,
            columns::SEALED_KEK,
            columns::SEALED_PRIMARY_SECRET,
            columns::SEALED_LEGACY_SECRET,
            columns::SEALED_SECRET_HISTORY,
        ],
    );
    let wrapping = kdf::wrapping_key(&boot(), &DB_SALT).unwrap();
    let sealed_kek = seal::seal(&wrapping, &DB_SALT, &KEK_PLAIN, KEK_AAD).unwrap();
    engine.insert_row(
        OBJECT_TABLE,
        SYSTEM_RECORD_KEY,
        &[(columns::SEALED_KEK, sealed_kek)],
    );
    let mut cells = base_user_cells(9, "frank");
    cells.push((
        columns::SEALED_PRIMARY_SECRET,
        seal_secret(9, None, &[0x09; 16]),
    ));
    engine.insert_row(OBJECT_TABLE, b"rec-9", &cells);

    let (mut stream, _file) = open_stream(engine);
    let batch = stream.read(20).unwrap();
    assert_eq!(batch.records.len(), 1);

    let record = &batch.records[0];
    assert_eq!(record.principal_name, "frank");
    assert_eq!(record.description, None);
    assert_eq!(record.last_secret_change, None);
    assert_eq!(record.logon_count, None);
    assert_eq!(record.primary_secret.as_deref(), Some("09".repeat(16).as_str()));
}

#[test]
fn null_secret_cells_are_absent_not_errors() {
    let mut engine = new_database();
    // No sealed cells at all.
    engine.insert_row(OBJECT_TABLE, b"rec-3", &base_user_cells(3, "dave"));
    // Primary present, legacy and history null.
    let mut cells = base_user_cells(4, "erin");
    cells.push((
        columns::SEALED_PRIMARY_SECRET,
        seal_secret(4, None, &[0x0E; 16]),
    ));
    engine.insert_row(OBJECT_TABLE, b"rec-4", &cells);

    let (mut stream, _file) = open_stream(engine);
    let batch = stream.read(20).unwrap();
    assert_eq!(batch.records.len(), 2);

    assert_eq!(batch.records[0].primary_secret, None);
    assert_eq!(batch.records[0].legacy_secret, None);
    assert_eq!(batch.records[0].secret_history, None);

    assert_eq!(
        batch.records[1].primary_secret.as_deref(),
        Some("0e".repeat(16).as_str())
    );
    assert_eq!(batch.records[1].legacy_secret, None);
}

// ─── Mid-stream failure policy ──────────────────────────────────────────────

fn add_corrupt_user(engine: &mut MemoryEngine, record_id: u64, name: &str) {
    let key = format!("rec-{record_id}");
    let mut cells = base_user_cells(record_id, name);
    // Sealed cell of plausible size whose tag can never verify.
    cells.push((columns::SEALED_PRIMARY_SECRET, vec![0u8; 64]));
    engine.insert_row(OBJECT_TABLE, key.as_bytes(), &cells);
}

#[test]
fn corrupt_first_record_fails_the_call_and_preserves_state() {
    let mut engine = new_database();
    add_corrupt_user(&mut engine, 2, "mallory");
    add_plain_user(&mut engine, 3, "alice");
    let (mut stream, _file) = open_stream(engine);

    match stream.read(20) {
        Err(ExportError::RecordDecode { record_id, .. }) => assert_eq!(record_id, 2),
        other => panic!("expected RecordDecode, got {other:?}"),
    }
    // No transition happened: not at end, and a retry hits the same record.
    assert!(!stream.eof().unwrap());
    assert!(matches!(
        stream.read(20),
        Err(ExportError::RecordDecode { record_id: 2, .. })
    ));
}

#[test]
fn corrupt_later_record_is_absorbed_into_end_of_data() {
    let mut engine = new_database();
    add_plain_user(&mut engine, 2, "alice");
    add_corrupt_user(&mut engine, 3, "mallory");
    add_plain_user(&mut engine, 4, "bob");
    let (mut stream, _file) = open_stream(engine);

    let batch = stream.read(20).unwrap();
    let names: Vec<_> = batch.records.iter().map(|r| r.principal_name.as_str()).collect();
    assert_eq!(names, vec!["alice"]);
    assert!(batch.reached_end);
    assert!(stream.eof().unwrap());

    // Already-returned records are not disturbed; nothing further comes out.
    let next = stream.read(20).unwrap();
    assert!(next.records.is_empty());
    assert!(next.reached_end);
}

// ─── Channel surface ────────────────────────────────────────────────────────

#[test]
fn write_is_a_successful_no_op() {
    let mut engine = new_database();
    add_plain_user(&mut engine, 2, "alice");
    let (mut stream, _file) = open_stream(engine);

    stream.write(b"ignored").unwrap();
    let batch = stream.read(20).unwrap();
    assert_eq!(batch.records.len(), 1);
}

#[test]
fn close_is_idempotent_and_fails_later_calls() {
    let mut engine = new_database();
    add_plain_user(&mut engine, 2, "alice");
    let (mut stream, _file) = open_stream(engine);

    stream.close();
    assert!(matches!(stream.read(20), Err(ExportError::StreamClosed)));
    assert!(matches!(stream.eof(), Err(ExportError::StreamClosed)));
    stream.close(); // second close is a no-op
    assert!(matches!(stream.read(20), Err(ExportError::StreamClosed)));
}

#[test]
fn batch_limit_zero_returns_nothing_and_changes_nothing() {
    let mut engine = new_database();
    add_plain_user(&mut engine, 2, "alice");
    let (mut stream, _file) = open_stream(engine);

    let empty = stream.read(0).unwrap();
    assert!(empty.records.is_empty());
    assert!(!empty.reached_end);

    let batch = stream.read(20).unwrap();
    assert_eq!(batch.records.len(), 1);
}
