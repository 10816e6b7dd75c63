use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Per-connection settings. Safe to run on every open.
pub fn configure_connection(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    configure_connection(conn)?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// Terms are stored as MessagePack so that equality on the column is
// equality on the term, literal datatype and language included.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS quads (
    rowid INTEGER PRIMARY KEY,
    subject BLOB NOT NULL,
    predicate TEXT NOT NULL,
    object BLOB NOT NULL,
    context TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_quads_spoc ON quads (subject, predicate, object, context);
CREATE INDEX IF NOT EXISTS idx_quads_context ON quads (context);
CREATE INDEX IF NOT EXISTS idx_quads_pos ON quads (predicate, object);
CREATE INDEX IF NOT EXISTS idx_quads_object ON quads (object);
";
