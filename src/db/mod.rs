pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the knowledge database at the given path, with sqlite-vec
/// loaded and the fixed schema initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with the fixed schema, for tests.
pub fn open_in_memory() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    Ok(conn)
}

/// Snapshot of database health used by `soulspace doctor`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub snippet_count: usize,
    pub vector_count: usize,
    pub log_count: usize,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run integrity and row-count checks against `collection`.
///
/// A collection that was never created reports zero rows rather than failing.
pub fn check_database_health(conn: &Connection, collection: &str) -> Result<HealthReport> {
    let schema_version = schema::get_schema_version(conn)?;
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let embedding_model = schema::get_embedding_model(conn)?;

    let count = |table: &str| -> Result<usize> {
        if !schema::is_valid_collection_name(table) || !schema::table_exists(conn, table)? {
            return Ok(0);
        }
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        Ok(n as usize)
    };

    let snippet_count = count(collection)?;
    let vector_count = count(&format!("{collection}_vec"))?;
    let log_count = count("knowledge_log")?;

    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;
    let integrity_ok = integrity_details == "ok";

    Ok(HealthReport {
        schema_version,
        sqlite_vec_version,
        embedding_model,
        snippet_count,
        vector_count,
        log_count,
        integrity_ok,
        integrity_details,
    })
}
