//! SQL DDL for SoulSpace tables.
//!
//! The fixed tables (`schema_meta`, `knowledge_log`) are created by
//! [`init_schema`]. Each knowledge collection gets a text table and a `vec0`
//! table named after it, created by [`init_collection`]. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::{Connection, OptionalExtension};

use crate::error::KnowledgeError;

/// The schema version written by this binary.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Audit log of knowledge writes
CREATE TABLE IF NOT EXISTS knowledge_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    operation TEXT NOT NULL CHECK(operation IN ('create','update','reembed')),
    snippet_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_log_snippet ON knowledge_log(collection, snippet_id);
"#;

/// Initialize the fixed tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Collection names become table names, so only plain SQL identifiers pass.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create the text and vector tables for `collection` with `dimensions`-wide
/// embeddings.
///
/// A collection created earlier with a different width is rejected: vec0
/// columns are fixed-size and every later insert would fail.
pub fn init_collection(
    conn: &Connection,
    collection: &str,
    dimensions: usize,
) -> Result<(), KnowledgeError> {
    if !is_valid_collection_name(collection) {
        return Err(KnowledgeError::InvalidCollection(collection.to_string()));
    }

    if let Some(expected) = collection_dimensions(conn, collection)? {
        if expected != dimensions {
            return Err(KnowledgeError::DimensionMismatch {
                expected,
                actual: dimensions,
            });
        }
    }

    conn.execute_batch(&format!(
        r#"
CREATE TABLE IF NOT EXISTS {collection} (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS {collection}_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[{dimensions}]
);
"#
    ))?;

    set_meta(conn, &dimensions_key(collection), &dimensions.to_string())?;
    Ok(())
}

fn dimensions_key(collection: &str) -> String {
    format!("{collection}.dimensions")
}

/// Width the collection's vector index was created with, if it exists.
pub fn collection_dimensions(
    conn: &Connection,
    collection: &str,
) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, &dimensions_key(collection))?.map(|v| v.parse().unwrap_or(0)))
}

/// Drop the collection's vector index and recreate it `dimensions` wide.
///
/// Snippet text is kept; every vector is gone until the collection is
/// re-embedded.
pub fn rebuild_vector_index(
    conn: &Connection,
    collection: &str,
    dimensions: usize,
) -> Result<(), KnowledgeError> {
    if !is_valid_collection_name(collection) {
        return Err(KnowledgeError::InvalidCollection(collection.to_string()));
    }
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {collection}_vec;"))?;
    conn.execute(
        "DELETE FROM schema_meta WHERE key = ?1",
        [dimensions_key(collection)],
    )?;
    init_collection(conn, collection, dimensions)
}

/// Whether a table (or virtual table) with this name exists.
pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(get_meta(conn, "schema_version")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Get the embedding model the stored vectors were produced with, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    set_meta(conn, "embedding_model", model)
}
