//! Synchronous SQL for a knowledge collection.
//!
//! Text lives in the `<collection>` table, vectors in `<collection>_vec`, and
//! every write is recorded in `knowledge_log`. Callers are expected to have
//! validated the collection name via [`crate::db::schema::init_collection`].

use rusqlite::{params, Connection, OptionalExtension};

use super::{KnowledgeSnippet, ScoredSnippet};
use crate::embedding::embedding_to_bytes;
use crate::error::KnowledgeError;

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Stored text for `id`, if the snippet exists.
pub fn existing_content(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<String>, KnowledgeError> {
    let content = conn
        .query_row(
            &format!("SELECT content FROM {collection} WHERE id = ?1"),
            params![id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(content)
}

/// Upsert snippets and their vectors in one transaction, returning per-snippet
/// outcomes. Identical text is left alone so reseeding never rewrites rows.
pub fn upsert_snippets(
    conn: &mut Connection,
    collection: &str,
    snippets: &[(KnowledgeSnippet, Vec<f32>)],
) -> Result<Vec<UpsertOutcome>, KnowledgeError> {
    let tx = conn.transaction()?;
    let mut outcomes = Vec::with_capacity(snippets.len());
    for (snippet, embedding) in snippets {
        outcomes.push(upsert_in(&tx, collection, snippet, embedding)?);
    }
    tx.commit()?;
    Ok(outcomes)
}

fn upsert_in(
    conn: &Connection,
    collection: &str,
    snippet: &KnowledgeSnippet,
    embedding: &[f32],
) -> Result<UpsertOutcome, KnowledgeError> {
    let now = chrono::Utc::now().to_rfc3339();

    let outcome = match existing_content(conn, collection, &snippet.id)? {
        Some(content) if content == snippet.text => return Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            conn.execute(
                &format!("UPDATE {collection} SET content = ?1, updated_at = ?2 WHERE id = ?3"),
                params![snippet.text, now, snippet.id],
            )?;
            UpsertOutcome::Updated
        }
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO {collection} (id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)"
                ),
                params![snippet.id, snippet.text, now],
            )?;
            UpsertOutcome::Created
        }
    };

    // vec0 has no upsert: drop any old vector first.
    replace_vector(conn, collection, &snippet.id, embedding)?;

    let operation = match outcome {
        UpsertOutcome::Created => "create",
        _ => "update",
    };
    write_audit_log(conn, collection, operation, &snippet.id)?;

    Ok(outcome)
}

/// Swap the stored vector for `id`.
pub fn replace_vector(
    conn: &Connection,
    collection: &str,
    id: &str,
    embedding: &[f32],
) -> Result<(), KnowledgeError> {
    conn.execute(
        &format!("DELETE FROM {collection}_vec WHERE id = ?1"),
        params![id],
    )?;
    conn.execute(
        &format!("INSERT INTO {collection}_vec (id, embedding) VALUES (?1, ?2)"),
        params![id, embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

/// K-nearest-neighbor search, nearest first.
pub fn knn_search(
    conn: &Connection,
    collection: &str,
    embedding: &[f32],
    k: usize,
) -> Result<Vec<ScoredSnippet>, KnowledgeError> {
    let total = count_snippets(conn, collection)?;
    let k = k.min(total);
    if k == 0 {
        return Ok(vec![]);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT id, distance FROM {collection}_vec WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance"
    ))?;
    let neighbors: Vec<(String, f64)> = stmt
        .query_map(params![embedding_to_bytes(embedding), k as i64], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::with_capacity(neighbors.len());
    for (id, distance) in neighbors {
        // A vector without a text row would be an orphan from a crashed write.
        if let Some(text) = existing_content(conn, collection, &id)? {
            results.push(ScoredSnippet { id, text, distance });
        }
    }
    Ok(results)
}

/// All snippets in id order.
pub fn list_snippets(
    conn: &Connection,
    collection: &str,
) -> Result<Vec<KnowledgeSnippet>, KnowledgeError> {
    let mut stmt = conn.prepare(&format!("SELECT id, content FROM {collection} ORDER BY id"))?;
    let snippets = stmt
        .query_map([], |row| {
            Ok(KnowledgeSnippet {
                id: row.get(0)?,
                text: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(snippets)
}

pub fn count_snippets(conn: &Connection, collection: &str) -> Result<usize, KnowledgeError> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {collection}"), [], |row| {
        row.get(0)
    })?;
    Ok(n as usize)
}

/// Write an entry to the knowledge_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    collection: &str,
    operation: &str,
    snippet_id: &str,
) -> Result<(), KnowledgeError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO knowledge_log (collection, operation, snippet_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![collection, operation, snippet_id, now],
    )?;
    Ok(())
}
