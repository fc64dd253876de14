//! Snippet storage and similarity retrieval.
//!
//! [`KnowledgeStore`] pairs an [`EmbeddingProvider`] with a sqlite-vec
//! collection. Embedding calls are async; SQLite work runs on the blocking
//! pool behind the shared connection mutex.

pub mod seed;
pub mod store;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::schema;
use crate::embedding::EmbeddingProvider;
use crate::error::KnowledgeError;
use store::UpsertOutcome;

/// A short text stored for similarity retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub id: String,
    pub text: String,
}

/// A search hit with its vector distance (lower is closer).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSnippet {
    pub id: String,
    pub text: String,
    pub distance: f64,
}

/// Counts from a [`KnowledgeStore::seed`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

pub struct KnowledgeStore {
    db: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
}

impl KnowledgeStore {
    /// Bind to `collection`, creating its tables sized for `embedder`.
    pub fn open(
        db: Arc<Mutex<Connection>>,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
    ) -> Result<Self, KnowledgeError> {
        let collection = collection.into();
        {
            let conn = db.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
            schema::init_collection(&conn, &collection, embedder.dimensions())?;
        }
        Ok(Self {
            db,
            embedder,
            collection,
        })
    }

    /// Like [`open`](Self::open), but a vector index of another width is
    /// rebuilt for `embedder` instead of rejected. Follow with
    /// [`re_embed`](Self::re_embed) to restore the vectors.
    pub fn open_resizing(
        db: Arc<Mutex<Connection>>,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
    ) -> Result<Self, KnowledgeError> {
        let collection = collection.into();
        {
            let conn = db.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
            let wanted = embedder.dimensions();
            match schema::collection_dimensions(&conn, &collection)? {
                Some(stored) if stored != wanted => {
                    tracing::warn!(
                        collection = %collection,
                        stored,
                        wanted,
                        "embedding width changed, rebuilding vector index"
                    );
                    schema::rebuild_vector_index(&conn, &collection, wanted)?;
                }
                _ => {}
            }
        }
        Self::open(db, embedder, collection)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, KnowledgeError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T, KnowledgeError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let collection = self.collection.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
            f(&mut conn, &collection)
        })
        .await
        .map_err(|e| KnowledgeError::Task(e.to_string()))?
    }

    async fn embed_checked(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        let vectors = self.embedder.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(KnowledgeError::BatchMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        let expected = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(KnowledgeError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }

    /// Insert-or-update snippets by id.
    ///
    /// Only new or changed snippets are embedded, so reseeding an unchanged
    /// collection makes no embedding calls and writes nothing.
    pub async fn seed(&self, snippets: &[KnowledgeSnippet]) -> Result<SeedReport, KnowledgeError> {
        let candidates = snippets.to_vec();
        let pending: Vec<KnowledgeSnippet> = self
            .with_conn(move |conn, collection| {
                let mut pending = Vec::new();
                for snippet in candidates {
                    let current = store::existing_content(conn, collection, &snippet.id)?;
                    if current.as_deref() != Some(snippet.text.as_str()) {
                        pending.push(snippet);
                    }
                }
                Ok(pending)
            })
            .await?;

        let mut report = SeedReport {
            unchanged: snippets.len() - pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            tracing::debug!(collection = %self.collection, "knowledge already seeded");
            return Ok(report);
        }

        let texts: Vec<&str> = pending.iter().map(|s| s.text.as_str()).collect();
        let vectors = self.embed_checked(&texts).await?;
        let batch: Vec<(KnowledgeSnippet, Vec<f32>)> = pending.into_iter().zip(vectors).collect();
        let model = self.embedder.model().to_string();

        let outcomes = self
            .with_conn(move |conn, collection| {
                let outcomes = store::upsert_snippets(conn, collection, &batch)?;
                schema::set_embedding_model(conn, &model)?;
                Ok(outcomes)
            })
            .await?;

        for outcome in outcomes {
            match outcome {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
        }

        tracing::info!(
            collection = %self.collection,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            "knowledge seeded"
        );
        Ok(report)
    }

    /// The `k` snippets nearest to `query`, nearest first, with distances.
    pub async fn search_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredSnippet>, KnowledgeError> {
        if k == 0 {
            return Err(KnowledgeError::InvalidK);
        }
        let mut vectors = self.embed_checked(&[query]).await?;
        let embedding = vectors.remove(0);

        self.with_conn(move |conn, collection| store::knn_search(conn, collection, &embedding, k))
            .await
    }

    /// Texts of the `k` snippets nearest to `query`, nearest first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, KnowledgeError> {
        let hits = self.search_scored(query, k).await?;
        Ok(hits.into_iter().map(|hit| hit.text).collect())
    }

    pub async fn snippets(&self) -> Result<Vec<KnowledgeSnippet>, KnowledgeError> {
        self.with_conn(|conn, collection| store::list_snippets(conn, collection))
            .await
    }

    pub async fn len(&self) -> Result<usize, KnowledgeError> {
        self.with_conn(|conn, collection| store::count_snippets(conn, collection))
            .await
    }

    pub async fn is_empty(&self) -> Result<bool, KnowledgeError> {
        Ok(self.len().await? == 0)
    }

    /// Recompute every vector with the current embedding model, `batch_size`
    /// snippets at a time. `on_batch` receives the number of snippets finished
    /// in each batch.
    pub async fn re_embed(
        &self,
        batch_size: usize,
        mut on_batch: impl FnMut(usize),
    ) -> Result<usize, KnowledgeError> {
        let snippets = self.snippets().await?;

        for chunk in snippets.chunks(batch_size.max(1)) {
            let texts: Vec<&str> = chunk.iter().map(|s| s.text.as_str()).collect();
            let vectors = self.embed_checked(&texts).await?;
            let ids: Vec<String> = chunk.iter().map(|s| s.id.clone()).collect();

            self.with_conn(move |conn, collection| {
                let tx = conn.transaction()?;
                for (id, embedding) in ids.iter().zip(vectors.iter()) {
                    store::replace_vector(&tx, collection, id, embedding)?;
                    store::write_audit_log(&tx, collection, "reembed", id)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

            on_batch(chunk.len());
        }

        let model = self.embedder.model().to_string();
        self.with_conn(move |conn, _| Ok(schema::set_embedding_model(conn, &model)?))
            .await?;

        tracing::info!(collection = %self.collection, count = snippets.len(), "re-embedded knowledge");
        Ok(snippets.len())
    }
}
