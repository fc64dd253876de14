#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use soulspace::chat::ChatCompleter;
use soulspace::conversation::ConversationMemory;
use soulspace::db;
use soulspace::embedding::{l2_normalize, EmbeddingProvider};
use soulspace::error::{ChatError, EmbeddingError};
use soulspace::knowledge::{seed::default_snippets, KnowledgeStore};
use soulspace::pipeline::ResponsePipeline;

pub const TEST_DIM: usize = 256;
pub const COLLECTION: &str = "therapy_knowledge";
pub const DEEP_BREATHING: &str =
    "Deep breathing helps reduce anxiety by activating the parasympathetic nervous system";

/// Bag-of-words embedder: every distinct lowercase word gets its own
/// dimension, so texts sharing words are closer than texts that do not.
pub struct VocabEmbedder {
    vocab: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    dimensions: usize,
}

impl Default for VocabEmbedder {
    fn default() -> Self {
        Self::with_dimensions(TEST_DIM)
    }
}

impl VocabEmbedder {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            vocab: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            dimensions,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut v = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let next = vocab.len();
            let idx = *vocab.entry(word.to_lowercase()).or_insert(next);
            v[idx % self.dimensions] += 1.0;
        }
        l2_normalize(&v)
    }
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "vocab-test"
    }
}

/// Embedding service that is always down.
pub struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Network("connection refused".into()))
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }

    fn model(&self) -> &str {
        "down"
    }
}

/// Embedder that fails its first `n` calls, then behaves like [`VocabEmbedder`].
pub struct FlakyEmbedder {
    failures_left: AtomicUsize,
    inner: VocabEmbedder,
}

impl FlakyEmbedder {
    pub fn failing(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            inner: VocabEmbedder::default(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EmbeddingError::Network("connection refused".into()));
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }

    fn model(&self) -> &str {
        "flaky"
    }
}

/// Chat completer that replays queued results, then repeats `otherwise`.
/// Every prompt it receives is recorded.
pub struct ScriptedCompleter {
    queued: Mutex<VecDeque<Result<String, ChatError>>>,
    otherwise: Result<String, ChatError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            otherwise: Ok("Let's slow down and take one breath together.".into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(VecDeque::new()),
            otherwise: Err(ChatError::Network("connection refused".into())),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompleter for ScriptedCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.queued.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.otherwise.clone())
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// A knowledge store over a fresh in-memory database.
pub fn knowledge_store(embedder: Arc<dyn EmbeddingProvider>) -> Arc<KnowledgeStore> {
    let conn = db::open_in_memory().unwrap();
    Arc::new(KnowledgeStore::open(Arc::new(Mutex::new(conn)), embedder, COLLECTION).unwrap())
}

/// A knowledge store holding the five built-in techniques.
pub async fn seeded_store() -> Arc<KnowledgeStore> {
    let store = knowledge_store(Arc::new(VocabEmbedder::default()));
    store.seed(&default_snippets()).await.unwrap();
    store
}

pub fn pipeline(
    store: Arc<KnowledgeStore>,
    completer: Arc<dyn ChatCompleter>,
) -> ResponsePipeline {
    ResponsePipeline::new(store, Arc::new(ConversationMemory::new()), completer)
}
