//! Error types for SoulSpace.
//!
//! Each external collaborator gets its own error enum. [`PipelineError`] groups
//! them into the three failure classes the response pipeline degrades on.

use thiserror::Error;

/// Failure talking to the embedding service.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Network(String),

    #[error("embedding request timed out: {0}")]
    Timeout(String),

    #[error("embedding service returned {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Failure talking to the chat-completion service.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Network(String),

    #[error("chat request timed out: {0}")]
    Timeout(String),

    #[error("chat service returned {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("malformed chat response: {0}")]
    MalformedResponse(String),
}

/// Failure in the knowledge store (embedding or vector index).
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("embedding has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding service returned {actual} vectors for {expected} texts")]
    BatchMismatch { expected: usize, actual: usize },

    #[error("k must be at least 1")]
    InvalidK,

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Failure reading or writing the in-process conversation memory.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("conversation memory lock poisoned")]
    Poisoned,
}

/// Why a pipeline call fell back instead of answering.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(#[source] KnowledgeError),

    #[error("model unavailable: {0}")]
    ModelUnavailable(#[source] ChatError),

    #[error("memory read failure: {0}")]
    MemoryReadFailure(#[source] MemoryError),

    #[error("user input must not be empty")]
    EmptyInput,
}

/// Coarse failure class, cheap to copy into a degraded reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RetrievalUnavailable,
    ModelUnavailable,
    MemoryReadFailure,
    EmptyInput,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RetrievalUnavailable(_) => FailureKind::RetrievalUnavailable,
            Self::ModelUnavailable(_) => FailureKind::ModelUnavailable,
            Self::MemoryReadFailure(_) => FailureKind::MemoryReadFailure,
            Self::EmptyInput => FailureKind::EmptyInput,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RetrievalUnavailable => "retrieval_unavailable",
            Self::ModelUnavailable => "model_unavailable",
            Self::MemoryReadFailure => "memory_read_failure",
            Self::EmptyInput => "empty_input",
        })
    }
}
