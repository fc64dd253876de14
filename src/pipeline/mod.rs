//! The single-turn response pipeline.
//!
//! retrieve snippets → snapshot history → build prompt → call the model →
//! record the turn → add the empathy prefix.
//!
//! [`ResponsePipeline::try_respond`] reports failures as [`PipelineError`];
//! [`ResponsePipeline::respond`] substitutes the fallback text and tags the
//! reply as [`Reply::Degraded`]. Nothing is retried.

pub mod prompt;

use std::sync::Arc;

use tracing::Instrument;

use crate::chat::ChatCompleter;
use crate::conversation::{ConversationMemory, ConversationTurn};
use crate::empathy::EmpathyPrefixer;
use crate::error::{FailureKind, PipelineError};
use crate::knowledge::KnowledgeStore;

/// Sent (with an empathy prefix) whenever the pipeline cannot answer.
pub const FALLBACK_TEXT: &str = "Let me think differently about that...";

/// Snippets retrieved per request.
pub const DEFAULT_TOP_K: usize = 3;

/// Outcome of [`ResponsePipeline::respond`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answered { text: String },
    Degraded { text: String, failure: FailureKind },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Self::Answered { text } | Self::Degraded { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Answered { text } | Self::Degraded { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Answered { .. } => None,
            Self::Degraded { failure, .. } => Some(*failure),
        }
    }
}

pub struct ResponsePipeline {
    knowledge: Arc<KnowledgeStore>,
    memory: Arc<ConversationMemory>,
    completer: Arc<dyn ChatCompleter>,
    empathy: EmpathyPrefixer,
    top_k: usize,
}

impl ResponsePipeline {
    pub fn new(
        knowledge: Arc<KnowledgeStore>,
        memory: Arc<ConversationMemory>,
        completer: Arc<dyn ChatCompleter>,
    ) -> Self {
        Self {
            knowledge,
            memory,
            completer,
            empathy: EmpathyPrefixer,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the number of snippets retrieved per request (minimum 1).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.knowledge
    }

    /// Answer `user_input`, degrading to the fallback text on any failure.
    pub async fn respond(&self, user_input: &str) -> Reply {
        let request_id = uuid::Uuid::now_v7();
        let span = tracing::info_span!("respond", %request_id);

        async {
            match self.try_respond(user_input).await {
                Ok(text) => Reply::Answered { text },
                Err(err) => {
                    tracing::warn!(error = %err, failure = %err.kind(), "responding with fallback");
                    Reply::Degraded {
                        text: self.empathy.apply(FALLBACK_TEXT),
                        failure: err.kind(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline, surfacing the first failure instead of falling back.
    ///
    /// On success memory has grown by exactly one turn (unless a clear raced
    /// this call, in which case the turn is dropped); on failure it is unchanged.
    pub async fn try_respond(&self, user_input: &str) -> Result<String, PipelineError> {
        if user_input.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let knowledge = self
            .knowledge
            .search(user_input, self.top_k)
            .await
            .map_err(PipelineError::RetrievalUnavailable)?;
        tracing::debug!(snippets = knowledge.len(), "retrieved knowledge");

        let snapshot = self
            .memory
            .snapshot()
            .map_err(PipelineError::MemoryReadFailure)?;

        let prompt = prompt::build_prompt(&snapshot.turns, &knowledge, user_input);

        let raw = self
            .completer
            .complete(&prompt)
            .await
            .map_err(PipelineError::ModelUnavailable)?;

        let kept = self
            .memory
            .append_in_epoch(snapshot.epoch, ConversationTurn::new(user_input, raw.clone()))
            .map_err(PipelineError::MemoryReadFailure)?;
        if !kept {
            tracing::info!("memory cleared mid-request, turn not recorded");
        }

        tracing::info!(
            model = %self.completer.model(),
            history_turns = snapshot.turns.len(),
            reply_len = raw.len(),
            "response generated"
        );

        Ok(self.empathy.apply(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::embedding::EmbeddingProvider;
    use crate::empathy::has_empathy_prefix;
    use crate::error::{ChatError, EmbeddingError};

    struct FlatEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FlatEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model(&self) -> &str {
            "flat"
        }
    }

    #[derive(Default)]
    struct CountingCompleter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatCompleter for CountingCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Let's take one slow breath.".into())
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    fn empty_store() -> Arc<KnowledgeStore> {
        let conn = crate::db::open_in_memory().unwrap();
        Arc::new(
            KnowledgeStore::open(Arc::new(Mutex::new(conn)), Arc::new(FlatEmbedder), "notes")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn poisoned_memory_falls_back_before_the_model() {
        let memory = Arc::new(ConversationMemory::new());
        memory.poison();
        let completer = Arc::new(CountingCompleter::default());
        let pipeline = ResponsePipeline::new(empty_store(), memory.clone(), completer.clone());

        let reply = pipeline.respond("I feel anxious").await;

        assert_eq!(reply.failure(), Some(FailureKind::MemoryReadFailure));
        assert!(has_empathy_prefix(reply.text()));
        assert!(reply.text().ends_with(FALLBACK_TEXT));
        assert_eq!(completer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn answers_without_any_knowledge() {
        let completer = Arc::new(CountingCompleter::default());
        let pipeline = ResponsePipeline::new(
            empty_store(),
            Arc::new(ConversationMemory::new()),
            completer.clone(),
        )
        .with_top_k(0);

        let reply = pipeline.respond("hello").await;

        assert!(!reply.is_degraded());
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.memory().len().unwrap(), 1);
    }
}
