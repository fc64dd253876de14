mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use helpers::{knowledge_store, pipeline, seeded_store, DownEmbedder, ScriptedCompleter};
use soulspace::chat::ChatCompleter;
use soulspace::conversation::ConversationMemory;
use soulspace::empathy::has_empathy_prefix;
use soulspace::error::{ChatError, FailureKind};
use soulspace::pipeline::{ResponsePipeline, FALLBACK_TEXT};

#[tokio::test]
async fn answer_is_prefixed_and_recorded() {
    let completer = ScriptedCompleter::replying(&["Try breathing in for four counts."]);
    let pipeline = pipeline(seeded_store().await, completer.clone());

    let reply = pipeline.respond("I feel anxious").await;

    assert!(!reply.is_degraded());
    assert!(has_empathy_prefix(reply.text()));
    assert!(reply.text().ends_with(". Try breathing in for four counts."));
    assert_eq!(pipeline.memory().len().unwrap(), 1);

    let turn = &pipeline.memory().snapshot().unwrap().turns[0];
    assert_eq!(turn.user_input, "I feel anxious");
    assert_eq!(turn.model_output, "Try breathing in for four counts.");
}

#[tokio::test]
async fn prompt_carries_three_snippets_and_input() {
    let completer = ScriptedCompleter::replying(&["ok"]);
    let pipeline = pipeline(seeded_store().await, completer.clone());
    pipeline.respond("anxiety keeps me up").await;

    let prompt = &completer.prompts()[0];
    let knowledge = prompt
        .split("Therapeutic knowledge:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nClient: ").next())
        .unwrap();
    assert_eq!(knowledge.lines().count(), 3);
    assert_eq!(knowledge.lines().next(), Some(helpers::DEEP_BREATHING));
    assert!(prompt.contains("\n\nClient: anxiety keeps me up\n\nRespond with:\n"));
}

#[tokio::test]
async fn model_outage_falls_back_without_growing_memory() {
    let pipeline = pipeline(seeded_store().await, ScriptedCompleter::down());

    let reply = pipeline.respond("I feel anxious").await;

    assert_eq!(reply.failure(), Some(FailureKind::ModelUnavailable));
    assert!(has_empathy_prefix(reply.text()));
    assert!(reply.text().ends_with(FALLBACK_TEXT));
    assert_eq!(pipeline.memory().len().unwrap(), 0);
}

#[tokio::test]
async fn failure_after_success_keeps_prior_turns() {
    let completer = ScriptedCompleter::replying(&["first"]);
    let memory = Arc::new(ConversationMemory::new());
    let store = seeded_store().await;
    let ok = ResponsePipeline::new(store.clone(), memory.clone(), completer);
    let down = ResponsePipeline::new(store, memory.clone(), ScriptedCompleter::down());

    assert!(!ok.respond("hello").await.is_degraded());
    assert!(down.respond("hello again").await.is_degraded());
    assert_eq!(memory.len().unwrap(), 1);
}

#[tokio::test]
async fn retrieval_outage_aborts_before_the_model() {
    let completer = ScriptedCompleter::replying(&["never sent"]);
    let pipeline = pipeline(knowledge_store(Arc::new(DownEmbedder)), completer.clone());

    let reply = pipeline.respond("I feel anxious").await;

    assert_eq!(reply.failure(), Some(FailureKind::RetrievalUnavailable));
    assert!(reply.text().ends_with(FALLBACK_TEXT));
    assert!(completer.prompts().is_empty());
    assert!(pipeline.memory().is_empty().unwrap());
}

#[tokio::test]
async fn history_reaches_the_next_prompt() {
    let completer = ScriptedCompleter::replying(&["I'm sorry you feel sad.", "Try a short walk."]);
    let pipeline = pipeline(seeded_store().await, completer.clone());

    pipeline.respond("I feel sad").await;
    pipeline.respond("Any tips?").await;

    let prompts = completer.prompts();
    assert_eq!(prompts.len(), 2);

    let history = |prompt: &str| -> String {
        prompt
            .strip_prefix("Previous conversation:\n")
            .and_then(|rest| rest.split("\n\nTherapeutic knowledge:").next())
            .unwrap()
            .to_string()
    };
    assert_eq!(history(&prompts[0]), "");
    assert_eq!(
        history(&prompts[1]),
        "Client: I feel sad | Therapist: I'm sorry you feel sad."
    );
    assert_eq!(pipeline.memory().len().unwrap(), 2);
}

#[tokio::test]
async fn clear_resets_history_for_the_next_prompt() {
    let completer = ScriptedCompleter::replying(&["one", "two"]);
    let pipeline = pipeline(seeded_store().await, completer.clone());

    pipeline.respond("first").await;
    pipeline.memory().clear().unwrap();
    pipeline.respond("second").await;

    assert!(completer.prompts()[1].starts_with("Previous conversation:\n\n\n"));
    assert_eq!(pipeline.memory().len().unwrap(), 1);
}

#[tokio::test]
async fn blank_input_is_rejected_without_side_effects() {
    let completer = ScriptedCompleter::replying(&["unused"]);
    let pipeline = pipeline(seeded_store().await, completer.clone());

    let reply = pipeline.respond("   ").await;

    assert_eq!(reply.failure(), Some(FailureKind::EmptyInput));
    assert!(has_empathy_prefix(reply.text()));
    assert!(completer.prompts().is_empty());
    assert!(pipeline.memory().is_empty().unwrap());
}

/// Clears the shared memory while the model call is in flight.
struct ClearingCompleter {
    memory: Arc<ConversationMemory>,
}

#[async_trait]
impl ChatCompleter for ClearingCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String, ChatError> {
        self.memory.clear().unwrap();
        Ok("reply from the old session".into())
    }

    fn model(&self) -> &str {
        "clearing"
    }
}

#[tokio::test]
async fn clear_during_request_drops_the_stale_turn() {
    let memory = Arc::new(ConversationMemory::new());
    let completer = Arc::new(ClearingCompleter {
        memory: memory.clone(),
    });
    let pipeline = ResponsePipeline::new(seeded_store().await, memory.clone(), completer);

    let reply = pipeline.respond("hello").await;

    assert!(!reply.is_degraded());
    assert!(memory.is_empty().unwrap());
}

#[tokio::test]
async fn every_reply_starts_with_an_empathy_phrase() {
    let pipeline = pipeline(seeded_store().await, ScriptedCompleter::replying(&[]));
    for input in ["I feel anxious", "work is stressful", "can't sleep", "x"] {
        let reply = pipeline.respond(input).await;
        assert!(has_empathy_prefix(reply.text()), "{input}: {}", reply.text());
        assert!(!reply.text().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_each_record_one_turn() {
    let completer = ScriptedCompleter::replying(&[]);
    let pipeline = Arc::new(pipeline(seeded_store().await, completer.clone()));

    let first = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.respond("I feel anxious").await }
    });
    let second = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.respond("work is stressful").await }
    });

    assert!(!first.await.unwrap().is_degraded());
    assert!(!second.await.unwrap().is_degraded());

    let turns = pipeline.memory().snapshot().unwrap().turns;
    assert_eq!(turns.len(), 2);
    let mut inputs: Vec<&str> = turns.iter().map(|t| t.user_input.as_str()).collect();
    inputs.sort_unstable();
    assert_eq!(inputs, vec!["I feel anxious", "work is stressful"]);
    assert_eq!(completer.prompts().len(), 2);
}
