//! HTTP boundary and shared-state setup.
//!
//! [`build_state`] opens the database, creates the Ollama clients, seeds the
//! knowledge collection and wires the [`ResponsePipeline`]. An unreachable
//! embedding service at startup does not stop the server. [`router`] exposes
//! the pipeline over axum; [`serve`] binds and runs until ctrl-c.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::chat;
use crate::config::SoulspaceConfig;
use crate::conversation::ConversationMemory;
use crate::db;
use crate::embedding;
use crate::error::KnowledgeError;
use crate::knowledge::{seed, KnowledgeStore};
use crate::pipeline::ResponsePipeline;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Delay between background seeding attempts after a failed startup seed.
pub const SEED_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ResponsePipeline>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub turns: usize,
    pub snippets: usize,
}

/// Open the knowledge store (without seeding) from config.
pub fn open_knowledge(config: &SoulspaceConfig) -> Result<KnowledgeStore> {
    let (db, embedder) = open_parts(config)?;
    KnowledgeStore::open(db, embedder, config.storage.collection.clone())
        .context("failed to open knowledge collection")
}

/// Open the knowledge store for `re-embed`, rebuilding the vector index when
/// the configured embedding width differs from the stored one.
pub fn open_knowledge_resizing(config: &SoulspaceConfig) -> Result<KnowledgeStore> {
    let (db, embedder) = open_parts(config)?;
    KnowledgeStore::open_resizing(db, embedder, config.storage.collection.clone())
        .context("failed to open knowledge collection")
}

fn open_parts(
    config: &SoulspaceConfig,
) -> Result<(Arc<Mutex<Connection>>, Arc<dyn embedding::EmbeddingProvider>)> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    if let Ok(Some(stored_model)) = db::schema::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed, run `soulspace re-embed` to update all vectors"
            );
        }
    }

    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    Ok((Arc::new(Mutex::new(conn)), embedder))
}

/// Shared setup: open the store, seed it, build the pipeline.
pub async fn build_state(config: &SoulspaceConfig) -> Result<AppState> {
    let knowledge = Arc::new(open_knowledge(config)?);
    let completer: Arc<dyn chat::ChatCompleter> = Arc::from(chat::create_completer(&config.chat)?);
    tracing::info!(model = %completer.model(), "chat provider ready");

    Ok(prepare_state(knowledge, completer, config.retrieval.top_k, SEED_RETRY_INTERVAL).await)
}

/// Seed `knowledge` and wire the pipeline.
///
/// A failed seed is not fatal: the state is returned anyway, `/chat` answers
/// with the fallback while retrieval is down, and seeding is retried every
/// `retry_every` in the background until it succeeds.
pub async fn prepare_state(
    knowledge: Arc<KnowledgeStore>,
    completer: Arc<dyn chat::ChatCompleter>,
    top_k: usize,
    retry_every: Duration,
) -> AppState {
    if let Err(e) = seed_knowledge(&knowledge).await {
        tracing::warn!(
            error = %e,
            retry_secs = retry_every.as_secs_f64(),
            "failed to seed knowledge (is Ollama running?), serving fallback replies until it succeeds"
        );
        tokio::spawn(retry_seed(Arc::clone(&knowledge), retry_every));
    }

    let pipeline = ResponsePipeline::new(knowledge, Arc::new(ConversationMemory::new()), completer)
        .with_top_k(top_k);

    AppState {
        pipeline: Arc::new(pipeline),
    }
}

async fn seed_knowledge(knowledge: &KnowledgeStore) -> Result<(), KnowledgeError> {
    let report = knowledge.seed(&seed::default_snippets()).await?;
    tracing::info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        "knowledge ready"
    );
    Ok(())
}

async fn retry_seed(knowledge: Arc<KnowledgeStore>, every: Duration) {
    let mut attempt = 1u32;
    loop {
        tokio::time::sleep(every).await;
        attempt += 1;
        match seed_knowledge(&knowledge).await {
            Ok(()) => return,
            Err(e) => tracing::warn!(error = %e, attempt, "knowledge seeding still failing"),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(chat_handler))
        .route("/new_session", post(new_session_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Always 200 with a `response` body once the input is non-empty; pipeline
/// failures arrive as the fallback text.
async fn chat_handler(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "message must not be empty"})),
        )
            .into_response();
    }

    let reply = state.pipeline.respond(message).await;
    Json(ChatResponse {
        response: reply.into_text(),
    })
    .into_response()
}

async fn new_session_handler(State(state): State<AppState>) -> Json<NewSessionResponse> {
    let success = match state.pipeline.memory().clear() {
        Ok(()) => {
            tracing::info!("conversation memory cleared");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to clear conversation memory");
            false
        }
    };
    Json(NewSessionResponse { success })
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let turns = state.pipeline.memory().len();
    let snippets = state.pipeline.knowledge().len().await;

    match (turns, snippets) {
        (Ok(turns), Ok(snippets)) => Json(HealthResponse {
            status: "ok".into(),
            turns,
            snippets,
        })
        .into_response(),
        (turns, snippets) => {
            let detail = turns
                .err()
                .map(|e| e.to_string())
                .or_else(|| snippets.err().map(|e| e.to_string()))
                .unwrap_or_default();
            tracing::error!(error = %detail, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "error", "error": detail})),
            )
                .into_response()
        }
    }
}

/// Bind the HTTP server and run until ctrl-c.
pub async fn serve(config: SoulspaceConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting SoulSpace chat server");

    let state = build_state(&config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down chat server");
        })
        .await?;

    Ok(())
}
