//! SoulSpace: a retrieval-augmented therapy chat server.
//!
//! Each message runs through a single-turn pipeline: the nearest coping
//! techniques are pulled from a local vector collection, combined with the
//! conversation so far into one prompt, sent to a locally hosted model, and the
//! reply is returned behind an empathy opener.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for k-nearest-neighbor search
//! - **Embeddings**: Ollama `nomic-embed-text` (768 dimensions, L2-normalized)
//! - **Chat**: Ollama `mistral`, temperature 0.7, non-streaming
//! - **Transport**: axum HTTP (`POST /chat`, `POST /new_session`, `GET /`)
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization, schema, and health checks
//! - [`embedding`] / [`chat`] — Clients for the external model services
//! - [`knowledge`] — Snippet storage and similarity retrieval
//! - [`conversation`] — Shared in-process conversation memory
//! - [`pipeline`] — The response pipeline and its fallback policy
//! - [`server`] — HTTP boundary

pub mod chat;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod empathy;
pub mod error;
pub mod knowledge;
pub mod pipeline;
pub mod server;
