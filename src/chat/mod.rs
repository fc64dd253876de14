//! Chat-completion client.
//!
//! The pipeline only ever sends one `user` message carrying the whole
//! assembled prompt, so [`ChatCompleter`] takes a prompt string and returns
//! the model's text.

pub mod ollama;

use async_trait::async_trait;

use crate::error::ChatError;

#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Run a single non-streaming completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;
}

/// Create a chat completer from config.
///
/// Currently only `"ollama"` is supported.
pub fn create_completer(
    config: &crate::config::ChatConfig,
) -> anyhow::Result<Box<dyn ChatCompleter>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(ollama::OllamaChat::new(config)?)),
        other => anyhow::bail!("unknown chat provider: {other}. Supported: ollama"),
    }
}
