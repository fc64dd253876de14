use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SoulspaceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub collection: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

/// Where a stock Ollama install listens.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_soulspace_dir()
            .join("database")
            .join("knowledge.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            collection: "therapy_knowledge".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            base_url: DEFAULT_OLLAMA_URL.into(),
            model: "nomic-embed-text".into(),
            dimensions: 768,
            timeout_secs: 30,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            base_url: DEFAULT_OLLAMA_URL.into(),
            model: "mistral".into(),
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Returns `~/.soulspace/`, or `./.soulspace` when no home directory is known.
pub fn default_soulspace_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".soulspace")
}

/// Returns the default config file path: `~/.soulspace/config.toml`
pub fn default_config_path() -> PathBuf {
    default_soulspace_dir().join("config.toml")
}

impl SoulspaceConfig {
    /// Load from a specific path (defaults when the file is missing), then
    /// apply env var overrides.
    ///
    /// Runs before logging is set up, so nothing here logs; see
    /// [`rejected_env_port`] for the one override that can be ignored.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            SoulspaceConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `SOULSPACE_OLLAMA_URL` points both the embedding and chat clients at the
    /// same Ollama instance. An unparsable `SOULSPACE_PORT` is ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SOULSPACE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SOULSPACE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SOULSPACE_OLLAMA_URL") {
            self.embedding.base_url = val.clone();
            self.chat.base_url = val;
        }
        if let Some(port) = std::env::var("SOULSPACE_PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

/// The raw `SOULSPACE_PORT` value when it is set but not a valid port.
pub fn rejected_env_port() -> Option<String> {
    std::env::var("SOULSPACE_PORT")
        .ok()
        .filter(|v| v.parse::<u16>().is_err())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SoulspaceConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.collection, "therapy_knowledge");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.chat.model, "mistral");
        assert!((config.chat.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.storage.db_path.ends_with("knowledge.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
port = 8080

[storage]
db_path = "/tmp/test.db"

[chat]
model = "llama3"
temperature = 0.2
"#;
        let config: SoulspaceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.chat.model, "llama3");
        assert!((config.chat.temperature - 0.2).abs() < f32::EPSILON);
        // defaults still apply for unset fields
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.collection, "therapy_knowledge");
        assert_eq!(config.embedding.model, "nomic-embed-text");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = SoulspaceConfig::default();
        std::env::set_var("SOULSPACE_DB", "/tmp/override.db");
        std::env::set_var("SOULSPACE_LOG_LEVEL", "trace");
        std::env::set_var("SOULSPACE_OLLAMA_URL", "http://gpu-box:11434");
        std::env::set_var("SOULSPACE_PORT", "not-a-port");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.embedding.base_url, "http://gpu-box:11434");
        assert_eq!(config.chat.base_url, "http://gpu-box:11434");
        assert_eq!(config.server.port, 5000);
        assert_eq!(rejected_env_port().as_deref(), Some("not-a-port"));

        std::env::set_var("SOULSPACE_PORT", "8081");
        config.apply_env_overrides();
        assert_eq!(config.server.port, 8081);
        assert_eq!(rejected_env_port(), None);

        std::env::remove_var("SOULSPACE_DB");
        std::env::remove_var("SOULSPACE_LOG_LEVEL");
        std::env::remove_var("SOULSPACE_OLLAMA_URL");
        std::env::remove_var("SOULSPACE_PORT");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SoulspaceConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.collection, "therapy_knowledge");
        assert_eq!(config.chat.model, "mistral");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/lib/x.db"), PathBuf::from("/var/lib/x.db"));
    }
}
