use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use soulspace::config::{default_config_path, rejected_env_port, SoulspaceConfig};
use soulspace::{cli, server};

#[derive(Parser)]
#[command(name = "soulspace", version, about = "Retrieval-augmented therapy chat server")]
struct Cli {
    /// Config file (defaults to ~/.soulspace/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the knowledge base and start the HTTP chat server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Seed the knowledge base with the built-in techniques
    Seed,
    /// Similarity search over the knowledge base
    Search {
        query: String,
        /// Number of results
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
    /// Chat with the therapist from the terminal
    Chat,
    /// Recompute all vectors with the configured embedding model
    ReEmbed,
    /// Check the database and the Ollama service
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = SoulspaceConfig::load_from(&config_path)?;

    // Log to stderr so stdout stays clean for the terminal commands.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !config_path.exists() {
        tracing::info!(path = %config_path.display(), "no config file, using defaults");
    }
    if let Some(value) = rejected_env_port() {
        tracing::warn!(%value, "ignoring invalid SOULSPACE_PORT");
    }

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await?;
        }
        Command::Seed => cli::seed::seed(&config).await?,
        Command::Search { query, k } => cli::search::search(&config, &query, k).await?,
        Command::Chat => cli::chat::chat(&config).await?,
        Command::ReEmbed => cli::re_embed::re_embed(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config).await?,
    }

    Ok(())
}
