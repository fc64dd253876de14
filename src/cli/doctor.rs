//! CLI `doctor` command — database and Ollama diagnostics.

use anyhow::{Context, Result};

use crate::chat::ollama::OllamaChat;
use crate::config::SoulspaceConfig;
use crate::db;

pub async fn doctor(config: &SoulspaceConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("SoulSpace Health Report");
    println!("=======================");
    println!();

    if db_path.exists() {
        let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
        let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
        let report = db::check_database_health(&conn, &config.storage.collection)
            .context("failed to run health check")?;

        println!("Database:          {}", db_path.display());
        println!("File size:         {}", format_bytes(file_size));
        println!("Schema version:    {}", report.schema_version);
        println!("sqlite-vec:        {}", report.sqlite_vec_version);
        println!("Collection:        {}", config.storage.collection);
        println!("  Snippets:        {}", report.snippet_count);
        println!("  Vectors:         {}", report.vector_count);
        println!("  Audit log:       {}", report.log_count);
        println!();
        println!("Embedding model:");
        println!(
            "  Stored:          {}",
            report.embedding_model.as_deref().unwrap_or("(not set)")
        );
        println!("  Configured:      {}", config.embedding.model);
        if let Some(ref stored) = report.embedding_model {
            if stored != &config.embedding.model {
                println!("  WARNING: model mismatch! Run `soulspace re-embed` to update vectors.");
            }
        }
        if report.integrity_ok {
            println!("Integrity check:   PASSED");
        } else {
            println!("Integrity check:   FAILED ({})", report.integrity_details);
        }
    } else {
        println!("Database:          not found at {}", db_path.display());
        println!("                   run `soulspace seed` to create it");
    }

    println!();
    println!("Ollama:            {}", config.chat.base_url);
    let client = OllamaChat::new(&config.chat)?;
    match client.list_models().await {
        Ok(models) => {
            for wanted in [&config.chat.model, &config.embedding.model] {
                let installed = models
                    .iter()
                    .any(|m| m == wanted || m.split(':').next() == Some(wanted.as_str()));
                let status = if installed { "installed" } else { "MISSING (ollama pull)" };
                println!("  {wanted:<17}{status}");
            }
        }
        Err(e) => println!("  unreachable: {e}"),
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
