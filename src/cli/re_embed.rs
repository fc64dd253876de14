//! CLI `re-embed` command — regenerate all vectors with the current model.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::SoulspaceConfig;

const BATCH_SIZE: usize = 32;

pub async fn re_embed(config: &SoulspaceConfig) -> Result<()> {
    let store = crate::server::open_knowledge_resizing(config)?;

    let total = store.len().await?;
    if total == 0 {
        println!("No snippets to re-embed.");
        return Ok(());
    }

    println!(
        "Re-embedding {total} snippets with model '{}'...",
        config.embedding.model
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let count = store
        .re_embed(BATCH_SIZE, |done| pb.inc(done as u64))
        .await
        .context("re-embedding failed")?;

    pb.finish_and_clear();
    println!(
        "Re-embedded {count} snippets with model '{}'.",
        config.embedding.model
    );
    Ok(())
}
