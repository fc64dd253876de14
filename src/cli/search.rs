use anyhow::Result;

use crate::config::SoulspaceConfig;

/// Run a similarity search from the terminal.
pub async fn search(config: &SoulspaceConfig, query: &str, k: usize) -> Result<()> {
    let store = crate::server::open_knowledge(config)?;
    let hits = store.search_scored(query, k).await?;

    if hits.is_empty() {
        println!("No snippets stored. Run `soulspace seed` first.");
        return Ok(());
    }

    println!("Top {} result(s) in '{}':\n", hits.len(), store.collection());
    for (i, hit) in hits.iter().enumerate() {
        println!("  {}. [{}] distance {:.4}", i + 1, hit.id, hit.distance);
        println!("     {}", super::preview(&hit.text, 120));
        println!();
    }

    Ok(())
}
