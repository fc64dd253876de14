//! CLI `seed` command — load the fixed techniques and run a probe query.

use anyhow::Result;

use crate::config::SoulspaceConfig;
use crate::knowledge::seed::default_snippets;

/// Query used to confirm retrieval works after seeding.
const PROBE_QUERY: &str = "anxiety";

pub async fn seed(config: &SoulspaceConfig) -> Result<()> {
    let store = crate::server::open_knowledge(config)?;
    let report = store.seed(&default_snippets()).await?;

    println!(
        "Collection '{}': {} created, {} updated, {} unchanged.",
        store.collection(),
        report.created,
        report.updated,
        report.unchanged
    );

    let probe = store.search(PROBE_QUERY, 1).await?;
    println!("Probe '{PROBE_QUERY}': {probe:?}");
    Ok(())
}
