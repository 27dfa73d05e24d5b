//! CLI `reindex` command: rebuild the semantic index from the fact file.

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use keepsake::config::KeepsakeConfig;
use keepsake::facts::{FactStore, JsonFactStore};
use keepsake::semantic;

/// Re-embed every stored fact with the configured model.
pub async fn reindex(config: &KeepsakeConfig) -> Result<()> {
    let index = semantic::open_semantic_index(config).context(
        "semantic index unavailable: check `embedding.provider` and run `keepsake model download`",
    )?;
    let store = JsonFactStore::open(
        config.resolved_facts_path(),
        config.memory.similarity_threshold,
    );
    let facts = store.all();

    if facts.is_empty() {
        println!("No facts to index.");
        return Ok(());
    }

    println!(
        "Re-embedding {} facts with model '{}'...",
        facts.len(),
        config.embedding.model
    );

    let pb = ProgressBar::new(facts.len() as u64);
    pb.set_style(super::bar_style("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?);

    let progress = pb.clone();
    let count = tokio::task::spawn_blocking(move || {
        index.reindex_with_progress(&facts, |n| progress.inc(n as u64))
    })
    .await?
    .context("reindex failed")?;

    pb.finish_and_clear();
    println!("Indexed {count} facts with model '{}'.", config.embedding.model);
    Ok(())
}
