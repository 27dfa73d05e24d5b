//! CLI `import` command: load a training export back into the fact file.

use anyhow::{Context, Result};
use std::path::Path;

use keepsake::config::KeepsakeConfig;
use keepsake::facts::export::read_export;
use keepsake::facts::{FactStore, InsertOutcome, JsonFactStore};
use keepsake::semantic;

/// Insert every fact from `file` through the normal dedup path, then rebuild
/// the semantic index if one is available.
pub fn import(config: &KeepsakeConfig, file: &Path) -> Result<()> {
    let data = read_export(file)?;
    let store = JsonFactStore::open(
        config.resolved_facts_path(),
        config.memory.similarity_threshold,
    );

    println!(
        "Importing {} facts from {} ({})...",
        data.facts.len(),
        file.display(),
        data.metadata.format
    );

    let (mut inserted, mut updated, mut duplicates) = (0u64, 0u64, 0u64);
    for fact in data.facts {
        match store.insert(fact).context("failed to store imported fact")? {
            InsertOutcome::Inserted { .. } => inserted += 1,
            InsertOutcome::Updated { .. } => updated += 1,
            InsertOutcome::Duplicate { .. } => duplicates += 1,
        }
    }

    println!("Import complete: {inserted} new, {updated} updated, {duplicates} already known.");

    if let Some(index) = semantic::open_semantic_index(config) {
        let count = index.reindex(&store.all())?;
        println!("Semantic index rebuilt ({count} facts).");
    }
    Ok(())
}
