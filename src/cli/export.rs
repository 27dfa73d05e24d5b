//! CLI `export` command.

use anyhow::Result;
use std::path::PathBuf;

use keepsake::config::KeepsakeConfig;
use keepsake::facts::export::write_export;
use keepsake::facts::{FactStore, JsonFactStore};

/// Write the training export to `path`, or to `storage.export_path`.
pub fn export(config: &KeepsakeConfig, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| config.resolved_export_path());
    let store = JsonFactStore::open(
        config.resolved_facts_path(),
        config.memory.similarity_threshold,
    );

    let metadata = write_export(&path, store.all())?;
    println!(
        "Exported {} facts to {} ({})",
        metadata.total_facts,
        path.display(),
        metadata.format
    );
    Ok(())
}
