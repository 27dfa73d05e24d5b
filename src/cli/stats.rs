//! CLI `stats` command.

use anyhow::Result;
use std::collections::BTreeMap;

use keepsake::config::KeepsakeConfig;
use keepsake::coordinator::MemoryCoordinator;

/// Print the memory snapshot, as a table or as JSON.
pub async fn stats(config: KeepsakeConfig, json: bool) -> Result<()> {
    let memory = MemoryCoordinator::open(config).await?;
    let snapshot = memory.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("keepsake memory");
    println!("===============");
    println!();
    println!("Total facts:       {}", snapshot.total_facts);
    print_counts(&snapshot.stored_by_category);
    println!();
    println!("Engines:           {}", snapshot.engines.join(", "));
    println!("Retrieval:         {}", snapshot.retrieval_mode);
    if let Some(err) = &snapshot.last_persist_error {
        println!();
        println!("Last save failed:  {err}");
    }
    Ok(())
}

fn print_counts(counts: &BTreeMap<String, usize>) {
    for (category, count) in counts {
        println!("  {:<16} {count}", format!("{category}:"));
    }
}
