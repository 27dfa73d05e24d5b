//! CLI `remember` command.

use anyhow::Result;

use keepsake::config::KeepsakeConfig;
use keepsake::coordinator::MemoryCoordinator;
use keepsake::facts::{Category, InsertOutcome};

pub async fn remember(config: KeepsakeConfig, text: &str, category: &str) -> Result<()> {
    let category = Category::parse_lenient(category);
    let memory = MemoryCoordinator::open(config).await?;

    match memory.remember_fact_manually(text, category).await? {
        InsertOutcome::Inserted { id } => println!("Remembered ({category}) [{id}]"),
        InsertOutcome::Updated { id } => println!("Updated existing fact [{id}]"),
        InsertOutcome::Duplicate { id } => println!("Already known [{id}]"),
    }
    Ok(())
}
