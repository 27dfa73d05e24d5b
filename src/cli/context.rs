//! CLI `context` command: show what would be injected for a message.

use anyhow::Result;

use keepsake::config::KeepsakeConfig;
use keepsake::coordinator::MemoryCoordinator;

pub async fn context(config: KeepsakeConfig, query: &str) -> Result<()> {
    let memory = MemoryCoordinator::open(config).await?;
    let context = memory.get_context(query).await;
    if context.is_empty() {
        println!("Nothing relevant remembered.");
    } else {
        println!("{context}");
    }
    Ok(())
}
