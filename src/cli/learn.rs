//! CLI `learn` command: run extraction over one message.

use anyhow::Result;

use keepsake::config::KeepsakeConfig;
use keepsake::coordinator::MemoryCoordinator;

pub async fn learn(config: KeepsakeConfig, utterance: &str) -> Result<()> {
    let memory = MemoryCoordinator::open(config).await?;
    let learned = memory.learn_from_utterance(utterance).await;
    let snapshot = memory.stats();

    match learned {
        0 => println!("Nothing new learned."),
        1 => println!("Learned 1 new fact."),
        n => println!("Learned {n} new facts."),
    }
    for (engine, count) in &snapshot.by_engine {
        println!("  {engine}: {count}");
    }
    if let Some(err) = &snapshot.last_persist_error {
        println!("Warning: facts could not be saved: {err}");
    }
    Ok(())
}
