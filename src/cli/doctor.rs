//! CLI `doctor` command: check the fact file, embedding model, semantic
//! index and completion endpoint, and print a health report.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use keepsake::config::KeepsakeConfig;
use keepsake::db;
use keepsake::facts::{FactStore, JsonFactStore};

pub async fn doctor(config: &KeepsakeConfig) -> Result<()> {
    println!("keepsake Health Report");
    println!("======================");
    println!();

    let stored = report_facts(config);
    println!();
    let model_ready = report_model(config);
    println!();
    report_index(config, stored, model_ready)?;
    println!();
    report_endpoint(config).await;
    Ok(())
}

/// Returns the number of stored facts.
fn report_facts(config: &KeepsakeConfig) -> usize {
    let path = config.resolved_facts_path();
    println!("Fact file:         {}", path.display());
    if !path.exists() {
        println!("  Status:          not created yet (nothing learned)");
        return 0;
    }

    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    println!("  File size:       {}", format_bytes(size));

    let store = JsonFactStore::open(&path, config.memory.similarity_threshold);
    println!("  Facts:           {}", store.len());

    let mut backup = path.clone().into_os_string();
    backup.push(".bak");
    if Path::new(&backup).exists() {
        println!(
            "  WARNING: a malformed fact file was backed up to {}",
            Path::new(&backup).display()
        );
    }
    store.len()
}

/// Returns whether local embeddings can load.
fn report_model(config: &KeepsakeConfig) -> bool {
    println!("Embedding provider: {}", config.embedding.provider);
    if config.embedding.provider == "none" {
        println!("  Status:          disabled, keyword retrieval only");
        return false;
    }

    let cache_dir = keepsake::config::expand_tilde(&config.embedding.cache_dir);
    let mut ready = true;
    for name in ["model.onnx", "tokenizer.json"] {
        let path = cache_dir.join(name);
        if path.exists() {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            println!("  {name:<17}{}", format_bytes(size));
        } else {
            println!("  {name:<17}missing");
            ready = false;
        }
    }
    if !ready {
        println!("  Run `keepsake model download` to enable semantic recall.");
    }
    ready
}

fn report_index(config: &KeepsakeConfig, stored: usize, model_ready: bool) -> Result<()> {
    let path = config.resolved_index_path();
    println!("Semantic index:    {}", path.display());
    if !path.exists() {
        println!("  Status:          not created yet");
        return Ok(());
    }

    let conn = db::open_index_database(&path).context("failed to open index (may be corrupt)")?;
    let report = db::check_index_health(&conn).context("failed to run health check")?;

    println!("  sqlite-vec:      {}", report.sqlite_vec_version);
    println!(
        "  Model stored:    {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Model configured: {}", config.embedding.model);
    println!("  Indexed facts:   {} ({} vectors)", report.indexed_facts, report.vector_count);

    let model_mismatch = report
        .embedding_model
        .as_deref()
        .is_some_and(|m| m != config.embedding.model);
    if model_mismatch {
        println!("  WARNING: model mismatch, the index is cleared on next start.");
    }
    if model_ready && report.indexed_facts != stored {
        println!("  WARNING: index is out of date. Run `keepsake reindex`.");
    }

    if report.integrity_ok {
        println!("  Integrity check: PASSED");
    } else {
        println!("  Integrity check: FAILED ({})", report.integrity_details);
        println!("  The index is derived data: delete {} and run `keepsake reindex`.", path.display());
    }
    Ok(())
}

async fn report_endpoint(config: &KeepsakeConfig) {
    let extraction = &config.extraction;
    if !extraction.model_enabled {
        println!("Model extraction:  disabled");
        return;
    }
    println!("Model extraction:  {} at {}", extraction.model, extraction.endpoint);

    let url = format!("{}/api/tags", extraction.endpoint.trim_end_matches('/'));
    let reachable = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(client) => client
            .get(&url)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success()),
        Err(_) => false,
    };
    if reachable {
        println!("  Status:          reachable");
    } else {
        println!("  Status:          unreachable, only pattern extraction will learn");
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
