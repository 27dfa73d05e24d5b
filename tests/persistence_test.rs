mod helpers;

use std::sync::Arc;

use helpers::{pattern_only, temp_store};
use keepsake::config::KeepsakeConfig;
use keepsake::coordinator::MemoryCoordinator;
use keepsake::facts::export::{read_export, EXPORT_FORMAT};
use keepsake::facts::{Category, Fact, FactStore, JsonFactStore};
use tempfile::TempDir;

#[tokio::test]
async fn facts_survive_a_restart() {
    let tmp = TempDir::new().unwrap();
    {
        let memory = pattern_only(temp_store(&tmp));
        memory.learn_from_utterance("My name is Alex and I live in Portland").await;
    }

    let reopened = temp_store(&tmp);
    let mut texts: Vec<String> = reopened.all().into_iter().map(|f| f.text).collect();
    texts.sort();
    assert_eq!(texts, vec!["User lives in Portland", "User's name is Alex"]);
}

#[tokio::test]
async fn export_round_trips_every_fact() {
    let tmp = TempDir::new().unwrap();
    let store = temp_store(&tmp);
    let memory = pattern_only(Arc::clone(&store));
    memory.learn_from_utterance("My favorite color is green").await;
    memory.learn_from_utterance("My sister Maya's birthday is July 2").await;
    memory.get_context("color").await;

    let path = tmp.path().join("out").join("export.json");
    let metadata = memory.export_training_data(&path).await.unwrap();
    assert_eq!(metadata.total_facts, 2);
    assert_eq!(metadata.format, EXPORT_FORMAT);

    let export = read_export(&path).unwrap();
    assert_eq!(export.metadata, metadata);
    assert_eq!(export.facts, store.all());
    assert!(export.facts.iter().any(|f| f.access_count == 1));
}

#[tokio::test]
async fn export_of_empty_store_is_valid() {
    let tmp = TempDir::new().unwrap();
    let memory = pattern_only(temp_store(&tmp));
    let path = tmp.path().join("export.json");

    let metadata = memory.export_training_data(&path).await.unwrap();
    assert_eq!(metadata.total_facts, 0);
    assert!(read_export(&path).unwrap().facts.is_empty());
}

#[test]
fn importing_an_export_keeps_ids_and_skips_known_facts() {
    let tmp = TempDir::new().unwrap();
    let source = JsonFactStore::open(tmp.path().join("a.json"), 0.7);
    source
        .insert(Fact::new(
            "User's name is Alex",
            Category::Identity,
            0.95,
            "pattern",
            "My name is Alex",
        ))
        .unwrap();
    let path = tmp.path().join("export.json");
    keepsake::facts::export::write_export(&path, source.all()).unwrap();

    let target = JsonFactStore::open(tmp.path().join("b.json"), 0.7);
    for fact in read_export(&path).unwrap().facts {
        assert!(target.insert(fact).unwrap().is_inserted());
    }
    for fact in read_export(&path).unwrap().facts {
        assert!(!target.insert(fact).unwrap().is_inserted());
    }
    assert_eq!(target.all()[0].id, source.all()[0].id);
    assert_eq!(target.len(), 1);
}

#[test]
fn reload_keeps_confidence_bit_for_bit() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("facts.json");
    let store = JsonFactStore::open(&path, 0.7);
    store
        .insert(Fact::new(
            "User is training for a marathon",
            Category::Goals,
            0.8765432101234567,
            "model",
            "",
        ))
        .unwrap();

    let first = JsonFactStore::open(&path, 0.7).all();
    // Flush again from the reloaded copy; the file must not drift.
    let reloaded = JsonFactStore::open(&path, 0.7);
    reloaded.touch(&[first[0].id.clone()]);
    let second = JsonFactStore::open(&path, 0.7).all();

    assert_eq!(first[0].confidence, 0.8765432101234567);
    assert_eq!(second[0].confidence.to_bits(), first[0].confidence.to_bits());
    assert_eq!(store.all(), first);
}

#[test]
fn corrupt_fact_file_starts_empty_and_keeps_a_backup() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("facts.json");
    std::fs::write(&path, "{\"facts\": [truncated").unwrap();

    let store = JsonFactStore::open(&path, 0.7);
    assert!(store.is_empty());
    assert!(tmp.path().join("facts.json.bak").exists());
}

#[tokio::test]
async fn coordinator_from_config_runs_keyword_only_without_embeddings() {
    let tmp = TempDir::new().unwrap();
    let mut config = KeepsakeConfig::default();
    config.storage.facts_path = tmp.path().join("facts.json").to_string_lossy().into_owned();
    config.storage.index_path = tmp.path().join("semantic.db").to_string_lossy().into_owned();
    config.embedding.provider = "none".into();
    config.extraction.model_enabled = false;

    let memory = MemoryCoordinator::open(config).await.unwrap();
    assert!(!memory.semantic_enabled());
    assert_eq!(memory.learn_from_utterance("I work as a chef in Lyon").await, 1);
    assert!(memory.get_context("chef").await.contains("User works as a chef in Lyon"));
    assert_eq!(memory.stats().engines, vec!["pattern"]);
}
