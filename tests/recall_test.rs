mod helpers;

use std::sync::Arc;

use helpers::{coordinator, pattern_only, temp_store, BrokenRetriever, WordOverlapRetriever};
use keepsake::extraction::{ExtractionEngine, PatternExtractor};
use keepsake::facts::{Category, FactStore};
use keepsake::semantic::ContextRetriever;
use tempfile::TempDir;

fn pattern() -> Vec<Arc<dyn ExtractionEngine>> {
    vec![Arc::new(PatternExtractor::new())]
}

#[tokio::test]
async fn empty_store_gives_empty_context() {
    let tmp = TempDir::new().unwrap();
    let memory = pattern_only(temp_store(&tmp));

    assert_eq!(memory.get_context("what is my name?").await, "");
    assert_eq!(memory.get_context("").await, "");
}

#[tokio::test]
async fn keyword_recall_without_semantic_index() {
    let tmp = TempDir::new().unwrap();
    let memory = pattern_only(temp_store(&tmp));
    memory.learn_from_utterance("I love pizza from Tony's").await;

    let context = memory.get_context("What pizza do I like?").await;
    assert_eq!(
        context,
        "What I know about you:\n\nPreferences:\n  - User loves pizza from Tony's"
    );
}

#[tokio::test]
async fn unrelated_query_recalls_nothing() {
    let tmp = TempDir::new().unwrap();
    let memory = pattern_only(temp_store(&tmp));
    memory.learn_from_utterance("I love pizza from Tony's").await;

    assert_eq!(memory.get_context("help with my quantum physics homework").await, "");
}

#[tokio::test]
async fn broken_semantic_index_falls_back_to_keywords() {
    let tmp = TempDir::new().unwrap();
    let store = temp_store(&tmp);
    let retriever: Arc<dyn ContextRetriever> = Arc::new(BrokenRetriever);
    let memory = coordinator(Arc::clone(&store), pattern(), Some(retriever));

    assert_eq!(memory.learn_from_utterance("I love pizza from Tony's").await, 1);
    assert_eq!(store.len(), 1);

    let context = memory.get_context("any good pizza places?").await;
    assert!(context.contains("User loves pizza from Tony's"), "{context}");
    assert_eq!(memory.stats().retrieval_mode, "semantic");
}

#[tokio::test]
async fn semantic_hits_come_from_the_store_and_count_as_access() {
    let tmp = TempDir::new().unwrap();
    let store = temp_store(&tmp);
    let retriever = Arc::new(WordOverlapRetriever::default());
    let memory = coordinator(
        Arc::clone(&store),
        pattern(),
        Some(Arc::clone(&retriever) as Arc<dyn ContextRetriever>),
    );

    memory.learn_from_utterance("My name is Alex, nice to meet you").await;
    memory.learn_from_utterance("I work as a nurse at the clinic").await;
    assert_eq!(retriever.indexed.lock().unwrap().len(), 2);

    let context = memory.get_context("nurse schedule").await;
    assert_eq!(
        context,
        "What I know about you:\n\nIdentity:\n  - User works as a nurse at the clinic"
    );

    let nurse = store
        .all()
        .into_iter()
        .find(|f| f.text.contains("nurse"))
        .unwrap();
    assert_eq!(nurse.access_count, 1);
    assert!(nurse.last_accessed_at.is_some());
}

#[tokio::test]
async fn semantic_miss_falls_back_to_synonyms() {
    let tmp = TempDir::new().unwrap();
    let store = temp_store(&tmp);
    let retriever: Arc<dyn ContextRetriever> = Arc::new(WordOverlapRetriever::default());
    let memory = coordinator(Arc::clone(&store), pattern(), Some(retriever));
    memory.learn_from_utterance("I love pizza from Tony's").await;

    // No shared word, but "favourite" expands to "love".
    let context = memory.get_context("favourite dinner").await;
    assert!(context.contains("User loves pizza from Tony's"), "{context}");
}

#[tokio::test]
async fn updated_facts_are_reindexed() {
    let tmp = TempDir::new().unwrap();
    let store = temp_store(&tmp);
    let retriever = Arc::new(WordOverlapRetriever::default());
    let memory = coordinator(
        Arc::clone(&store),
        pattern(),
        Some(Arc::clone(&retriever) as Arc<dyn ContextRetriever>),
    );

    memory.learn_from_utterance("I live in Portland, it rains").await;
    memory.learn_from_utterance("I live in Portland Oregon these days").await;

    let indexed = retriever.indexed.lock().unwrap();
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].text, "User lives in Portland Oregon these days");
}

#[tokio::test]
async fn context_groups_categories_in_rank_order() {
    let tmp = TempDir::new().unwrap();
    let store = temp_store(&tmp);
    let memory = pattern_only(Arc::clone(&store));
    memory
        .remember_fact_manually("User's dog is called Rex", Category::Relationships)
        .await
        .unwrap();
    memory
        .remember_fact_manually("User's name is Sam", Category::Identity)
        .await
        .unwrap();

    let context = memory.get_context("name").await;
    assert!(context.starts_with("What I know about you:\n"));
    assert!(context.contains("\nIdentity:\n  - User's name is Sam"));
    assert!(context.contains("\nRelationships:\n  - User's dog is called Rex"));
}
