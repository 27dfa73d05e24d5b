#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use keepsake::config::MemoryConfig;
use keepsake::coordinator::MemoryCoordinator;
use keepsake::extraction::{
    CompletionService, ExtractionEngine, ModelAssistedExtractor, PatternExtractor,
};
use keepsake::facts::{CandidateFact, Category, Fact, FactStore, JsonFactStore};
use keepsake::semantic::{ContextRetriever, SemanticHit};

/// A fact store backed by `facts.json` inside `dir`.
pub fn temp_store(dir: &TempDir) -> Arc<JsonFactStore> {
    Arc::new(JsonFactStore::open(dir.path().join("facts.json"), 0.7))
}

/// Coordinator with default policy over the given parts.
pub fn coordinator(
    store: Arc<JsonFactStore>,
    engines: Vec<Arc<dyn ExtractionEngine>>,
    retriever: Option<Arc<dyn ContextRetriever>>,
) -> MemoryCoordinator {
    MemoryCoordinator::new(store, engines, retriever, MemoryConfig::default())
}

/// Coordinator with only the pattern engine and keyword recall.
pub fn pattern_only(store: Arc<JsonFactStore>) -> MemoryCoordinator {
    coordinator(store, vec![Arc::new(PatternExtractor::new())], None)
}

/// Completion service with a canned reply, an optional delay, and a call count.
pub struct ScriptedCompletion {
    reply: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// Model-assisted engine over `service` with a generous timeout.
pub fn model_engine(service: Arc<ScriptedCompletion>) -> Arc<dyn ExtractionEngine> {
    Arc::new(ModelAssistedExtractor::new(service, Duration::from_secs(5), 0.0))
}

/// Engine that returns the same candidates for every utterance.
pub struct FixedEngine {
    pub name: &'static str,
    pub candidates: Vec<CandidateFact>,
}

#[async_trait]
impl ExtractionEngine for FixedEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn extract(&self, _utterance: &str) -> Result<Vec<CandidateFact>> {
        Ok(self.candidates.clone())
    }
}

pub fn fixed(name: &'static str, candidates: Vec<CandidateFact>) -> Arc<dyn ExtractionEngine> {
    Arc::new(FixedEngine { name, candidates })
}

/// Engine that always errors.
pub struct FailingEngine;

#[async_trait]
impl ExtractionEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn extract(&self, _utterance: &str) -> Result<Vec<CandidateFact>> {
        anyhow::bail!("engine exploded")
    }
}

/// In-memory retriever: a fact matches when it shares any word with the
/// query. Records every indexed fact id.
#[derive(Default)]
pub struct WordOverlapRetriever {
    pub indexed: Mutex<Vec<Fact>>,
}

impl ContextRetriever for WordOverlapRetriever {
    fn index(&self, fact: &Fact) -> Result<()> {
        let mut indexed = self.indexed.lock().unwrap();
        indexed.retain(|f| f.id != fact.id);
        indexed.push(fact.clone());
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticHit>> {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();
        Ok(self
            .indexed
            .lock()
            .unwrap()
            .iter()
            .filter(|f| {
                let text = f.text.to_lowercase();
                words.iter().any(|w| text.split_whitespace().any(|t| t == *w))
            })
            .take(limit)
            .map(|f| SemanticHit {
                fact_id: f.id.clone(),
                text: f.text.clone(),
                category: f.category.as_str().to_string(),
                similarity: 0.9,
            })
            .collect())
    }
}

/// Retriever whose every call fails.
pub struct BrokenRetriever;

impl ContextRetriever for BrokenRetriever {
    fn index(&self, _fact: &Fact) -> Result<()> {
        anyhow::bail!("index offline")
    }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SemanticHit>> {
        anyhow::bail!("index offline")
    }
}

pub fn candidate(text: &str, category: Category, confidence: f64) -> CandidateFact {
    CandidateFact::new(text, category, confidence)
}

/// Number of stored facts whose text equals `text`.
pub fn count_text(store: &dyn FactStore, text: &str) -> usize {
    store.all().iter().filter(|f| f.text == text).count()
}
