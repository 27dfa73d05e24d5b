//! The single entry point for learning and recall.
//!
//! [`MemoryCoordinator`] runs every extraction engine over an utterance,
//! applies the confidence gate, writes through the [`FactStore`] dedup path,
//! mirrors new facts into the semantic index, and keeps per-process learning
//! counters. Recall prefers the semantic index and falls back to keyword
//! search. Nothing here fails a chat turn: engine, index and flush errors are
//! logged and absorbed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::config::{KeepsakeConfig, MemoryConfig};
use crate::extraction::{self, ExtractionEngine};
use crate::facts::export::{self, ExportMetadata};
use crate::facts::types::{excerpt, now_timestamp};
use crate::facts::{Category, Fact, FactStore, InsertOutcome, JsonFactStore, StoreError};
use crate::semantic::{self, ContextRetriever, VectorIndex};

/// Heading of every non-empty context block.
pub const CONTEXT_HEADING: &str = "What I know about you:";

/// `source_engine` of facts added through [`MemoryCoordinator::remember_fact_manually`].
pub const MANUAL_ENGINE: &str = "manual";

/// Derived view of the store plus this process's learning counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub total_facts: usize,
    pub learned_this_session: usize,
    /// Facts learned this session, by category.
    pub by_category: BTreeMap<String, usize>,
    /// Facts learned this session, by extraction engine.
    pub by_engine: BTreeMap<String, usize>,
    /// Every stored fact, by category.
    pub stored_by_category: BTreeMap<String, usize>,
    pub engines: Vec<String>,
    pub retrieval_mode: String,
    pub semantic_enabled: bool,
    pub session_started_at: String,
    pub last_persist_error: Option<String>,
}

#[derive(Debug)]
struct SessionCounters {
    learned: usize,
    by_category: BTreeMap<String, usize>,
    by_engine: BTreeMap<String, usize>,
    started_at: String,
}

pub struct MemoryCoordinator {
    store: Arc<dyn FactStore>,
    engines: Vec<Arc<dyn ExtractionEngine>>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    policy: MemoryConfig,
    session: Mutex<SessionCounters>,
    span: tracing::Span,
}

impl MemoryCoordinator {
    pub fn new(
        store: Arc<dyn FactStore>,
        engines: Vec<Arc<dyn ExtractionEngine>>,
        retriever: Option<Arc<dyn ContextRetriever>>,
        policy: MemoryConfig,
    ) -> Self {
        let span = tracing::info_span!("memory", semantic = retriever.is_some());
        span.in_scope(|| {
            info!(
                engines = ?engines.iter().map(|e| e.name()).collect::<Vec<_>>(),
                facts = store.len(),
                "memory coordinator ready"
            );
        });
        Self {
            store,
            engines,
            retriever,
            policy,
            session: Mutex::new(SessionCounters {
                learned: 0,
                by_category: BTreeMap::new(),
                by_engine: BTreeMap::new(),
                started_at: now_timestamp(),
            }),
            span,
        }
    }

    /// Wire up store, engines, and (if available) the semantic index from
    /// config. Blocking: loads files and may embed every fact.
    pub fn from_config(config: &KeepsakeConfig) -> Result<Self> {
        let store: Arc<dyn FactStore> = Arc::new(JsonFactStore::open(
            config.resolved_facts_path(),
            config.memory.similarity_threshold,
        ));
        let engines = extraction::build_engines(&config.extraction)
            .context("failed to build extraction engines")?;
        let retriever = semantic::open_semantic_index(config).map(|index| {
            sync_index(&index, store.as_ref());
            Arc::new(index) as Arc<dyn ContextRetriever>
        });
        Ok(Self::new(store, engines, retriever, config.memory.clone()))
    }

    /// [`MemoryCoordinator::from_config`] off the async runtime.
    pub async fn open(config: KeepsakeConfig) -> Result<Arc<Self>> {
        tokio::task::spawn_blocking(move || Self::from_config(&config).map(Arc::new))
            .await
            .context("coordinator setup task failed")?
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    pub fn semantic_enabled(&self) -> bool {
        self.retriever.is_some()
    }

    /// Run `f` on the blocking pool inside the coordinator's span.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let span = self.span.clone();
        tokio::task::spawn_blocking(move || span.in_scope(f))
            .await
            .context("blocking task failed")
    }

    /// Extract, gate, and store facts from one user message. Returns how many
    /// facts were newly inserted.
    pub async fn learn_from_utterance(&self, utterance: &str) -> usize {
        async {
            let source = excerpt(utterance.trim(), self.policy.source_excerpt_chars);
            let mut learned = 0;

            for engine in &self.engines {
                let candidates = match engine.extract(utterance).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        warn!(engine = engine.name(), error = %e, "extraction engine failed");
                        continue;
                    }
                };

                for candidate in candidates {
                    if candidate.confidence < self.policy.confidence_gate {
                        debug!(
                            engine = engine.name(),
                            confidence = candidate.confidence,
                            text = %candidate.text,
                            "candidate below confidence gate"
                        );
                        continue;
                    }
                    let category = candidate.category;
                    let fact = Fact::new(
                        candidate.text,
                        category,
                        candidate.confidence,
                        engine.name(),
                        source.clone(),
                    );
                    if let Some(InsertOutcome::Inserted { .. }) = self.write_fact(fact).await {
                        learned += 1;
                        self.count_learned(category, engine.name());
                    }
                }
            }

            if learned > 0 {
                info!(learned, "learned from utterance");
            }
            learned
        }
        .instrument(self.span.clone())
        .await
    }

    /// Learn in a detached task so the caller's reply is never delayed.
    pub fn spawn_learn(self: &Arc<Self>, utterance: String) -> JoinHandle<usize> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.learn_from_utterance(&utterance).await })
    }

    /// Store one fact and mirror it into the semantic index. Flush failures
    /// are logged and the in-memory outcome is used.
    async fn write_fact(&self, fact: Fact) -> Option<InsertOutcome> {
        let store = Arc::clone(&self.store);
        let outcome = match self.blocking(move || store.insert(fact)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(StoreError::Unflushed { outcome, source })) => {
                warn!(error = %source, "fact kept in memory but not persisted");
                outcome
            }
            Ok(Err(e)) => {
                debug!(error = %e, "fact rejected by store");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "fact store task failed");
                return None;
            }
        };

        if matches!(outcome, InsertOutcome::Inserted { .. } | InsertOutcome::Updated { .. }) {
            self.index_fact(outcome.id()).await;
        }
        Some(outcome)
    }

    async fn index_fact(&self, id: &str) {
        let Some(retriever) = self.retriever.clone() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        let indexed = self
            .blocking(move || match store.get(&id) {
                Some(fact) => retriever.index(&fact),
                None => Ok(()),
            })
            .await;
        match indexed {
            Ok(Ok(())) => {}
            Ok(Err(e)) | Err(e) => warn!(error = %e, "semantic indexing failed"),
        }
    }

    fn count_learned(&self, category: Category, engine: &str) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.learned += 1;
        *session
            .by_category
            .entry(category.as_str().to_string())
            .or_default() += 1;
        *session.by_engine.entry(engine.to_string()).or_default() += 1;
    }

    /// Context block for `query`, or an empty string when nothing is known.
    pub async fn get_context(&self, query: &str) -> String {
        async {
            let limit = self.policy.context_limit;

            if let Some(entries) = self.semantic_context(query, limit).await {
                return format_context(&entries);
            }

            let store = Arc::clone(&self.store);
            let owned = query.to_string();
            match self.blocking(move || store.search(&owned, limit)).await {
                Ok(facts) => {
                    debug!(hits = facts.len(), "keyword retrieval");
                    let entries: Vec<_> = facts.into_iter().map(|f| (f.category, f.text)).collect();
                    format_context(&entries)
                }
                Err(e) => {
                    warn!(error = %e, "keyword retrieval failed");
                    String::new()
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Semantic hits hydrated from the store, or `None` to fall back.
    async fn semantic_context(&self, query: &str, limit: usize) -> Option<Vec<(Category, String)>> {
        let retriever = self.retriever.clone()?;
        let store = Arc::clone(&self.store);
        let owned = query.to_string();
        let result = self
            .blocking(move || {
                let hits = retriever.search(&owned, limit)?;
                let ids: Vec<String> = hits.iter().map(|h| h.fact_id.clone()).collect();
                store.touch(&ids);
                Ok::<_, anyhow::Error>(
                    hits.into_iter()
                        .map(|hit| match store.get(&hit.fact_id) {
                            Some(fact) => (fact.category, fact.text),
                            None => (Category::parse_lenient(&hit.category), hit.text),
                        })
                        .collect::<Vec<_>>(),
                )
            })
            .await;

        match result {
            Ok(Ok(entries)) if !entries.is_empty() => {
                debug!(hits = entries.len(), "semantic retrieval");
                Some(entries)
            }
            Ok(Ok(_)) => {
                debug!("no semantic hits, falling back to keyword search");
                None
            }
            Ok(Err(e)) | Err(e) => {
                warn!(error = %e, "semantic retrieval failed, falling back to keyword search");
                None
            }
        }
    }

    pub fn stats(&self) -> MemorySnapshot {
        let _guard = self.span.enter();
        let facts = self.store.all();
        let mut stored_by_category = BTreeMap::new();
        for fact in &facts {
            *stored_by_category
                .entry(fact.category.as_str().to_string())
                .or_default() += 1;
        }

        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        MemorySnapshot {
            total_facts: facts.len(),
            learned_this_session: session.learned,
            by_category: session.by_category.clone(),
            by_engine: session.by_engine.clone(),
            stored_by_category,
            engines: self.engines.iter().map(|e| e.name().to_string()).collect(),
            retrieval_mode: if self.semantic_enabled() { "semantic" } else { "keyword" }.into(),
            semantic_enabled: self.semantic_enabled(),
            session_started_at: session.started_at.clone(),
            last_persist_error: self.store.last_persist_error(),
        }
    }

    /// Write every stored fact to `path` in the training export format.
    pub async fn export_training_data(&self, path: &Path) -> Result<ExportMetadata> {
        let store = Arc::clone(&self.store);
        let path = path.to_path_buf();
        self.blocking(move || export::write_export(&path, store.all()))
            .await?
    }

    /// Store a fact directly, bypassing extraction and the confidence gate.
    /// Goes through the same dedup path; not counted as learned this session.
    /// A flush failure is returned as a [`StoreError`] carrying the outcome.
    pub async fn remember_fact_manually(&self, text: &str, category: Category) -> Result<InsertOutcome> {
        async {
            let fact = Fact::new(text, category, 1.0, MANUAL_ENGINE, "");
            let store = Arc::clone(&self.store);
            let result = self.blocking(move || store.insert(fact)).await?;

            let outcome = match &result {
                Ok(outcome) => Some(outcome.clone()),
                Err(e) => e.outcome().cloned(),
            };
            if let Some(outcome) = &outcome {
                info!(outcome = ?outcome, "fact remembered manually");
                if matches!(outcome, InsertOutcome::Inserted { .. } | InsertOutcome::Updated { .. }) {
                    self.index_fact(outcome.id()).await;
                }
            }
            Ok::<_, anyhow::Error>(result?)
        }
        .instrument(self.span.clone())
        .await
    }
}

/// Bring the index in line with the store when their sizes disagree (first
/// run, model change, or a crash between store and index writes).
fn sync_index(index: &VectorIndex, store: &dyn FactStore) {
    let indexed = match index.len() {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "could not read semantic index size");
            return;
        }
    };
    if indexed == store.len() {
        return;
    }
    info!(indexed, stored = store.len(), "semantic index out of date, rebuilding");
    if let Err(e) = index.reindex(&store.all()) {
        warn!(error = %e, "semantic index rebuild failed");
    }
}

/// Render facts grouped by category in first-seen order.
pub fn format_context(entries: &[(Category, String)]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut groups: Vec<(Category, Vec<&str>)> = Vec::new();
    for (category, text) in entries {
        match groups.iter_mut().find(|(c, _)| c == category) {
            Some((_, texts)) => texts.push(text.as_str()),
            None => groups.push((*category, vec![text.as_str()])),
        }
    }

    let mut lines = vec![CONTEXT_HEADING.to_string()];
    for (category, texts) in groups {
        lines.push(format!("\n{}:", category.title()));
        lines.extend(texts.into_iter().map(|t| format!("  - {t}")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_is_empty_string() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn context_groups_in_first_seen_order() {
        let entries = vec![
            (Category::Preferences, "User loves pizza".to_string()),
            (Category::Identity, "User's name is Alex".to_string()),
            (Category::Preferences, "User prefers tea over coffee".to_string()),
        ];
        assert_eq!(
            format_context(&entries),
            "What I know about you:\n\
             \nPreferences:\n  - User loves pizza\n  - User prefers tea over coffee\n\
             \nIdentity:\n  - User's name is Alex"
        );
    }
}
