//! Durable fact collection backed by a single JSON document.
//!
//! [`JsonFactStore`] keeps every fact in memory behind one mutex and rewrites
//! the whole file after each mutation. Loading never fails: a missing,
//! unreadable or malformed file yields an empty store (a malformed file is
//! copied to `<file>.bak` first so hand edits survive the next flush).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::persist::{write_json_atomic, PersistError};
use super::similarity::is_similar;
use super::synonyms::expand_query;
use super::types::{clamp_confidence, now_timestamp, Fact};

/// Version written into the fact file's metadata block.
pub const FACT_FILE_VERSION: u32 = 1;

/// What `insert` did with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No similar fact existed; the candidate was appended.
    Inserted { id: String },
    /// A similar, less specific fact was overwritten by the candidate.
    Updated { id: String },
    /// A similar fact at least as specific already exists; nothing changed.
    Duplicate { id: String },
}

impl InsertOutcome {
    /// `true` only for a newly appended fact.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::Updated { .. } => "updated",
            Self::Duplicate { .. } => "duplicate",
        }
    }

    /// ID of the stored fact the outcome refers to.
    pub fn id(&self) -> &str {
        match self {
            Self::Inserted { id } | Self::Updated { id } | Self::Duplicate { id } => id,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fact text must not be empty")]
    EmptyText,
    /// The in-memory store was changed but the flush to disk failed.
    #[error("fact store changed in memory ({outcome:?}) but was not persisted: {source}")]
    Unflushed {
        outcome: InsertOutcome,
        #[source]
        source: PersistError,
    },
}

impl StoreError {
    /// The in-memory outcome, when the error happened after the mutation.
    pub fn outcome(&self) -> Option<&InsertOutcome> {
        match self {
            Self::Unflushed { outcome, .. } => Some(outcome),
            Self::EmptyText => None,
        }
    }
}

/// Durable, queryable collection of facts.
pub trait FactStore: Send + Sync {
    /// Duplicate-aware insert. See [`InsertOutcome`].
    fn insert(&self, fact: Fact) -> Result<InsertOutcome, StoreError>;

    /// Keyword search with synonym expansion. Bumps access stats of every hit.
    /// An empty query returns the most recent facts without side effects.
    ///
    /// Access stats are best-effort: if flushing the bump fails, the hits are
    /// still returned, the failure is logged, and it is reported through
    /// [`FactStore::last_persist_error`]. Only `insert` returns flush errors.
    fn search(&self, query: &str, limit: usize) -> Vec<Fact>;

    /// Every stored fact, in insertion order.
    fn all(&self) -> Vec<Fact>;

    fn get(&self, id: &str) -> Option<Fact>;

    /// Record a retrieval hit for each id that exists, as `search` does,
    /// with the same best-effort flush.
    fn touch(&self, ids: &[String]);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message of the most recent failed flush, cleared by the next success.
    fn last_persist_error(&self) -> Option<String>;
}

/// On-disk layout: a metadata block plus the fact array.
#[derive(Debug, Serialize)]
struct FactFile<'a> {
    metadata: FileMetadata,
    facts: &'a [Fact],
}

#[derive(Debug, Serialize)]
struct FileMetadata {
    version: u32,
    updated_at: Option<String>,
    total_facts: usize,
}

/// Loose read-side view so one bad record does not discard the whole file.
#[derive(Debug, Deserialize)]
struct RawFactFile {
    #[serde(default)]
    facts: Vec<serde_json::Value>,
}

struct StoreState {
    facts: Vec<Fact>,
    last_error: Option<String>,
}

/// [`FactStore`] persisted as one JSON document, rewritten wholesale.
pub struct JsonFactStore {
    path: PathBuf,
    similarity_threshold: f64,
    state: Mutex<StoreState>,
}

impl JsonFactStore {
    /// Load the store at `path`. Never fails; see module docs.
    pub fn open(path: impl AsRef<Path>, similarity_threshold: f64) -> Self {
        let path = path.as_ref().to_path_buf();
        let facts = load_facts(&path);
        info!(path = %path.display(), facts = facts.len(), "fact store loaded");
        Self {
            path,
            similarity_threshold,
            state: Mutex::new(StoreState {
                facts,
                last_error: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump access stats of the facts at `hits` and flush. A failed flush is
    /// recorded but not returned; access stats are best-effort.
    fn record_access(&self, state: &mut StoreState, hits: &[usize]) {
        if hits.is_empty() {
            return;
        }
        let now = now_timestamp();
        for &idx in hits {
            let fact = &mut state.facts[idx];
            fact.access_count = fact.access_count.saturating_add(1);
            fact.last_accessed_at = Some(now.clone());
        }
        if let Err(e) = self.persist(state) {
            warn!(error = %e, hits = hits.len(), "access stats kept in memory but not persisted");
        }
    }

    /// Flush the whole collection, recording the failure for stats.
    fn persist(&self, state: &mut StoreState) -> Result<(), PersistError> {
        let file = FactFile {
            metadata: FileMetadata {
                version: FACT_FILE_VERSION,
                updated_at: Some(now_timestamp()),
                total_facts: state.facts.len(),
            },
            facts: &state.facts,
        };
        match write_json_atomic(&self.path, &file) {
            Ok(()) => {
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fact store flush failed");
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl FactStore for JsonFactStore {
    fn insert(&self, mut fact: Fact) -> Result<InsertOutcome, StoreError> {
        fact.text = fact.text.trim().to_string();
        if fact.text.is_empty() {
            return Err(StoreError::EmptyText);
        }
        fact.confidence = clamp_confidence(fact.confidence);
        if fact.id.is_empty() {
            fact.id = uuid::Uuid::now_v7().to_string();
        }
        if fact.created_at.is_empty() {
            fact.created_at = now_timestamp();
        }

        let mut state = self.lock();
        let similar = state
            .facts
            .iter()
            .position(|existing| is_similar(&existing.text, &fact.text, self.similarity_threshold));

        let outcome = match similar {
            Some(idx) => {
                let existing = &mut state.facts[idx];
                if fact.text.chars().count() <= existing.text.chars().count() {
                    debug!(existing = %existing.text, candidate = %fact.text, "duplicate fact dropped");
                    return Ok(InsertOutcome::Duplicate {
                        id: existing.id.clone(),
                    });
                }
                debug!(old = %existing.text, new = %fact.text, "fact replaced by more specific text");
                existing.text = fact.text;
                existing.created_at = fact.created_at;
                existing.confidence = fact.confidence;
                existing.category = fact.category;
                existing.source_engine = fact.source_engine;
                existing.source_utterance = fact.source_utterance;
                InsertOutcome::Updated {
                    id: existing.id.clone(),
                }
            }
            None => {
                let id = fact.id.clone();
                state.facts.push(fact);
                InsertOutcome::Inserted { id }
            }
        };

        self.persist(&mut state)
            .map_err(|source| StoreError::Unflushed {
                outcome: outcome.clone(),
                source,
            })?;
        Ok(outcome)
    }

    fn search(&self, query: &str, limit: usize) -> Vec<Fact> {
        let tokens = expand_query(query);
        let mut state = self.lock();

        if tokens.is_empty() {
            return most_recent(&state.facts, limit);
        }

        let mut hits: Vec<usize> = state
            .facts
            .iter()
            .enumerate()
            .filter(|(_, fact)| {
                let text = fact.text.to_lowercase();
                tokens.iter().any(|token| text.contains(token.as_str()))
            })
            .map(|(idx, _)| idx)
            .collect();

        let facts = &state.facts;
        hits.sort_by(|&a, &b| {
            facts[b]
                .access_count
                .cmp(&facts[a].access_count)
                .then_with(|| facts[b].created_at.cmp(&facts[a].created_at))
        });
        hits.truncate(limit);

        self.record_access(&mut state, &hits);
        hits.iter().map(|&idx| state.facts[idx].clone()).collect()
    }

    fn touch(&self, ids: &[String]) {
        let mut state = self.lock();
        let hits: Vec<usize> = ids
            .iter()
            .filter_map(|id| state.facts.iter().position(|f| &f.id == id))
            .collect();
        self.record_access(&mut state, &hits);
    }

    fn all(&self) -> Vec<Fact> {
        self.lock().facts.clone()
    }

    fn get(&self, id: &str) -> Option<Fact> {
        self.lock().facts.iter().find(|f| f.id == id).cloned()
    }

    fn len(&self) -> usize {
        self.lock().facts.len()
    }

    fn last_persist_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }
}

fn most_recent(facts: &[Fact], limit: usize) -> Vec<Fact> {
    let mut recent: Vec<&Fact> = facts.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.into_iter().take(limit).cloned().collect()
}

/// Read the fact file, failing open to an empty collection.
fn load_facts(path: &Path) -> Vec<Fact> {
    if !path.exists() {
        info!(path = %path.display(), "no fact file yet, starting empty");
        return Vec::new();
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fact file unreadable, starting empty");
            return Vec::new();
        }
    };

    let file: RawFactFile = match serde_json::from_str(&raw) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fact file malformed, starting empty");
            backup_malformed(path);
            return Vec::new();
        }
    };

    let now = now_timestamp();
    file.facts
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value::<Fact>(value) {
            Ok(fact) => Some(fact),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping unreadable fact record");
                None
            }
        })
        .filter_map(|mut fact| {
            fact.text = fact.text.trim().to_string();
            if fact.text.is_empty() {
                return None;
            }
            fact.confidence = clamp_confidence(fact.confidence);
            if fact.id.is_empty() {
                fact.id = uuid::Uuid::now_v7().to_string();
            }
            if fact.created_at.is_empty() {
                fact.created_at = now.clone();
            }
            Some(fact)
        })
        .collect()
}

fn backup_malformed(path: &Path) {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    let backup = path.with_file_name(name);
    match std::fs::copy(path, &backup) {
        Ok(_) => info!(backup = %backup.display(), "malformed fact file backed up"),
        Err(e) => warn!(error = %e, "could not back up malformed fact file"),
    }
}
