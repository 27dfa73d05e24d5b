//! Embedding-backed retrieval over stored facts.
//!
//! [`ContextRetriever`] is optional: when no embedding backend can be built at
//! startup the coordinator runs with keyword search only for the life of the
//! process.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::config::KeepsakeConfig;
use crate::db::{self, embedding_to_bytes, schema};
use crate::embedding::{self, EmbeddingProvider};
use crate::facts::types::now_timestamp;
use crate::facts::Fact;

/// A fact returned by similarity search. Text and category are as indexed and
/// may lag behind the store after an in-place update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticHit {
    pub fact_id: String,
    pub text: String,
    pub category: String,
    pub similarity: f64,
}

/// Similarity search over indexed facts. Implementations are synchronous;
/// async callers use `spawn_blocking`.
pub trait ContextRetriever: Send + Sync {
    /// Add or refresh one fact.
    fn index(&self, fact: &Fact) -> Result<()>;

    /// Nearest facts to `query`, best first, at most `limit`.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticHit>>;
}

const REINDEX_BATCH: usize = 32;

/// sqlite-vec index over sentence embeddings.
pub struct VectorIndex {
    conn: Mutex<Connection>,
    provider: Box<dyn EmbeddingProvider>,
    min_similarity: f64,
}

impl VectorIndex {
    /// Wrap an open index database. Vectors from a different embedding model
    /// are dropped, leaving the index empty until [`VectorIndex::reindex`].
    pub fn open(
        conn: Connection,
        provider: Box<dyn EmbeddingProvider>,
        min_similarity: f64,
    ) -> Result<Self> {
        let stored = schema::get_embedding_model(&conn)?;
        let current = provider.model_id().to_string();
        if stored.as_deref() != Some(current.as_str()) {
            if let Some(previous) = &stored {
                tracing::warn!(previous = %previous, current = %current, "embedding model changed, clearing index");
            }
            clear(&conn)?;
            schema::set_embedding_model(&conn, &current)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            provider,
            min_similarity,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))
    }

    /// Number of indexed facts.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fact_index", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every vector and index `facts` from scratch. Returns the count indexed.
    pub fn reindex(&self, facts: &[Fact]) -> Result<usize> {
        self.reindex_with_progress(facts, |_| {})
    }

    /// [`VectorIndex::reindex`], calling `progress` with the size of each
    /// embedded batch. The rebuild is one transaction.
    pub fn reindex_with_progress(
        &self,
        facts: &[Fact],
        mut progress: impl FnMut(usize),
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        clear(&tx)?;
        for chunk in facts.chunks(REINDEX_BATCH) {
            let texts: Vec<&str> = chunk.iter().map(|f| f.text.as_str()).collect();
            let embeddings = self
                .provider
                .embed_batch(&texts)
                .context("failed to embed facts for reindex")?;
            for (fact, embedding) in chunk.iter().zip(&embeddings) {
                write_entry(&tx, fact, embedding)?;
            }
            progress(chunk.len());
        }
        tx.commit()?;

        tracing::info!(facts = facts.len(), "semantic index rebuilt");
        Ok(facts.len())
    }
}

impl ContextRetriever for VectorIndex {
    fn index(&self, fact: &Fact) -> Result<()> {
        let embedding = self.provider.embed(&fact.text)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_entry(&tx, fact, &embedding)?;
        tx.commit()?;
        tracing::debug!(id = %fact.id, "fact indexed");
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticHit>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.provider.embed(query)?;
        let max_distance = db::cosine_to_l2(self.min_similarity);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT v.id, v.distance, f.text, f.category \
             FROM (SELECT id, distance FROM fact_vec \
                   WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2) v \
             JOIN fact_index f ON f.id = v.id \
             ORDER BY v.distance",
        )?;
        let rows = stmt
            .query_map(params![embedding_to_bytes(&embedding), limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter(|(_, distance, _, _)| *distance <= max_distance)
            .map(|(fact_id, distance, text, category)| SemanticHit {
                fact_id,
                text,
                category,
                similarity: db::l2_to_cosine(distance),
            })
            .collect())
    }
}

fn clear(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM fact_vec", [])?;
    conn.execute("DELETE FROM fact_index", [])?;
    Ok(())
}

/// Upsert one fact. vec0 has no REPLACE, so the old row is deleted first.
fn write_entry(conn: &Connection, fact: &Fact, embedding: &[f32]) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM fact_vec WHERE id = ?1", params![fact.id])?;
    conn.execute(
        "INSERT OR REPLACE INTO fact_index (id, text, category, indexed_at) VALUES (?1, ?2, ?3, ?4)",
        params![fact.id, fact.text, fact.category.as_str(), now_timestamp()],
    )?;
    conn.execute(
        "INSERT INTO fact_vec (id, embedding) VALUES (?1, ?2)",
        params![fact.id, embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

/// Build the semantic index from config, or `None` when embeddings are off or
/// the backend cannot start. Failures are logged, never fatal.
pub fn open_semantic_index(config: &KeepsakeConfig) -> Option<VectorIndex> {
    let provider = match embedding::create_provider(&config.embedding) {
        Ok(Some(provider)) => provider,
        Ok(None) => {
            tracing::info!("embeddings disabled, using keyword retrieval");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "embedding backend unavailable, using keyword retrieval");
            return None;
        }
    };

    let path = config.resolved_index_path();
    let opened = db::open_index_database(&path)
        .and_then(|conn| VectorIndex::open(conn, provider, config.memory.semantic_min_similarity));
    match opened {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "semantic index unavailable, using keyword retrieval");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EMBEDDING_DIM;
    use crate::facts::Category;

    /// Bag-of-words hashing embedder: texts sharing words land close together.
    struct HashingEmbedder {
        model: &'static str,
    }

    impl EmbeddingProvider for HashingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; EMBEDDING_DIM];
            for word in text.to_lowercase().split_whitespace() {
                let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                let bucket = word
                    .bytes()
                    .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                v[bucket % EMBEDDING_DIM] += 1.0;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                v.iter_mut().for_each(|x| *x /= norm);
            }
            Ok(v)
        }

        fn model_id(&self) -> &str {
            self.model
        }
    }

    fn index_with(conn: Connection, model: &'static str) -> VectorIndex {
        VectorIndex::open(conn, Box::new(HashingEmbedder { model }), 0.5).unwrap()
    }

    fn index() -> VectorIndex {
        index_with(db::open_memory_database().unwrap(), "hash")
    }

    fn fact(text: &str, category: Category) -> Fact {
        Fact::new(text, category, 0.9, "pattern", "")
    }

    #[test]
    fn nearest_fact_ranks_first() {
        let idx = index();
        let pizza = fact("User's favorite food is pizza", Category::Preferences);
        let dog = fact("User's dog is named Rex", Category::Relationships);
        idx.index(&pizza).unwrap();
        idx.index(&dog).unwrap();

        let hits = idx.search("favorite food pizza", 5).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].fact_id, pizza.id);
        assert_eq!(hits[0].category, "preferences");
        assert!(hits[0].similarity > 0.5);
    }

    #[test]
    fn unrelated_hits_are_dropped() {
        let idx = index();
        idx.index(&fact("User lives in Oslo", Category::Identity)).unwrap();
        let hits = idx.search("quantum chromodynamics lecture", 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn reindexing_a_fact_replaces_it() {
        let idx = index();
        let mut f = fact("User likes tea", Category::Preferences);
        idx.index(&f).unwrap();
        f.text = "User likes green tea in the morning".into();
        idx.index(&f).unwrap();

        assert_eq!(idx.len().unwrap(), 1);
        let hits = idx.search("green tea morning", 5).unwrap();
        assert_eq!(hits[0].text, "User likes green tea in the morning");
    }

    #[test]
    fn reindex_rebuilds_from_facts() {
        let idx = index();
        idx.index(&fact("stale entry", Category::Other)).unwrap();
        let facts = vec![
            fact("User works as a nurse", Category::Identity),
            fact("User's sister is Maya", Category::Relationships),
        ];

        assert_eq!(idx.reindex(&facts).unwrap(), 2);
        assert_eq!(idx.len().unwrap(), 2);
        assert!(idx.search("stale entry", 5).unwrap().iter().all(|h| h.text != "stale entry"));
    }

    #[test]
    fn model_change_clears_vectors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("semantic.db");

        let first = index_with(db::open_index_database(&path).unwrap(), "model-a");
        first.index(&fact("User likes jazz", Category::Preferences)).unwrap();
        drop(first);

        let same = index_with(db::open_index_database(&path).unwrap(), "model-a");
        assert_eq!(same.len().unwrap(), 1);
        drop(same);

        let swapped = index_with(db::open_index_database(&path).unwrap(), "model-b");
        assert!(swapped.is_empty().unwrap());
    }

    #[test]
    fn blank_query_returns_nothing() {
        let idx = index();
        idx.index(&fact("User likes tea", Category::Preferences)).unwrap();
        assert!(idx.search("   ", 5).unwrap().is_empty());
    }

    #[test]
    fn disabled_provider_means_no_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = KeepsakeConfig::default();
        config.embedding.provider = "none".into();
        config.storage.index_path = tmp.path().join("semantic.db").to_string_lossy().into_owned();
        assert!(open_semantic_index(&config).is_none());
    }
}
