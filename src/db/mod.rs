//! SQLite + sqlite-vec storage behind the semantic index.
//!
//! The fact file stays the source of truth; this database only mirrors fact
//! ids, text, and embeddings so nearest-neighbour lookups are cheap.

pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension for every connection opened afterwards.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the index database with the schema in place.
pub fn open_index_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open index database at {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::init_schema(&conn).context("failed to initialize index schema")?;

    tracing::debug!(path = %path.display(), "index database opened");
    Ok(conn)
}

/// In-memory index database, used by tests.
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize index schema")?;
    Ok(conn)
}

/// What `keepsake doctor` reports about the index database.
#[derive(Debug, Clone)]
pub struct IndexHealth {
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub indexed_facts: usize,
    pub vector_count: usize,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run `PRAGMA integrity_check` and collect index counts.
pub fn check_index_health(conn: &Connection) -> Result<IndexHealth> {
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let indexed_facts: i64 = conn.query_row("SELECT COUNT(*) FROM fact_index", [], |r| r.get(0))?;
    let vector_count: i64 = conn.query_row("SELECT COUNT(*) FROM fact_vec", [], |r| r.get(0))?;
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;

    Ok(IndexHealth {
        sqlite_vec_version,
        embedding_model: schema::get_embedding_model(conn)?,
        indexed_facts: indexed_facts as usize,
        vector_count: vector_count as usize,
        integrity_ok: integrity_details == "ok",
        integrity_details,
    })
}

/// View an f32 slice as the little-endian blob sqlite-vec expects.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// L2 distance between unit vectors whose cosine similarity is `cosine`.
pub fn cosine_to_l2(cosine: f64) -> f64 {
    (2.0 - 2.0 * cosine).max(0.0).sqrt()
}

/// Cosine similarity of unit vectors at L2 distance `distance`.
pub fn l2_to_cosine(distance: f64) -> f64 {
    1.0 - distance * distance / 2.0
}
