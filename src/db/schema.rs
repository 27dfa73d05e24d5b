//! DDL for the semantic index: `fact_index` (fact text by id), `fact_vec`
//! (vec0 embeddings), and `index_meta` (key/value settings such as the
//! embedding model).

use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fact_index (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    category TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual tables need their own statement.
const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS fact_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[384]
);
"#;

/// Create all tables. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(VEC_TABLE_SQL)?;
    Ok(())
}

/// The embedding model the stored vectors were produced with, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('embedding_model', ?1)",
        params![model],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn creates_index_tables() {
        let conn = conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"fact_index".to_string()));
        assert!(tables.contains(&"fact_vec".to_string()));
        assert!(tables.contains(&"index_meta".to_string()));
    }

    #[test]
    fn init_is_idempotent() {
        let conn = conn();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn embedding_model_round_trips() {
        let conn = conn();
        assert_eq!(get_embedding_model(&conn).unwrap(), None);
        set_embedding_model(&conn, "all-MiniLM-L6-v2").unwrap();
        set_embedding_model(&conn, "other-model").unwrap();
        assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("other-model"));
    }
}
