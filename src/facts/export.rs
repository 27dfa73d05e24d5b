//! Training-data export consumed by downstream fine-tuning tooling.
//!
//! The document is `{"metadata": {...}, "facts": [Fact, ...]}`. Fact field
//! names come straight from [`Fact`]'s serde layout and must stay stable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::persist::write_json_atomic;
use super::types::{now_timestamp, Fact};

/// Format tag identifying this export layout.
pub const EXPORT_FORMAT: &str = "keepsake_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub exported_at: String,
    pub total_facts: usize,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExport {
    pub metadata: ExportMetadata,
    pub facts: Vec<Fact>,
}

/// Write `facts` to `path` as a training export. Returns the metadata written.
pub fn write_export(path: &Path, facts: Vec<Fact>) -> Result<ExportMetadata> {
    let metadata = ExportMetadata {
        exported_at: now_timestamp(),
        total_facts: facts.len(),
        format: EXPORT_FORMAT.to_string(),
    };
    let export = TrainingExport {
        metadata: metadata.clone(),
        facts,
    };
    write_json_atomic(path, &export)
        .with_context(|| format!("failed to export training data to {}", path.display()))?;
    tracing::info!(path = %path.display(), facts = metadata.total_facts, "training data exported");
    Ok(metadata)
}

/// Read a training export back.
pub fn read_export(path: &Path) -> Result<TrainingExport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read export {}", path.display()))?;
    serde_json::from_str(&raw).context("failed to parse training export")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::types::Category;
    use tempfile::TempDir;

    #[test]
    fn export_has_stable_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let fact = Fact::new("User's name is Alex", Category::Identity, 0.95, "pattern", "My name is Alex");

        write_export(&path, vec![fact]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["format"], EXPORT_FORMAT);
        assert_eq!(value["metadata"]["total_facts"], 1);
        assert!(value["metadata"]["exported_at"].is_string());

        let record = &value["facts"][0];
        for field in [
            "id",
            "text",
            "category",
            "confidence",
            "created_at",
            "last_accessed_at",
            "access_count",
            "source_engine",
            "source_utterance",
        ] {
            assert!(record.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(record["category"], "identity");
    }

    #[test]
    fn read_back_matches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let facts = vec![
            Fact::new("User likes tea", Category::Preferences, 0.9, "model", ""),
            Fact::new("User lives in Oslo", Category::Identity, 0.9, "pattern", ""),
        ];

        let metadata = write_export(&path, facts.clone()).unwrap();
        let export = read_export(&path).unwrap();
        assert_eq!(export.metadata, metadata);
        assert_eq!(export.facts, facts);
    }

    #[test]
    fn confidence_survives_at_full_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let mut facts = Vec::new();
        let mut confidence = 0.8765432101234567_f64;
        for i in 0..500 {
            facts.push(Fact::new(format!("User fact {i}"), Category::Other, confidence, "model", ""));
            // Walk through awkward decimal expansions in [0.85, 1.0).
            confidence = 0.85 + ((confidence - 0.85) * 7.123456789 + 0.0137).fract() * 0.15;
        }

        write_export(&path, facts.clone()).unwrap();
        let export = read_export(&path).unwrap();
        for (written, read) in facts.iter().zip(&export.facts) {
            assert_eq!(written.confidence.to_bits(), read.confidence.to_bits(), "{}", written.text);
        }
        assert_eq!(export.facts[0].confidence, 0.8765432101234567);
    }

    #[test]
    fn read_missing_export_errors() {
        let dir = TempDir::new().unwrap();
        assert!(read_export(&dir.path().join("nope.json")).is_err());
    }
}
