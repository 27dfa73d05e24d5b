//! Sentence embeddings for the semantic index.
//!
//! [`EmbeddingProvider`] turns a fact or query into an L2-normalized vector.
//! The only backend is a local all-MiniLM-L6-v2 ONNX model; `provider = "none"`
//! turns semantic retrieval off for the whole process.

pub mod local;

use anyhow::Result;

/// Output width of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Embeds text into unit-length vectors of [`EMBEDDING_DIM`] floats.
///
/// Calls are synchronous and CPU-bound; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Identifier stored alongside the index so a model swap is detectable.
    fn model_id(&self) -> &str;
}

/// Build the configured provider. `Ok(None)` means semantic retrieval is
/// switched off by configuration.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Option<Box<dyn EmbeddingProvider>>> {
    match config.provider.as_str() {
        "local" => Ok(Some(Box::new(local::LocalEmbeddingProvider::new(config)?))),
        "none" => Ok(None),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, none"),
    }
}

/// Cosine similarity of two vectors. Zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    #[test]
    fn none_provider_disables_embeddings() {
        let config = EmbeddingConfig {
            provider: "none".into(),
            ..Default::default()
        };
        assert!(create_provider(&config).unwrap().is_none());
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }

    #[test]
    fn local_provider_without_model_files_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            provider: "local".into(),
            cache_dir: tmp.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("keepsake model download"));
    }

    #[test]
    fn cosine_of_orthogonal_and_identical() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
