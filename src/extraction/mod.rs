//! Extraction engines: turn one utterance into candidate facts.
//!
//! [`PatternExtractor`] is the always-available baseline.
//! [`ModelAssistedExtractor`] asks a language model and degrades to nothing
//! when the model is unreachable. Both share [`filter::prefilter`].

pub mod completion;
pub mod filter;
pub mod model;
pub mod patterns;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ExtractionConfig;
use crate::facts::CandidateFact;

pub use completion::{CompletionService, OllamaClient};
pub use model::ModelAssistedExtractor;
pub use patterns::PatternExtractor;

#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Short identifier recorded as a fact's `source_engine`.
    fn name(&self) -> &'static str;

    async fn extract(&self, utterance: &str) -> Result<Vec<CandidateFact>>;
}

/// Build the engines enabled in `config`, pattern first.
pub fn build_engines(config: &ExtractionConfig) -> Result<Vec<Arc<dyn ExtractionEngine>>> {
    let mut engines: Vec<Arc<dyn ExtractionEngine>> = Vec::new();
    if config.pattern_enabled {
        engines.push(Arc::new(PatternExtractor::new()));
    }
    if config.model_enabled {
        let client = OllamaClient::new(config)?;
        engines.push(Arc::new(ModelAssistedExtractor::new(
            Arc::new(client),
            config.timeout(),
            config.min_confidence,
        )));
    }
    if engines.is_empty() {
        tracing::warn!("all extraction engines disabled, nothing will be learned");
    }
    Ok(engines)
}
