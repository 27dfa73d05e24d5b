use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KeepsakeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub extraction: ExtractionConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub facts_path: String,
    pub index_path: String,
    pub export_path: String,
    pub export_on_shutdown: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"local"` for the bundled ONNX model, `"none"` to run keyword-only.
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    pub pattern_enabled: bool,
    pub model_enabled: bool,
    /// Base URL of the Ollama server used for model-assisted extraction.
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Floor applied to model output before the coordinator's own gate.
    pub min_confidence: f64,
}

/// Tunables for the learn/retrieve policy.
///
/// `confidence_gate` and `similarity_threshold` pin the current behavior;
/// neither value has a documented derivation.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub confidence_gate: f64,
    pub similarity_threshold: f64,
    pub context_limit: usize,
    pub semantic_min_similarity: f64,
    pub source_excerpt_chars: usize,
}

impl Default for KeepsakeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            extraction: ExtractionConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8765,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_keepsake_dir();
        Self {
            facts_path: dir.join("facts.json").to_string_lossy().into_owned(),
            index_path: dir.join("semantic.db").to_string_lossy().into_owned(),
            export_path: dir.join("training_export.json").to_string_lossy().into_owned(),
            export_on_shutdown: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_keepsake_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pattern_enabled: true,
            model_enabled: true,
            endpoint: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 20,
            min_confidence: 0.85,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            confidence_gate: 0.85,
            similarity_threshold: 0.7,
            context_limit: 5,
            semantic_min_similarity: 0.25,
            source_excerpt_chars: 100,
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Returns `~/.keepsake/`, or `./.keepsake/` when no home directory is known.
pub fn default_keepsake_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".keepsake")
}

/// Returns the default config file path: `~/.keepsake/config.toml`
pub fn default_config_path() -> PathBuf {
    default_keepsake_dir().join("config.toml")
}

impl KeepsakeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            KeepsakeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (KEEPSAKE_FACTS, KEEPSAKE_LOG_LEVEL, KEEPSAKE_MODEL_ENDPOINT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KEEPSAKE_FACTS") {
            self.storage.facts_path = val;
        }
        if let Ok(val) = std::env::var("KEEPSAKE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("KEEPSAKE_MODEL_ENDPOINT") {
            self.extraction.endpoint = val;
        }
    }

    pub fn resolved_facts_path(&self) -> PathBuf {
        expand_tilde(&self.storage.facts_path)
    }

    pub fn resolved_index_path(&self) -> PathBuf {
        expand_tilde(&self.storage.index_path)
    }

    pub fn resolved_export_path(&self) -> PathBuf {
        expand_tilde(&self.storage.export_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
