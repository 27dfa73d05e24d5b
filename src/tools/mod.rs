pub mod export_training_data;
pub mod get_context;
pub mod learn_from_utterance;
pub mod remember_fact;

use export_training_data::ExportParams;
use get_context::GetContextParams;
use learn_from_utterance::LearnParams;
use remember_fact::RememberFactParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::path::PathBuf;
use std::sync::Arc;

use crate::coordinator::MemoryCoordinator;
use crate::facts::{Category, StoreError};

/// The keepsake MCP tool handler. Every tool delegates to the shared
/// [`MemoryCoordinator`].
#[derive(Clone)]
pub struct KeepsakeTools {
    tool_router: ToolRouter<Self>,
    memory: Arc<MemoryCoordinator>,
    export_path: PathBuf,
}

#[tool_router]
impl KeepsakeTools {
    pub fn new(memory: Arc<MemoryCoordinator>, export_path: PathBuf) -> Self {
        Self {
            tool_router: Self::tool_router(),
            memory,
            export_path,
        }
    }

    #[tool(description = "Learn durable personal facts from a user message. Call once per user turn with the raw message.")]
    async fn learn_from_utterance(
        &self,
        Parameters(params): Parameters<LearnParams>,
    ) -> Result<String, String> {
        if params.utterance.trim().is_empty() {
            return Err("utterance must not be empty".into());
        }
        tracing::info!(chars = params.utterance.len(), background = ?params.background, "learn_from_utterance called");

        if params.background.unwrap_or(false) {
            self.memory.spawn_learn(params.utterance);
            return Ok(serde_json::json!({ "scheduled": true }).to_string());
        }

        let learned = self.memory.learn_from_utterance(&params.utterance).await;
        Ok(serde_json::json!({ "learned": learned }).to_string())
    }

    #[tool(description = "Get what is remembered about the user that is relevant to a message, formatted for a prompt. Empty when nothing relevant is known.")]
    async fn get_context(
        &self,
        Parameters(params): Parameters<GetContextParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "get_context called");
        let context = self.memory.get_context(&params.query).await;
        Ok(serde_json::json!({ "context": context }).to_string())
    }

    #[tool(description = "Remember a fact about the user directly, skipping extraction. Similar existing facts are updated rather than duplicated.")]
    async fn remember_fact(
        &self,
        Parameters(params): Parameters<RememberFactParams>,
    ) -> Result<String, String> {
        if params.text.trim().is_empty() {
            return Err("text must not be empty".into());
        }
        let category = params
            .category
            .as_deref()
            .map(Category::parse_lenient)
            .unwrap_or_default();
        tracing::info!(category = %category, "remember_fact called");

        let outcome = self
            .memory
            .remember_fact_manually(&params.text, category)
            .await
            .map_err(|e| match e.downcast_ref::<StoreError>() {
                Some(StoreError::Unflushed { outcome, .. }) => format!(
                    "fact {} ({}) but could not be saved to disk: {e}",
                    outcome.as_str(),
                    outcome.id()
                ),
                _ => format!("remember failed: {e}"),
            })?;

        Ok(serde_json::json!({
            "inserted": outcome.is_inserted(),
            "outcome": outcome.as_str(),
            "id": outcome.id(),
        })
        .to_string())
    }

    #[tool(description = "Memory statistics: total facts, facts learned this session by category and engine, retrieval mode.")]
    async fn memory_stats(&self) -> Result<String, String> {
        tracing::info!("memory_stats called");
        serde_json::to_string(&self.memory.stats()).map_err(|e| format!("serialization failed: {e}"))
    }

    #[tool(description = "Export every stored fact as JSON for fine-tuning.")]
    async fn export_training_data(
        &self,
        Parameters(params): Parameters<ExportParams>,
    ) -> Result<String, String> {
        let path = params
            .path
            .as_deref()
            .map(crate::config::expand_tilde)
            .unwrap_or_else(|| self.export_path.clone());
        tracing::info!(path = %path.display(), "export_training_data called");

        let metadata = self
            .memory
            .export_training_data(&path)
            .await
            .map_err(|e| format!("export failed: {e:#}"))?;
        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "metadata": metadata,
        })
        .to_string())
    }
}

#[tool_handler]
impl ServerHandler for KeepsakeTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "keepsake remembers personal facts about the user. Call learn_from_utterance \
                 with every user message and get_context before answering; use remember_fact \
                 when the user explicitly asks you to remember something."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
