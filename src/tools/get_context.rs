//! MCP `get_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetContextParams {
    /// The new user message or topic to find relevant facts for.
    #[schemars(description = "The message or topic to retrieve remembered facts for")]
    pub query: String,
}
