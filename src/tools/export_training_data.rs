//! MCP `export_training_data` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExportParams {
    #[schemars(description = "Destination file. Defaults to storage.export_path from the config.")]
    pub path: Option<String>,
}
