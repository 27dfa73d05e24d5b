//! MCP `learn_from_utterance` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LearnParams {
    #[schemars(description = "The user's message, verbatim")]
    pub utterance: String,

    #[schemars(
        description = "Learn in the background and return immediately. Defaults to false (wait and report how many facts were learned)."
    )]
    pub background: Option<bool>,
}
