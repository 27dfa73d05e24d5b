//! MCP `remember_fact` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RememberFactParams {
    #[schemars(description = "The fact, phrased about the user, e.g. \"User's sister is named Maya\"")]
    pub text: String,

    /// Unknown labels are stored as `other`.
    #[schemars(
        description = "Category: identity, interests, preferences, relationships, events, goals, routines, other. Defaults to other."
    )]
    pub category: Option<String>,
}
