//! MCP tool parameter structs with schemars-derived JSON schemas.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HemisphereGraphParams {
    #[schemars(description = "The workshop ID")]
    pub workshop_id: String,
    #[schemars(description = "Run type, e.g. 'live' or 'rehearsal' (default: 'live')")]
    pub run_type: Option<String>,
}
