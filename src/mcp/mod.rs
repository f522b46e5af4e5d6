//! MCP server for Hemisphere. Exposes graph builds over the Model Context
//! Protocol.
//!
//! Tools: `hemisphere_graph`, `list_workshops`.

pub mod params;

use crate::api::{HemisphereApi, HemisphereResponse, DEFAULT_RUN_TYPE};
use params::*;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(msg: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg)]))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("serialization failed: {}", e))
}

// ---------------------------------------------------------------------------
// HemisphereMcpServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct HemisphereMcpServer {
    api: HemisphereApi,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl HemisphereMcpServer {
    pub fn new(api: HemisphereApi) -> Self {
        Self {
            api,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Build the cross-participant insight graph for a workshop run, with its ranked drivers and core truth sentence")]
    async fn hemisphere_graph(
        &self,
        Parameters(p): Parameters<HemisphereGraphParams>,
    ) -> Result<CallToolResult, McpError> {
        let run_type = p.run_type.as_deref().unwrap_or(DEFAULT_RUN_TYPE);
        let response = self.api.hemisphere_graph(&p.workshop_id, run_type).await;
        match (to_json(&response), &response) {
            (Ok(json), HemisphereResponse::Ok(_)) => ok_text(json),
            (Ok(json), HemisphereResponse::Err(_)) => err_text(json),
            (Err(e), _) => err_text(e),
        }
    }

    #[tool(description = "List workshop runs that have completed sessions")]
    fn list_workshops(&self) -> Result<CallToolResult, McpError> {
        match self.api.list_workshops() {
            Ok(workshops) => match to_json(&workshops) {
                Ok(json) => ok_text(json),
                Err(e) => err_text(e),
            },
            Err(e) => err_text(e.to_string()),
        }
    }
}

#[tool_handler]
impl ServerHandler for HemisphereMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Hemisphere MCP server: builds insight graphs from workshop interview data".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run_mcp_server(api: HemisphereApi) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to create tokio runtime");
            return 1;
        }
    };

    rt.block_on(async {
        let server = HemisphereMcpServer::new(api);

        tracing::info!("hemisphere mcp server starting on stdio");

        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to start MCP server");
                return 1;
            }
        };

        if let Err(e) = service.waiting().await {
            tracing::error!(error = %e, "MCP server error");
            return 1;
        }

        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::GraphAssembler;
    use crate::storage::{MemorySource, SessionRecords, WorkshopRecords};
    use std::sync::Arc;

    fn server() -> HemisphereMcpServer {
        let workshop = WorkshopRecords {
            workshop_id: "w1".to_string(),
            run_type: DEFAULT_RUN_TYPE.to_string(),
            sessions: vec![SessionRecords {
                session_id: "S1".to_string(),
                ..Default::default()
            }],
        };
        let source = Arc::new(MemorySource::new().with_workshop(workshop));
        HemisphereMcpServer::new(HemisphereApi::new(source, Arc::new(GraphAssembler::offline())))
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn hemisphere_graph_defaults_run_type() {
        let result = server()
            .hemisphere_graph(Parameters(HemisphereGraphParams {
                workshop_id: "w1".to_string(),
                run_type: None,
            }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        let value: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["runType"], "live");
    }

    #[tokio::test]
    async fn unknown_workshop_is_tool_error() {
        let result = server()
            .hemisphere_graph(Parameters(HemisphereGraphParams {
                workshop_id: "nope".to_string(),
                run_type: Some("live".to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("\"ok\": false"));
    }

    #[test]
    fn list_workshops_returns_json() {
        let result = server().list_workshops().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(value[0]["workshopId"], "w1");
        assert_eq!(value[0]["sessionCount"], 1);
    }
}
