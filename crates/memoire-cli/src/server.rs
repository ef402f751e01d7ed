//! MCP Server Core
//!
//! Handles the main MCP server logic: initialization handshake, tool
//! listing, and tool dispatch.

use std::collections::HashMap;
use std::str::FromStr;

use memoire_core::ToolName;
use tracing::{debug, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription, ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools::{self, AppState};

pub struct McpServer {
    state: AppState,
    initialized: bool,
}

impl McpServer {
    pub fn new(state: AppState) -> Self {
        Self { state, initialized: false }
    }

    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e),
        })
    }

    fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo { name: "memoire".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
            },
            instructions: Some(
                "Mémoire is a conversational-memory store. Use search_memory to recall past \
                 conversations, search_files when you need exact raw-text matches, and the \
                 knowledge tools to read or edit persistent Markdown notes."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = ToolName::ALL
            .iter()
            .map(|name| ToolDescription {
                name: name.canonical_name().to_string(),
                description: Some(tool_description(*name).to_string()),
                input_schema: tool_schema(*name),
            })
            .collect();

        serde_json::to_value(ListToolsResult { tools }).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing tool call parameters")),
        };

        let tool_name = ToolName::from_str(&request.name).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?;

        let result = dispatch(tool_name, &self.state, request.arguments).await;

        let call_result = match result {
            Ok(content) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string_pretty(&content).unwrap_or_else(|_| content.to_string()),
                }],
                is_error: Some(false),
            },
            Err(e) => CallToolResult {
                content: vec![ToolResultContent { content_type: "text".to_string(), text: serde_json::json!({ "error": e }).to_string() }],
                is_error: Some(true),
            },
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}

async fn dispatch(tool: ToolName, state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    match tool {
        ToolName::SearchMemory => tools::search_memory::execute(state, args).await,
        ToolName::SearchFiles => tools::search_files::execute(state, args).await,
        ToolName::ReadKnowledge => tools::read_knowledge::execute(state, args).await,
        ToolName::AppendKnowledge => tools::append_knowledge::execute(state, args).await,
        ToolName::UpdateKnowledge => tools::update_knowledge::execute(state, args).await,
        ToolName::ExploreLinks => tools::explore_links::execute(state, args).await,
        ToolName::InspectMemory => tools::inspect_memory::execute(state, args).await,
    }
}

fn tool_schema(tool: ToolName) -> serde_json::Value {
    match tool {
        ToolName::SearchMemory => tools::search_memory::schema(),
        ToolName::SearchFiles => tools::search_files::schema(),
        ToolName::ReadKnowledge => tools::read_knowledge::schema(),
        ToolName::AppendKnowledge => tools::append_knowledge::schema(),
        ToolName::UpdateKnowledge => tools::update_knowledge::schema(),
        ToolName::ExploreLinks => tools::explore_links::schema(),
        ToolName::InspectMemory => tools::inspect_memory::schema(),
    }
}

fn tool_description(tool: ToolName) -> &'static str {
    match tool {
        ToolName::SearchMemory => "Hybrid search over the conversational memory store.",
        ToolName::SearchFiles => "Raw regex search over fragment files.",
        ToolName::ReadKnowledge => "Read a persistent knowledge Markdown file.",
        ToolName::AppendKnowledge => "Append a paragraph to a knowledge file.",
        ToolName::UpdateKnowledge => "Replace one section's body in a knowledge file.",
        ToolName::ExploreLinks => "List the graph edges touching a segment.",
        ToolName::InspectMemory => "Coarse counts over the memory store.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(memoire_core::Store::open_in_memory().unwrap());
        let fragments_root = dir.path().join("fragments");
        std::fs::create_dir_all(&fragments_root).unwrap();
        let knowledge_dir = dir.path().join("knowledge");
        std::fs::create_dir_all(&knowledge_dir).unwrap();
        let hermes = Arc::new(memoire_core::Hermes::new(store.clone(), fragments_root.clone()));
        let sbire = Arc::new(memoire_core::Sbire::new(store.clone(), fragments_root.clone()));
        (AppState { store, hermes, sbire, knowledge_dir, fragments_root }, dir)
    }

    fn make_request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest { jsonrpc: "2.0".to_string(), id: Some(serde_json::json!(1)), method: method.to_string(), params }
    }

    #[tokio::test]
    async fn rejects_requests_before_initialize() {
        let (state, _dir) = state();
        let mut server = McpServer::new(state);
        let response = server.handle_request(make_request("tools/list", None)).await.unwrap();
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn lists_seven_tools_after_initialize() {
        let (state, _dir) = state();
        let mut server = McpServer::new(state);
        server.handle_request(make_request("initialize", None)).await;
        let response = server.handle_request(make_request("tools/list", None)).await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn calling_unknown_tool_errors() {
        let (state, _dir) = state();
        let mut server = McpServer::new(state);
        server.handle_request(make_request("initialize", None)).await;
        let response = server
            .handle_request(make_request("tools/call", Some(serde_json::json!({ "name": "nonexistent" }))))
            .await
            .unwrap();
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn inspect_memory_reports_zero_segments_on_fresh_store() {
        let (state, _dir) = state();
        let mut server = McpServer::new(state);
        server.handle_request(make_request("initialize", None)).await;
        let response = server
            .handle_request(make_request("tools/call", Some(serde_json::json!({ "name": "inspect_memory" }))))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], serde_json::json!(false));
    }
}
