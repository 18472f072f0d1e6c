//! JSON-RPC method dispatch onto the [`Gateway`].

use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, McpPromptGet, McpResourceRead, McpToolCall,
    McpToolDefinition, McpToolResult, PROTOCOL_VERSION, error_codes,
};
use crate::gateway::Gateway;
use crate::middleware::DEFAULT_SOURCE;
use crate::version::{PKG_VERSION, SERVER_NAME};
use crate::{R2rError, prompts, resources};

const INSTRUCTIONS: &str = "Tools for searching, querying and managing an R2R knowledge base. \
Use `search` or `smart_collection_search` to find passages, `rag` for generated answers, and \
the document, collection, conversation and graph tools for management. \
`get_performance_stats` reports middleware statistics.";

/// Handles one MCP session.
///
/// The client name sent with `initialize` becomes the rate-limit source
/// for every later call in the session.
pub struct McpHandler {
    gateway: Arc<Gateway>,
    client_name: RwLock<Option<String>>,
}

impl McpHandler {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            client_name: RwLock::new(None),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Source identifier for invocations from this session.
    pub fn source(&self) -> String {
        self.client_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string())
    }

    /// Parse and handle one line of input.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                error_codes::PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
        }
    }

    /// Handle a request. Notifications produce no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification received");
            return None;
        };
        let id = Some(id);
        let params = request.params.unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize(&params)),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.list_tools()),
            "tools/call" => match parse_params::<McpToolCall>(params) {
                Ok(call) => self.call_tool(id, call).await,
                Err(e) => e.into_response(id),
            },
            "resources/list" => JsonRpcResponse::success(
                id,
                json!({"resources": resources::static_resources()}),
            ),
            "resources/templates/list" => JsonRpcResponse::success(
                id,
                json!({"resourceTemplates": resources::templates()}),
            ),
            "resources/read" => match parse_params::<McpResourceRead>(params) {
                Ok(read) => self.read_resource(id, read).await,
                Err(e) => e.into_response(id),
            },
            "prompts/list" => JsonRpcResponse::success(id, json!({"prompts": prompts::list()})),
            "prompts/get" => match parse_params::<McpPromptGet>(params) {
                Ok(get) => self.get_prompt(id, get).await,
                Err(e) => e.into_response(id),
            },
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn initialize(&self, params: &Value) -> Value {
        if let Some(name) = params.pointer("/clientInfo/name").and_then(Value::as_str) {
            info!(client = name, "client initialized");
            *self
                .client_name
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
        }
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {"listChanged": false},
                "resources": {"subscribe": false, "listChanged": false},
                "prompts": {"listChanged": false},
            },
            "serverInfo": {"name": SERVER_NAME, "version": PKG_VERSION},
            "instructions": INSTRUCTIONS,
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<McpToolDefinition> = self
            .gateway
            .tools()
            .iter()
            .map(|tool| McpToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, id: Option<Value>, call: McpToolCall) -> JsonRpcResponse {
        let result = self
            .gateway
            .call_tool(&call.name, call.arguments, &self.source())
            .await;
        let tool_result = match result {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => McpToolResult::text(text),
                Err(e) => McpToolResult::error(e.to_string()),
            },
            Err(R2rError::NotFound(message)) => {
                return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, message);
            }
            Err(e @ R2rError::RateLimitExceeded { .. }) => return e.into_response(id),
            Err(e) => McpToolResult::error(e.to_string()),
        };
        match serde_json::to_value(tool_result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn read_resource(&self, id: Option<Value>, read: McpResourceRead) -> JsonRpcResponse {
        let value = match self.gateway.read_resource(&read.uri, &self.source()).await {
            Ok(value) => value,
            Err(e) => return e.into_response(id),
        };
        match serde_json::to_string_pretty(&value) {
            Ok(text) => JsonRpcResponse::success(
                id,
                json!({"contents": [{
                    "uri": read.uri,
                    "mimeType": "application/json",
                    "text": text,
                }]}),
            ),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn get_prompt(&self, id: Option<Value>, get: McpPromptGet) -> JsonRpcResponse {
        let request_id = id.as_ref().map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let arguments = match get.arguments {
            Value::Null => json!({}),
            other => other,
        };
        match self
            .gateway
            .get_prompt(&get.name, arguments, &self.source(), request_id.as_deref())
            .await
        {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => e.into_response(id),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, R2rError> {
    serde_json::from_value(params)
        .map_err(|e| R2rError::InvalidArgument(format!("invalid params: {e}")))
}

impl R2rError {
    fn into_response(self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::error(id, self.jsonrpc_code(), self.to_string())
    }
}
