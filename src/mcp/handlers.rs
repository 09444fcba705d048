use serde_json::{Value, json};

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use super::tools::{ToolError, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Handle one MCP JSON-RPC message. Notifications get no response.
pub async fn handle_request(
    registry: &ToolRegistry,
    user_id: &str,
    request: &JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        tracing::debug!(method = %request.method, "Notification received");
        return None;
    }

    let id = request.id.clone();
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, json!({"tools": registry.definitions()})),
        "tools/call" => handle_tools_call(registry, user_id, request).await,
        _ => JsonRpcResponse::method_not_found(id),
    };
    Some(response)
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": "gcal-mcp-server",
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "This MCP server manages Google Calendar on behalf of the signed-in user. Use list-calendars to find calendar IDs, get-current-time to anchor relative dates, then list-events, search-events, create-event and the other tools."
    })
}

/// Handle tools/call. Tool failures are reported in-band with `isError`;
/// only a malformed call or an unknown tool is a protocol error.
async fn handle_tools_call(
    registry: &ToolRegistry,
    user_id: &str,
    request: &JsonRpcRequest,
) -> JsonRpcResponse {
    let id = request.id.clone();
    let Some(tool_name) = request.params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::invalid_params(id, "Missing 'name' in params");
    };
    let arguments = request.params.get("arguments").unwrap_or(&Value::Null);

    match registry.call(user_id, tool_name, arguments).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(text) => JsonRpcResponse::success(id, tool_content(text, false)),
            Err(err) => JsonRpcResponse::internal_error(id, err.to_string()),
        },
        Err(err @ ToolError::UnknownTool(_)) => JsonRpcResponse::invalid_params(id, err.to_string()),
        Err(err) => JsonRpcResponse::success(id, tool_content(err.to_string(), true)),
    }
}

fn tool_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": text
        }],
        "isError": is_error
    })
}
