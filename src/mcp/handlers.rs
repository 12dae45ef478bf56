use serde_json::{json, Value};
use tracing::debug;

use crate::mcp::error::{McpError, McpResult};
use crate::mcp::models::{CallToolParams, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::state::McpState;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Handle one raw JSON-RPC message. Notifications produce no response.
pub async fn handle_message(state: &McpState, raw: &str) -> Option<JsonRpcResponse> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                &McpError::Parse(e.to_string()),
            ))
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::failure(
                id,
                &McpError::InvalidRequest(e.to_string()),
            ))
        }
    };
    handle_request(state, request).await
}

pub async fn handle_request(state: &McpState, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let id = request.id.clone();
    debug!("JSON-RPC {} (id {:?})", request.method, id);
    let outcome = dispatch(state, request).await;

    let id = id?;
    Some(match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err) => JsonRpcResponse::failure(id, &err),
    })
}

async fn dispatch(state: &McpState, request: JsonRpcRequest) -> McpResult<Value> {
    match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "apple-tools",
                "version": env!("CARGO_PKG_VERSION")
            }
        })),
        "notifications/initialized" | "initialized" => Ok(Value::Null),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": state.registry.descriptors() })),
        "tools/call" => {
            let params = request
                .params
                .ok_or_else(|| McpError::InvalidParams("missing params".to_string()))?;
            let params: CallToolParams = serde_json::from_value(params)
                .map_err(|e| McpError::InvalidParams(e.to_string()))?;
            let args = params.arguments.unwrap_or_else(|| json!({}));
            let response = state.registry.invoke_tool(&params.name, args).await;
            serde_json::to_value(response).map_err(|e| McpError::Internal(e.into()))
        }
        other => Err(McpError::MethodNotFound(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mcp::cache::testing::FakeInitializer;
    use crate::shared::config::AppConfig;

    fn state() -> McpState {
        McpState::with_initializer(
            Arc::new(AppConfig::default()),
            Arc::new(FakeInitializer::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_reports_tools_capability() {
        let resp = handle_message(&state(), r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tools_list_has_eight_tools() {
        let resp = handle_message(&state(), r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_gets_no_response() {
        let resp = handle_message(
            &state(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert!(resp.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_errors_use_json_rpc_codes() {
        let state = state();

        let resp = handle_message(&state, "{not json").await.unwrap();
        assert_eq!(resp.error.unwrap().code, -32700);

        let resp = handle_message(&state, r#"{"jsonrpc":"2.0","id":9}"#).await.unwrap();
        assert_eq!(resp.id, json!(9));
        assert_eq!(resp.error.unwrap().code, -32600);

        let resp = handle_message(&state, r#"{"jsonrpc":"2.0","id":3,"method":"bogus"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);

        let resp = handle_message(&state, r#"{"jsonrpc":"2.0","id":4,"method":"tools/call"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_failure_is_a_result_not_an_error() {
        let resp = handle_message(
            &state(),
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"notes","arguments":{"operation":"explode"}}}"#,
        )
        .await
        .unwrap();
        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap()["isError"], true);
    }
}
