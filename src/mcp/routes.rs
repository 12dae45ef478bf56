use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::mcp::backend::BackendId;
use crate::mcp::handlers::handle_message;
use crate::mcp::state::McpState;

pub fn create_router(state: McpState) -> Router {
    Router::new()
        .route("/api/v0/mcp", post(rpc))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn rpc(State(state): State<McpState>, body: String) -> Response {
    match handle_message(&state, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health(State(state): State<McpState>) -> Json<serde_json::Value> {
    let backends: serde_json::Map<String, serde_json::Value> = BackendId::ALL
        .iter()
        .map(|id| {
            (
                id.to_string(),
                json!(format!("{:?}", state.loader.load_state(*id))),
            )
        })
        .collect();
    Json(json!({
        "status": "ok",
        "ready": state.loader.is_ready(),
        "mode": format!("{:?}", state.loader.mode()),
        "backends": backends,
    }))
}
