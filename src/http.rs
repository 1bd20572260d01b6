use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{LogQueryError, Result};
use crate::mcp::{process_request, tool_definitions, RpcRequest};
use crate::search::SearchEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

async fn rpc_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RpcRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {e}") })),
            )
                .into_response()
        }
    };

    match process_request(&state.engine, req).await {
        Some(resp) => (StatusCode::OK, Json(resp)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn tools_handler() -> impl IntoResponse {
    Json(json!({ "tools": tool_definitions() }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(engine: Arc<SearchEngine>) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/tools", get(tools_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn serve_http(engine: Arc<SearchEngine>, config: &ServerConfig) -> Result<()> {
    let addr = format!(
        "{}:{}",
        config.http_addr.as_deref().unwrap_or("127.0.0.1"),
        config.http_port.unwrap_or(3000)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LogQueryError::Config(format!("监听 {addr} 失败: {e}")))?;
    info!("HTTP server listening on http://{addr}");
    axum::serve(listener, build_router(engine))
        .await
        .map_err(LogQueryError::from)
}
