//! Kawa HTTP 接口
//!
//! 启动: cargo run --bin kawa-web --features web
//! POST /api/v1/agent/chat  请求体为 ChatRequest JSON，返回 ChatResponse
//! GET  /api/health

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use kawa_agent::agent::{create_orchestrator, demo_services};
use kawa_agent::config::load_config_or_default;
use kawa_agent::{ChatRequest, ChatResponse, Orchestrator};

struct AppState {
    orchestrator: Orchestrator,
}

/// POST /api/v1/agent/chat：规划并（可选）执行一次请求
async fn api_agent_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if req.message.trim().is_empty() && req.actions_override.is_none() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }
    tracing::info!(execute = req.execute, "agent chat request");
    Ok(Json(state.orchestrator.handle(&req).await))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kawa_agent::observability::init("info");

    let cfg = load_config_or_default(None);
    let orchestrator =
        create_orchestrator(&cfg, demo_services()).context("Failed to create orchestrator")?;
    let state = Arc::new(AppState { orchestrator });

    let app = Router::new()
        .route("/api/v1/agent/chat", post(api_agent_chat))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(Arc::clone(&state));

    let addr: std::net::SocketAddr = cfg
        .app
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr: {}", cfg.app.listen_addr))?;
    tracing::info!("Kawa API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
