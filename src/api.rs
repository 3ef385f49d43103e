//! REST API server for the ATTPs agent
//!
//! Exposes registered actions over HTTP. Each request is one user message;
//! the action's single reply comes back in the response body.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::action::{ActionOutcome, ActionRegistry};
use crate::runtime::{CollectingCallback, Content, InMemoryRuntime, Memory};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionRequest {
    pub text: String,
    pub user_id: Option<String>,
    pub room_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionReply {
    pub text: String,
    pub outcome: ActionOutcome,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<InMemoryRuntime>,
    pub actions: Arc<ActionRegistry>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    let hash = Keccak256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // version 4, RFC4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Action Endpoints
/// =============================

async fn list_actions(State(state): State<ApiState>) -> Json<ApiResponse> {
    let mut names = state.actions.list();
    names.sort_unstable();
    Json(ApiResponse::success(names))
}

async fn run_action(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<ActionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(action) = state.actions.get(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown action: {}", name))),
        );
    };

    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message text is empty".into())),
        );
    }

    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");
    let room_id = parse_or_stable_uuid(req.room_id.as_deref(), &user_id.to_string());
    let message = Memory::new(user_id, room_id, Content::text(req.text));

    info!(
        action = action.name(),
        user_id = %user_id,
        room_id = %room_id,
        "Received action request"
    );

    if !action.validate(state.runtime.as_ref(), &message).await {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!(
                "Action {} does not apply to this message",
                action.name()
            ))),
        );
    }

    let callback = CollectingCallback::new();
    let outcome = action
        .handle(state.runtime.as_ref(), &message, None, &callback)
        .await;

    let text = callback
        .replies()
        .await
        .into_iter()
        .map(|reply| reply.text)
        .collect::<Vec<_>>()
        .join("\n");

    if outcome.is_success() {
        return (
            StatusCode::OK,
            Json(ApiResponse::success(ActionReply { text, outcome })),
        );
    }

    warn!(action = action.name(), outcome = ?outcome, "Action failed");

    let mut response = ApiResponse::error(text.clone());
    response.data = serde_json::to_value(ActionReply { text, outcome }).ok();
    (StatusCode::BAD_REQUEST, Json(response))
}

/// =============================
/// Router
/// =============================

pub fn create_router(runtime: Arc<InMemoryRuntime>, actions: Arc<ActionRegistry>) -> Router {
    let state = ApiState { runtime, actions };

    Router::new()
        .route("/health", get(health))
        .route("/api/actions", get(list_actions))
        .route("/api/actions/:name", post(run_action))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    runtime: Arc<InMemoryRuntime>,
    actions: Arc<ActionRegistry>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(runtime, actions);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
