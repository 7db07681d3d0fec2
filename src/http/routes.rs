//! HTTP route definitions

use std::net::SocketAddr;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::{upgrade, ws_handler};

const SERVICE_NAME: &str = "boss-battle-relay";

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS configuration - `*` or a comma-separated origin list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    clients: usize,
    registered_players: usize,
    has_game_state: bool,
    timestamp: String,
    uptime_secs: u64,
}

/// Browser clients open their socket on `/`; plain GETs get the health report
async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Some(ws) => upgrade(ws, addr, state),
        None => health_handler(State(state)).await.into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let stats = state
        .relay
        .stats()
        .await
        .ok_or_else(|| AppError::Unavailable("relay hub is not running".to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        clients: stats.connections,
        registered_players: stats.registered_players,
        has_game_state: stats.has_game_state,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
    }))
}

async fn not_found_handler(uri: Uri) -> Response {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": uri.path(),
        "message": "This endpoint does not exist. Use /health for health check.",
        "availableEndpoints": ["/", "/health", "/ws"],
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
