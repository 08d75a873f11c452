use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provider_ok = state.provider.health_check().await.unwrap_or(false);
    Json(json!({
        "status": "ok",
        "provider": state.provider.name(),
        "provider_reachable": provider_ok,
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds();
    Ok(Json(json!({
        "live_sessions": state.registry.live_sessions().await,
        "sessions_created": state.registry.sessions_created(),
        "uptime_secs": uptime_secs,
    })))
}
