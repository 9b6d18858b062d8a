use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::warn;

use crate::AppState;

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    let redis = state.redis.ping().await;
    if let Err(e) = &redis {
        warn!("Health check: Redis unavailable: {}", e);
    }
    health_status(redis.is_ok())
}

// Без Redis сервис работает, но балансировщик должен видеть деградацию
fn health_status(redis_ok: bool) -> (StatusCode, &'static str) {
    if redis_ok {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DEGRADED")
    }
}
