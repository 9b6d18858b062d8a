use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::controllers::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::Capability;
use crate::services::ScheduleShow;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/shows", post(create_show))
        .route("/admin/shows/{id}", put(reschedule_show).delete(delete_show))
}

// POST /api/admin/shows
async fn create_show(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ScheduleShow>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ScheduleShows)?;

    let scheduled = state.bookings.create_show(&req).await?;
    Ok((StatusCode::CREATED, Json(scheduled)))
}

// PUT /api/admin/shows/{id}
async fn reschedule_show(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
    user: AuthUser,
    Json(req): Json<ScheduleShow>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ScheduleShows)?;

    let scheduled = state.bookings.reschedule_show(show_id, &req).await?;
    state.cache.invalidate_seats(show_id).await;
    Ok(Json(scheduled))
}

// DELETE /api/admin/shows/{id}
async fn delete_show(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ScheduleShows)?;

    state.bookings.delete_show(show_id).await?;
    state.cache.invalidate_seats(show_id).await;
    Ok(StatusCode::NO_CONTENT)
}
