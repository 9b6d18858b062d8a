use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::controllers::error::ApiError;
use crate::error::BookingError;
use crate::middleware::AuthUser;
use crate::models::{Capability, CancelReason};
use crate::services::BookingFilter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/staff/bookings/pending", get(pending_bookings))
        .route("/staff/bookings", get(all_bookings))
        .route("/staff/bookings/{id}", get(booking_details))
        .route("/staff/bookings/{id}/confirm", post(confirm_payment))
        .route("/staff/bookings/{id}/cancel", post(cancel_booking))
}

// GET /api/staff/bookings/pending
async fn pending_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ManageBookings)?;

    let page = state.bookings.list_pending_bookings(&filter).await?;
    Ok(Json(page))
}

// GET /api/staff/bookings
async fn all_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ManageBookings)?;

    let page = state.bookings.list_bookings(&filter).await?;
    Ok(Json(page))
}

// GET /api/staff/bookings/{id}
async fn booking_details(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ManageBookings)?;

    let details = state.bookings.booking_details(booking_id).await?;
    Ok(Json(details))
}

// POST /api/staff/bookings/{id}/confirm
async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ManageBookings)?;

    let booking = state.bookings.confirm_payment(booking_id, &user.id).await?;
    Ok(Json(booking))
}

// POST /api/staff/bookings/{id}/cancel
#[derive(Debug, Default, Deserialize)]
struct CancelRequest {
    reason: Option<String>,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    user: AuthUser,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::ManageBookings)?;

    // Тело необязательно, пустой запрос означает причину по умолчанию
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let reason = match req.reason.as_deref() {
        None | Some("") => CancelReason::default(),
        Some(name) => name
            .parse::<CancelReason>()
            .map_err(|e| BookingError::InvalidRequest(e.to_string()))?,
    };

    let cancellation = state.bookings.cancel(booking_id, &user.id, reason).await?;
    state.cache.invalidate_seats(cancellation.booking.show_id).await;
    Ok(Json(cancellation))
}
