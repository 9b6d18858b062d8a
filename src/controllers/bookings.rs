use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::cache::seats::CachedSeatMap;
use crate::controllers::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::Capability;
use crate::services::BookingFilter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows/{id}/seats", get(get_seat_map))
        .route("/shows/{id}/bookings", post(reserve_seats))
        .route("/bookings/mine", get(my_bookings))
        .route("/bookings/{id}/status", get(booking_status))
        .route("/bookings/{id}/cancel", post(cancel_my_booking))
}

/* ---------- SEATS ---------- */

// GET /api/shows/{id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    // Сначала пробуем кеш
    let generation = match state.cache.cached_seat_map(show_id).await {
        CachedSeatMap::Hit(seats) => return Ok(Json(seats)),
        CachedSeatMap::Miss(generation) => generation,
    };

    // Промах - идем в БД и кладем результат в кеш под прочитанным поколением
    let seats = state.bookings.seat_map(show_id).await?;
    if let Some(generation) = generation {
        state.cache.store_seat_map(show_id, generation, &seats).await;
    }
    Ok(Json(seats))
}

/* ---------- BOOKINGS ---------- */

// POST /api/shows/{id}/bookings
#[derive(Debug, Deserialize)]
struct ReserveRequest {
    seat_ids: Vec<i64>,
}

async fn reserve_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
    user: AuthUser,
    Json(req): Json<ReserveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::BookSeats)?;

    let reservation = state.bookings.reserve(show_id, &req.seat_ids, &user.id).await?;
    state.cache.invalidate_seats(show_id).await;
    Ok((StatusCode::CREATED, Json(reservation)))
}

// GET /api/bookings/{id}/status
async fn booking_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.bookings.booking_status(booking_id).await?;
    Ok(Json(view))
}

// GET /api/bookings/mine
#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    page_size: Option<i64>,
}

async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(paging): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::BookSeats)?;

    let filter = BookingFilter {
        customer_id: Some(user.id),
        page: paging.page,
        page_size: paging.page_size,
        ..Default::default()
    };
    let page = state.bookings.list_bookings(&filter).await?;
    Ok(Json(page))
}

// POST /api/bookings/{id}/cancel
async fn cancel_my_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Capability::BookSeats)?;

    let cancellation = state.bookings.cancel_by_customer(booking_id, &user.id).await?;
    state.cache.invalidate_seats(cancellation.booking.show_id).await;
    Ok(Json(cancellation))
}
