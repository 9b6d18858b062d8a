use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::error::BookingError;
use crate::store::StoreError;

/// Ошибка HTTP-слоя. Внутренние подробности уходят в лог, клиент видит только
/// публичное сообщение.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Booking(err.into())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Booking(e) => match e {
                BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
                BookingError::SeatMismatch { .. } | BookingError::ShowNotBookable { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                BookingError::SeatAlreadyBooked { .. }
                | BookingError::WrongState { .. }
                | BookingError::DeadlinePassed { .. }
                | BookingError::ShowOverlap { .. }
                | BookingError::ShowHasBookings { .. } => StatusCode::CONFLICT,
                BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
            ApiError::Booking(e) => match e {
                BookingError::InvalidRequest(_) => "INVALID_REQUEST",
                BookingError::NotFound { .. } => "NOT_FOUND",
                BookingError::SeatMismatch { .. } => "SEAT_MISMATCH",
                BookingError::SeatAlreadyBooked { .. } => "SEAT_ALREADY_BOOKED",
                BookingError::ShowNotBookable { .. } => "SHOW_NOT_BOOKABLE",
                BookingError::WrongState { .. } => "WRONG_STATE",
                BookingError::DeadlinePassed { .. } => "DEADLINE_PASSED",
                BookingError::ShowOverlap { .. } => "SHOW_OVERLAP",
                BookingError::ShowHasBookings { .. } => "SHOW_HAS_BOOKINGS",
                BookingError::Storage(_) => "STORAGE_ERROR",
            },
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::Booking(BookingError::SeatAlreadyBooked { seats, locked }) => json!({
                "conflicting_seats": seats,
                "locked": locked,
            }),
            ApiError::Booking(BookingError::WrongState { status, .. }) => json!({ "status": status }),
            ApiError::Booking(BookingError::DeadlinePassed { deadline, .. }) => json!({ "payment_deadline": deadline }),
            ApiError::Booking(BookingError::ShowOverlap { conflicting_show_id }) => json!({
                "conflicting_show_id": conflicting_show_id,
            }),
            _ => Value::Null,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) | ApiError::Booking(BookingError::Storage(_)) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "Request failed");
        } else {
            warn!(code = self.code(), message = %self, "Request rejected");
        }

        let body = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.public_message(),
                "details": self.details(),
            }
        });
        (status, Json(body)).into_response()
    }
}
