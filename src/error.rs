use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{BookingStatus, SeatPosition};
use crate::store::StoreError;

/// Ошибки ядра бронирования. Все, кроме `Storage`, исправимы вызывающей стороной.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("requested {requested} seats but only {found} belong to the show")]
    SeatMismatch { requested: usize, found: usize },

    /// `locked`: места держит ещё не зафиксированное чужое резервирование,
    /// занятой брони на них нет.
    #[error("{}", seat_conflict_message(.seats, .locked))]
    SeatAlreadyBooked { seats: Vec<SeatPosition>, locked: bool },

    #[error("show {show_id} is not bookable")]
    ShowNotBookable { show_id: i64 },

    #[error("booking {booking_id} is {status}")]
    WrongState { booking_id: i64, status: BookingStatus },

    #[error("payment deadline {deadline} for booking {booking_id} has passed")]
    DeadlinePassed { booking_id: i64, deadline: DateTime<Utc> },

    #[error("show overlaps show {conflicting_show_id} in the same room")]
    ShowOverlap { conflicting_show_id: i64 },

    #[error("show {show_id} has bookings")]
    ShowHasBookings { show_id: i64 },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BookingError::NotFound { entity, id: id.to_string() }
    }
}

fn seat_conflict_message(seats: &[SeatPosition], locked: &bool) -> String {
    let list = seats.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    if *locked {
        format!("seats are being booked by another request: {}", list)
    } else {
        format!("seats already booked: {}", list)
    }
}
