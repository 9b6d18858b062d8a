//! Хранилище ядра бронирования.
//!
//! Любая изменяющая операция выполняется через явный дескриптор транзакции
//! [`StoreTx`]. Транзакция, которую не зафиксировали через `commit`, откатывается
//! при drop, поэтому ранний выход по `?` никогда не оставляет частичных изменений.
//!
//! Реализации:
//! - [`postgres::PgStore`] - PostgreSQL через sqlx, пессимистичные блокировки строк;
//! - [`memory::MemoryStore`] - всё состояние под одним мьютексом, для тестов.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::booking::NewBooking;
use crate::models::{Booking, BookingStatus, LockedSeat, Movie, Room, SeatMapEntry, Show};

pub mod memory;
pub mod postgres;

pub type StoreResult<T> = Result<T, StoreError>;

/// Ошибки уровня хранения. `Conflict` отделён от прочих сбоев, чтобы движок
/// резервирования мог однозначно превратить его в `SeatAlreadyBooked`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Блокировка не получена вовремя, взаимоблокировка или сбой сериализации.
    #[error("concurrent update conflict")]
    Conflict,
    #[error("unique constraint {0} violated")]
    UniqueViolation(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => return StoreError::Conflict,
                Some("23505") => {
                    let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                    return StoreError::UniqueViolation(constraint);
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Сеанс нельзя удалить или изменить, пока транзакция жива
    Share,
    Exclusive,
}

/// Фильтр для списков бронирований.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub booking_id: Option<i64>,
    pub status: Option<BookingStatus>,
    pub customer_id: Option<String>,
    /// Подстрока кода брони, имени или email клиента
    pub search: Option<String>,
    pub purchased_from: Option<DateTime<Utc>>,
    pub purchased_before: Option<DateTime<Utc>>,
    /// Только брони с дедлайном позже этого момента
    pub deadline_after: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Строка списка бронирований для персонала и клиента.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    #[serde(flatten)]
    pub booking: Booking,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub movie_title: Option<String>,
    pub show_start: Option<DateTime<Utc>>,
    pub seats: Vec<String>,
    /// Дедлайн оплаты прошёл, а бронь всё ещё `PendingPayment`
    pub expired: bool,
}

#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    // --- чтения вне транзакции ---

    async fn find_show(&self, show_id: i64) -> StoreResult<Option<Show>>;
    async fn find_booking(&self, booking_id: i64) -> StoreResult<Option<Booking>>;
    async fn list_bookings(&self, query: &BookingQuery) -> StoreResult<Vec<BookingSummary>>;
    /// `None`, если сеанса нет
    async fn seat_map(&self, show_id: i64) -> StoreResult<Option<Vec<SeatMapEntry>>>;
    async fn find_overdue_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<i64>>;
}

#[async_trait]
pub trait StoreTx: Send + Sized {
    // --- резервирование ---

    async fn lock_show(&mut self, show_id: i64, mode: LockMode) -> StoreResult<Option<Show>>;
    /// Блокирует места сеанса по id в порядке возрастания id. Чужие id молча пропускаются.
    async fn lock_show_seats(&mut self, show_id: i64, show_seat_ids: &[i64]) -> StoreResult<Vec<LockedSeat>>;
    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking>;
    /// Возвращает число действительно занятых мест (только свободные меняются).
    async fn claim_seats(&mut self, show_id: i64, booking_id: i64, show_seat_ids: &[i64]) -> StoreResult<u64>;

    // --- подтверждение и отмена ---

    async fn lock_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>>;
    async fn update_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        staff_id: Option<&str>,
    ) -> StoreResult<Booking>;
    /// Освобождает все места брони, возвращает id освобождённых мест.
    async fn release_seats(&mut self, booking_id: i64) -> StoreResult<Vec<i64>>;

    // --- расписание сеансов ---

    async fn find_movie(&mut self, movie_id: i64) -> StoreResult<Option<Movie>>;
    async fn lock_room(&mut self, room_id: i64) -> StoreResult<Option<Room>>;
    async fn find_overlapping_show(
        &mut self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_show_id: Option<i64>,
    ) -> StoreResult<Option<Show>>;
    async fn insert_show(
        &mut self,
        movie_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Show>;
    async fn update_show(&mut self, show: &Show) -> StoreResult<()>;
    async fn count_booked_seats(&mut self, show_id: i64) -> StoreResult<i64>;
    async fn count_show_bookings(&mut self, show_id: i64) -> StoreResult<i64>;
    /// По одному месту сеанса на каждое место зала.
    async fn create_show_seats(&mut self, show_id: i64, room_id: i64) -> StoreResult<u64>;
    async fn delete_show_seats(&mut self, show_id: i64) -> StoreResult<u64>;
    async fn delete_show(&mut self, show_id: i64) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;
}
