//! PostgreSQL-реализация хранилища.
//!
//! Уровень изоляции READ COMMITTED плюс явные блокировки строк:
//! - места сеанса берутся `FOR UPDATE` в порядке возрастания id, так что две
//!   пересекающиеся брони выстраиваются в очередь, а не взаимоблокируются;
//! - сеанс берётся `FOR SHARE`, пока идёт резервирование, и `FOR UPDATE` при
//!   изменении расписания;
//! - бронь берётся `FOR UPDATE` на время подтверждения или отмены.
//!
//! Ожидание блокировки ограничено `lock_timeout`, превышение превращается в
//! [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow, Postgres, Transaction};

use super::{BookingQuery, BookingStore, BookingSummary, LockMode, StoreError, StoreResult, StoreTx};
use crate::models::booking::NewBooking;
use crate::models::{Booking, BookingStatus, LockedSeat, Movie, Room, SeatMapEntry, Show};

const BOOKING_COLUMNS: &str = "id, booking_code, show_id, customer_id, status, total_cost, \
     purchased_at, payment_deadline, staff_confirmed_by, transaction_type";

const SHOW_COLUMNS: &str = "id, movie_id, room_id, start_time, end_time";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// Статус хранится текстом, поэтому строка БД разбирается отдельно
#[derive(FromRow)]
struct BookingRow {
    id: i64,
    booking_code: String,
    show_id: i64,
    customer_id: Option<String>,
    status: String,
    total_cost: i64,
    purchased_at: DateTime<Utc>,
    payment_deadline: DateTime<Utc>,
    staff_confirmed_by: Option<String>,
    transaction_type: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("booking {}: {}", row.id, e)))?;
        Ok(Booking {
            id: row.id,
            booking_code: row.booking_code,
            show_id: row.show_id,
            customer_id: row.customer_id,
            status,
            total_cost: row.total_cost,
            purchased_at: row.purchased_at,
            payment_deadline: row.payment_deadline,
            staff_confirmed_by: row.staff_confirmed_by,
            transaction_type: row.transaction_type,
        })
    }
}

#[derive(FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    customer_name: Option<String>,
    customer_email: Option<String>,
    movie_title: Option<String>,
    show_start: Option<DateTime<Utc>>,
    seat_labels: Vec<String>,
}

#[async_trait]
impl BookingStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        let mut tx = self.pool.begin().await?;
        // SET LOCAL не принимает параметры, значение - число из конфигурации
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(PgTx { tx })
    }

    async fn find_show(&self, show_id: i64) -> StoreResult<Option<Show>> {
        let show = sqlx::query_as::<_, Show>(&format!("SELECT {SHOW_COLUMNS} FROM shows WHERE id = $1"))
            .bind(show_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(show)
    }

    async fn find_booking(&self, booking_id: i64) -> StoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Booking::try_from)
            .transpose()
    }

    async fn list_bookings(&self, query: &BookingQuery) -> StoreResult<Vec<BookingSummary>> {
        let mut q = String::from(
            r#"
            SELECT b.id, b.booking_code, b.show_id, b.customer_id, b.status, b.total_cost,
                   b.purchased_at, b.payment_deadline, b.staff_confirmed_by, b.transaction_type,
                   u.name AS customer_name, u.email AS customer_email,
                   m.title AS movie_title, s.start_time AS show_start,
                   COALESCE(
                       ARRAY_AGG(st.row || st.col::TEXT ORDER BY st.row, st.col)
                           FILTER (WHERE st.id IS NOT NULL),
                       '{}'
                   ) AS seat_labels
            FROM bookings b
            LEFT JOIN users u ON u.id = b.customer_id
            JOIN shows s ON s.id = b.show_id
            JOIN movies m ON m.id = s.movie_id
            LEFT JOIN show_seats ss ON ss.booking_id = b.id
            LEFT JOIN seats st ON st.id = ss.seat_id
            WHERE TRUE"#,
        );
        let mut bind_idx = 1;
        if query.booking_id.is_some() {
            q.push_str(&format!(" AND b.id = ${}", bind_idx));
            bind_idx += 1;
        }
        if query.status.is_some() {
            q.push_str(&format!(" AND b.status = ${}", bind_idx));
            bind_idx += 1;
        }
        if query.customer_id.is_some() {
            q.push_str(&format!(" AND b.customer_id = ${}", bind_idx));
            bind_idx += 1;
        }
        if query.search.is_some() {
            q.push_str(&format!(
                " AND (b.booking_code ILIKE ${i} OR u.name ILIKE ${i} OR u.email ILIKE ${i})",
                i = bind_idx
            ));
            bind_idx += 1;
        }
        if query.purchased_from.is_some() {
            q.push_str(&format!(" AND b.purchased_at >= ${}", bind_idx));
            bind_idx += 1;
        }
        if query.purchased_before.is_some() {
            q.push_str(&format!(" AND b.purchased_at < ${}", bind_idx));
            bind_idx += 1;
        }
        if query.deadline_after.is_some() {
            q.push_str(&format!(" AND b.payment_deadline > ${}", bind_idx));
            bind_idx += 1;
        }
        q.push_str(&format!(
            " GROUP BY b.id, u.name, u.email, m.title, s.start_time \
             ORDER BY b.purchased_at DESC, b.id DESC LIMIT ${} OFFSET ${}",
            bind_idx,
            bind_idx + 1
        ));

        let mut dbq = sqlx::query_as::<_, SummaryRow>(&q);
        if let Some(booking_id) = query.booking_id {
            dbq = dbq.bind(booking_id);
        }
        if let Some(status) = query.status {
            dbq = dbq.bind(status.as_str());
        }
        if let Some(customer_id) = &query.customer_id {
            dbq = dbq.bind(customer_id.clone());
        }
        if let Some(search) = &query.search {
            dbq = dbq.bind(format!("%{}%", search));
        }
        if let Some(from) = query.purchased_from {
            dbq = dbq.bind(from);
        }
        if let Some(before) = query.purchased_before {
            dbq = dbq.bind(before);
        }
        if let Some(after) = query.deadline_after {
            dbq = dbq.bind(after);
        }

        let rows = dbq
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(BookingSummary {
                    booking: Booking::try_from(row.booking)?,
                    customer_name: row.customer_name,
                    customer_email: row.customer_email,
                    movie_title: row.movie_title,
                    show_start: row.show_start,
                    seats: row.seat_labels,
                    expired: false,
                })
            })
            .collect()
    }

    async fn seat_map(&self, show_id: i64) -> StoreResult<Option<Vec<SeatMapEntry>>> {
        if self.find_show(show_id).await?.is_none() {
            return Ok(None);
        }
        let seats = sqlx::query_as::<_, SeatMapEntry>(
            r#"
            SELECT ss.id AS show_seat_id, s.row, s.col, st.name AS seat_type, st.cost, ss.is_booked
            FROM show_seats ss
            JOIN seats s ON s.id = ss.seat_id
            JOIN seat_types st ON st.id = s.seat_type_id
            WHERE ss.show_id = $1
            ORDER BY s.row, s.col
            "#,
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(seats))
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM bookings
            WHERE status = 'PendingPayment' AND payment_deadline < $1
            ORDER BY payment_deadline
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_show(&mut self, show_id: i64, mode: LockMode) -> StoreResult<Option<Show>> {
        let lock = match mode {
            LockMode::Share => "FOR SHARE",
            LockMode::Exclusive => "FOR UPDATE",
        };
        let show = sqlx::query_as::<_, Show>(&format!("SELECT {SHOW_COLUMNS} FROM shows WHERE id = $1 {lock}"))
            .bind(show_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(show)
    }

    async fn lock_show_seats(&mut self, show_id: i64, show_seat_ids: &[i64]) -> StoreResult<Vec<LockedSeat>> {
        let seats = sqlx::query_as::<_, LockedSeat>(
            r#"
            SELECT ss.id AS show_seat_id, s.row, s.col, st.cost, ss.is_booked
            FROM show_seats ss
            JOIN seats s ON s.id = ss.seat_id
            JOIN seat_types st ON st.id = s.seat_type_id
            WHERE ss.show_id = $1 AND ss.id = ANY($2)
            ORDER BY ss.id
            FOR UPDATE OF ss
            "#,
        )
        .bind(show_id)
        .bind(show_seat_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "INSERT INTO bookings (booking_code, show_id, customer_id, status, total_cost, \
                 purchased_at, payment_deadline, transaction_type) \
             VALUES ($1, $2, $3, 'PendingPayment', $4, $5, $6, 'QRCode') \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(&booking.booking_code)
        .bind(booking.show_id)
        .bind(&booking.customer_id)
        .bind(booking.total_cost)
        .bind(booking.purchased_at)
        .bind(booking.payment_deadline)
        .fetch_one(&mut *self.tx)
        .await?
        .try_into()
    }

    async fn claim_seats(&mut self, show_id: i64, booking_id: i64, show_seat_ids: &[i64]) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE show_seats
            SET is_booked = TRUE, booking_id = $1
            WHERE show_id = $2 AND id = ANY($3) AND is_booked = FALSE
            "#,
        )
        .bind(booking_id)
        .bind(show_id)
        .bind(show_seat_ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn lock_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Booking::try_from)
        .transpose()
    }

    async fn update_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        staff_id: Option<&str>,
    ) -> StoreResult<Booking> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $2, staff_confirmed_by = $3 WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .bind(status.as_str())
        .bind(staff_id)
        .fetch_one(&mut *self.tx)
        .await?
        .try_into()
    }

    async fn release_seats(&mut self, booking_id: i64) -> StoreResult<Vec<i64>> {
        // Сначала блокируем в порядке id - тот же порядок, что и при резервировании
        let released = sqlx::query_scalar::<_, i64>(
            r#"
            WITH locked AS (
                SELECT id FROM show_seats WHERE booking_id = $1 ORDER BY id FOR UPDATE
            )
            UPDATE show_seats ss
            SET is_booked = FALSE, booking_id = NULL
            FROM locked
            WHERE ss.id = locked.id
            RETURNING ss.id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(released)
    }

    async fn find_movie(&mut self, movie_id: i64) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>("SELECT id, title, duration_minutes FROM movies WHERE id = $1")
            .bind(movie_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(movie)
    }

    async fn lock_room(&mut self, room_id: i64) -> StoreResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT id, name FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(room)
    }

    async fn find_overlapping_show(
        &mut self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_show_id: Option<i64>,
    ) -> StoreResult<Option<Show>> {
        let show = sqlx::query_as::<_, Show>(&format!(
            "SELECT {SHOW_COLUMNS} FROM shows \
             WHERE room_id = $1 AND start_time < $3 AND $2 < end_time \
               AND ($4::BIGINT IS NULL OR id <> $4) \
             ORDER BY start_time LIMIT 1"
        ))
        .bind(room_id)
        .bind(start)
        .bind(end)
        .bind(exclude_show_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(show)
    }

    async fn insert_show(
        &mut self,
        movie_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Show> {
        let show = sqlx::query_as::<_, Show>(&format!(
            "INSERT INTO shows (movie_id, room_id, start_time, end_time) VALUES ($1, $2, $3, $4) \
             RETURNING {SHOW_COLUMNS}"
        ))
        .bind(movie_id)
        .bind(room_id)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(show)
    }

    async fn update_show(&mut self, show: &Show) -> StoreResult<()> {
        sqlx::query("UPDATE shows SET movie_id = $2, room_id = $3, start_time = $4, end_time = $5 WHERE id = $1")
            .bind(show.id)
            .bind(show.movie_id)
            .bind(show.room_id)
            .bind(show.start_time)
            .bind(show.end_time)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn count_booked_seats(&mut self, show_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM show_seats WHERE show_id = $1 AND is_booked"
        )
        .bind(show_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn count_show_bookings(&mut self, show_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE show_id = $1")
            .bind(show_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn create_show_seats(&mut self, show_id: i64, room_id: i64) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO show_seats (show_id, seat_id, is_booked)
            SELECT $1, id, FALSE FROM seats WHERE room_id = $2 ORDER BY id
            "#,
        )
        .bind(show_id)
        .bind(room_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_show_seats(&mut self, show_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM show_seats WHERE show_id = $1")
            .bind(show_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_show(&mut self, show_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM shows WHERE id = $1")
            .bind(show_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
