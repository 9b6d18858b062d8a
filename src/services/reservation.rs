use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::BookingService;
use crate::error::BookingError;
use crate::models::booking::{generate_booking_code, payment_content, NewBooking};
use crate::models::SeatPosition;
use crate::store::{BookingStore, LockMode, StoreError, StoreTx};

/// Сколько раз пробуем вставить бронь, если сгенерированный код уже занят.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Результат успешного резервирования.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub booking_id: i64,
    pub booking_code: String,
    pub show_id: i64,
    pub total_cost: i64,
    pub payment_deadline: DateTime<Utc>,
    pub seats: Vec<SeatPosition>,
    /// Назначение перевода для QR-кода
    pub payment_content: String,
}

impl<S: BookingStore> BookingService<S> {
    /// Резервирует места сеанса за клиентом. Бронь создаётся в статусе
    /// `PendingPayment` с дедлайном оплаты. Из конкурирующих броней на одно
    /// место побеждает зафиксированная первой, проигравшая получает
    /// `SeatAlreadyBooked`.
    pub async fn reserve(
        &self,
        show_id: i64,
        seat_ids: &[i64],
        customer_id: &str,
    ) -> Result<Reservation, BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::InvalidRequest("no seats selected".into()));
        }
        let distinct: BTreeSet<i64> = seat_ids.iter().copied().collect();
        if distinct.len() != seat_ids.len() {
            return Err(BookingError::InvalidRequest("seat selection contains duplicates".into()));
        }

        // Предварительная проверка без блокировок, в транзакции повторяется.
        // Удалённый сеанс для клиента то же, что начавшийся.
        let Some(show) = self.store.find_show(show_id).await? else {
            warn!("Show {} does not exist, reservation rejected", show_id);
            return Err(BookingError::ShowNotBookable { show_id });
        };
        if !show.is_bookable_at(self.clock.now()) {
            warn!("Show {} already started, reservation rejected", show_id);
            return Err(BookingError::ShowNotBookable { show_id });
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut tx = self.store.begin().await?;
            let attempt_result = self.try_reserve(&mut tx, show_id, seat_ids, customer_id).await;
            match attempt_result {
                Ok(reservation) => {
                    if let Err(e) = tx.commit().await {
                        return Err(self.contention(e, show_id, seat_ids).await);
                    }
                    info!(
                        "Booking {} ({}) reserved {} seats of show {} for {}",
                        reservation.booking_id,
                        reservation.booking_code,
                        reservation.seats.len(),
                        show_id,
                        customer_id
                    );
                    return Ok(reservation);
                }
                Err(BookingError::Storage(StoreError::UniqueViolation(constraint))) if attempt < MAX_CODE_ATTEMPTS => {
                    warn!("Booking code collision on {}, attempt {}", constraint, attempt);
                }
                Err(BookingError::Storage(e)) => {
                    drop(tx);
                    return Err(self.contention(e, show_id, seat_ids).await);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_reserve(
        &self,
        tx: &mut S::Tx,
        show_id: i64,
        seat_ids: &[i64],
        customer_id: &str,
    ) -> Result<Reservation, BookingError> {
        let show = tx
            .lock_show(show_id, LockMode::Share)
            .await?
            .ok_or(BookingError::ShowNotBookable { show_id })?;

        let seats = tx.lock_show_seats(show_id, seat_ids).await?;
        if seats.len() != seat_ids.len() {
            return Err(BookingError::SeatMismatch { requested: seat_ids.len(), found: seats.len() });
        }

        let mut taken: Vec<SeatPosition> = seats.iter().filter(|s| s.is_booked).map(|s| s.position()).collect();
        if !taken.is_empty() {
            taken.sort();
            return Err(BookingError::SeatAlreadyBooked { seats: taken, locked: false });
        }

        let now = self.clock.now();
        if !show.is_bookable_at(now) {
            return Err(BookingError::ShowNotBookable { show_id });
        }

        let total_cost: i64 = seats.iter().map(|s| s.cost).sum();
        let booking = tx
            .insert_booking(&NewBooking {
                booking_code: generate_booking_code(now),
                show_id,
                customer_id: customer_id.to_string(),
                total_cost,
                purchased_at: now,
                payment_deadline: self.policy.deadline_from(now),
            })
            .await?;

        let ids: Vec<i64> = seats.iter().map(|s| s.show_seat_id).collect();
        let claimed = tx.claim_seats(show_id, booking.id, &ids).await?;
        if claimed != ids.len() as u64 {
            // кто-то занял место между блокировкой и обновлением
            return Err(StoreError::Conflict.into());
        }

        let mut positions: Vec<SeatPosition> = seats.iter().map(|s| s.position()).collect();
        positions.sort();

        Ok(Reservation {
            booking_id: booking.id,
            payment_content: payment_content(&booking.booking_code),
            booking_code: booking.booking_code,
            show_id,
            total_cost: booking.total_cost,
            payment_deadline: booking.payment_deadline,
            seats: positions,
        })
    }

    /// Конфликт хранилища превращается в `SeatAlreadyBooked` со списком мест,
    /// прочитанным уже после отката. Если ни одно из запрошенных мест не занято,
    /// их держит незавершённая чужая транзакция: ошибка помечается `locked`.
    /// Остальные ошибки пробрасываются как есть.
    async fn contention(&self, err: StoreError, show_id: i64, seat_ids: &[i64]) -> BookingError {
        if !matches!(err, StoreError::Conflict) {
            return err.into();
        }
        warn!("Seat contention on show {} for seats {:?}", show_id, seat_ids);

        let requested: Vec<_> = match self.store.seat_map(show_id).await {
            Ok(Some(map)) => map.into_iter().filter(|e| seat_ids.contains(&e.show_seat_id)).collect(),
            _ => Vec::new(),
        };
        let booked: Vec<SeatPosition> = requested
            .iter()
            .filter(|e| e.is_booked)
            .map(|e| SeatPosition { row: e.row.clone(), col: e.col })
            .collect();
        if !booked.is_empty() {
            return BookingError::SeatAlreadyBooked { seats: booked, locked: false };
        }
        let seats = requested.into_iter().map(|e| SeatPosition { row: e.row, col: e.col }).collect();
        BookingError::SeatAlreadyBooked { seats, locked: true }
    }
}
