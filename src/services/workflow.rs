use serde::Serialize;
use tracing::{info, warn};

use super::BookingService;
use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, CancelReason};
use crate::store::{BookingStore, StoreTx};

/// Итог отмены: обновлённая бронь и освобождённые места сеанса.
#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub booking: Booking,
    pub released_seats: Vec<i64>,
}

impl<S: BookingStore> BookingService<S> {
    /// Сотрудник подтверждает получение оплаты. Места не трогаются.
    pub async fn confirm_payment(&self, booking_id: i64, staff_id: &str) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;

        if booking.status != BookingStatus::PendingPayment {
            warn!("Confirm rejected: booking {} is {}", booking_id, booking.status);
            return Err(BookingError::WrongState { booking_id, status: booking.status });
        }
        if self.policy.is_overdue(&booking, self.clock.now()) {
            warn!("Confirm rejected: booking {} missed its deadline", booking_id);
            return Err(BookingError::DeadlinePassed { booking_id, deadline: booking.payment_deadline });
        }

        let confirmed = tx
            .update_booking_status(booking_id, BookingStatus::Confirmed, Some(staff_id))
            .await?;
        tx.commit().await?;

        info!("✅ Booking {} confirmed by {}", booking_id, staff_id);
        Ok(confirmed)
    }

    /// Отмена сотрудником. Допустима из `PendingPayment` и `Expired`,
    /// во втором случае бронь просто получает новую метку.
    pub async fn cancel(
        &self,
        booking_id: i64,
        staff_id: &str,
        reason: CancelReason,
    ) -> Result<Cancellation, BookingError> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;

        if !booking.status.is_staff_cancellable() {
            warn!("Cancel rejected: booking {} is {}", booking_id, booking.status);
            return Err(BookingError::WrongState { booking_id, status: booking.status });
        }

        let cancellation = close_booking(&mut tx, &booking, reason.status(), Some(staff_id)).await?;
        tx.commit().await?;

        info!(
            "❌ Booking {} cancelled by {} as {}, {} seats released",
            booking_id,
            staff_id,
            reason.status(),
            cancellation.released_seats.len()
        );
        Ok(cancellation)
    }

    /// Отмена клиентом собственной неоплаченной брони. Чужая бронь выглядит
    /// как несуществующая.
    pub async fn cancel_by_customer(&self, booking_id: i64, customer_id: &str) -> Result<Cancellation, BookingError> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .lock_booking(booking_id)
            .await?
            .filter(|b| b.customer_id.as_deref() == Some(customer_id))
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;

        if booking.status != BookingStatus::PendingPayment {
            return Err(BookingError::WrongState { booking_id, status: booking.status });
        }

        let cancellation = close_booking(&mut tx, &booking, BookingStatus::CancelledByCustomer, None).await?;
        tx.commit().await?;

        info!("❌ Booking {} cancelled by customer {}", booking_id, customer_id);
        Ok(cancellation)
    }

    /// Переводит просроченную бронь в `Expired` и освобождает места.
    /// `None`, если бронь уже не ждёт оплаты или её дедлайн ещё не прошёл:
    /// между выборкой и блокировкой её могли подтвердить или отменить.
    pub async fn expire(&self, booking_id: i64) -> Result<Option<Cancellation>, BookingError> {
        let mut tx = self.store.begin().await?;
        let Some(booking) = tx.lock_booking(booking_id).await? else {
            return Ok(None);
        };
        if !self.policy.is_overdue(&booking, self.clock.now()) {
            return Ok(None);
        }

        let cancellation = close_booking(&mut tx, &booking, CancelReason::Expired.status(), None).await?;
        tx.commit().await?;
        Ok(Some(cancellation))
    }
}

async fn close_booking<T: StoreTx>(
    tx: &mut T,
    booking: &Booking,
    status: BookingStatus,
    staff_id: Option<&str>,
) -> Result<Cancellation, BookingError> {
    let updated = tx.update_booking_status(booking.id, status, staff_id).await?;
    let released_seats = tx.release_seats(booking.id).await?;
    Ok(Cancellation { booking: updated, released_seats })
}
