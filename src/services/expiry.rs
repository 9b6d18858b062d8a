use chrono::{DateTime, Duration, Utc};

use crate::models::{Booking, BookingStatus};

/// Окно оплаты: сколько бронь живёт в `PendingPayment` до истечения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    payment_window: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(15)
    }
}

impl ExpiryPolicy {
    pub fn new(payment_window_minutes: i64) -> Self {
        Self { payment_window: Duration::minutes(payment_window_minutes) }
    }

    pub fn deadline_from(&self, purchased_at: DateTime<Utc>) -> DateTime<Utc> {
        purchased_at + self.payment_window
    }

    /// Ровно в момент дедлайна бронь ещё можно подтвердить.
    pub fn is_overdue(&self, booking: &Booking, now: DateTime<Utc>) -> bool {
        booking.status == BookingStatus::PendingPayment && now > booking.payment_deadline
    }

    /// Статус с учётом времени: просроченная `PendingPayment` читается как `Expired`,
    /// даже если фоновая очистка до неё ещё не дошла.
    pub fn effective_status(&self, booking: &Booking, now: DateTime<Utc>) -> BookingStatus {
        if self.is_overdue(booking, now) {
            BookingStatus::Expired
        } else {
            booking.status
        }
    }
}
