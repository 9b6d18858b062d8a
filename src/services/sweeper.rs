use std::collections::BTreeSet;

use tracing::{error, info};

use super::BookingService;
use crate::error::BookingError;
use crate::store::BookingStore;

/// Фоновая очистка: просроченные неоплаченные брони переводятся в `Expired`,
/// их места возвращаются в продажу. Каждая бронь обрабатывается в своей
/// транзакции тем же переходом, что и ручная отмена.
pub struct ExpirySweeper<S: BookingStore> {
    service: BookingService<S>,
    batch_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub seats_released: usize,
    pub failed: usize,
    /// Сеансы, чья карта мест изменилась
    pub affected_shows: BTreeSet<i64>,
}

impl<S: BookingStore> ExpirySweeper<S> {
    pub fn new(service: BookingService<S>, batch_size: i64) -> Self {
        Self { service, batch_size: batch_size.max(1) }
    }

    /// Один проход. Ошибка отдельной брони не прерывает проход.
    pub async fn run_once(&self) -> Result<SweepReport, BookingError> {
        let now = self.service.clock.now();
        let overdue = self.service.store.find_overdue_pending(now, self.batch_size).await?;

        let mut report = SweepReport { scanned: overdue.len(), ..Default::default() };
        if overdue.is_empty() {
            info!("⏰ No overdue bookings to expire");
            return Ok(report);
        }

        info!("⏰ Found {} overdue bookings to expire", overdue.len());

        for booking_id in overdue {
            match self.service.expire(booking_id).await {
                Ok(Some(cancellation)) => {
                    report.expired += 1;
                    report.seats_released += cancellation.released_seats.len();
                    report.affected_shows.insert(cancellation.booking.show_id);
                    info!(
                        "⏰ Booking {} expired, {} seats released",
                        booking_id,
                        cancellation.released_seats.len()
                    );
                }
                // Успели подтвердить или отменить между выборкой и блокировкой
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    error!("⏰ Failed to expire booking {}: {}", booking_id, e);
                }
            }
        }

        info!("✅ Expiry sweep done: {} expired, {} failed", report.expired, report.failed);
        Ok(report)
    }
}
