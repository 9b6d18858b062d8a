//! Сервисный слой бронирования.
//!
//! `BookingService` один, а его методы разнесены по файлам по назначению:
//! резервирование, подтверждение/отмена, чтения и расписание сеансов.

use std::sync::Arc;

use crate::clock::Clock;
use crate::store::BookingStore;

pub mod expiry;
pub mod queries;
pub mod reservation;
pub mod shows;
pub mod sweeper;
pub mod workflow;

pub use expiry::ExpiryPolicy;
pub use queries::{BookingFilter, BookingPage, BookingStatusView};
pub use reservation::Reservation;
pub use shows::{ScheduleShow, ScheduledShow};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use workflow::Cancellation;

pub struct BookingService<S: BookingStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
}

impl<S: BookingStore> Clone for BookingService<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), clock: self.clock.clone(), policy: self.policy }
    }
}

impl<S: BookingStore> BookingService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: ExpiryPolicy) -> Self {
        Self { store, clock, policy }
    }
}
