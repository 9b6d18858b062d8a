use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::BookingService;
use crate::error::BookingError;
use crate::models::{BookingStatus, SeatMapEntry};
use crate::store::{BookingQuery, BookingStore, BookingSummary};

pub const PENDING_PAGE_SIZE: i64 = 10;
pub const BOOKINGS_PAGE_SIZE: i64 = 15;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct BookingStatusView {
    pub booking_id: i64,
    pub booking_code: String,
    /// Статус с учётом дедлайна оплаты
    pub status: BookingStatus,
    pub stored_status: BookingStatus,
    pub payment_deadline: DateTime<Utc>,
    pub total_cost: i64,
}

/// Параметры списков бронирований. Страницы нумеруются с 1.
/// Даты покупки `from` и `to` включительно, по UTC.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub customer_id: Option<String>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub include_expired: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl BookingFilter {
    fn paging(&self, default_size: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self.page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
        (page, size, (page - 1) * size)
    }

    /// Полуинтервал `[начало from, начало дня после to)`.
    fn purchased_range(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let start_of = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc();
        let from = self.from.map(start_of);
        let before = self.to.and_then(|day| day.succ_opt()).map(start_of);
        (from, before)
    }

    fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingPage {
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<BookingSummary>,
}

impl<S: BookingStore> BookingService<S> {
    pub async fn booking_status(&self, booking_id: i64) -> Result<BookingStatusView, BookingError> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;

        Ok(BookingStatusView {
            booking_id,
            status: self.policy.effective_status(&booking, self.clock.now()),
            stored_status: booking.status,
            booking_code: booking.booking_code,
            payment_deadline: booking.payment_deadline,
            total_cost: booking.total_cost,
        })
    }

    /// Брони в ожидании оплаты, новые сверху. По умолчанию просроченные тоже
    /// показываются и помечаются `expired`.
    pub async fn list_pending_bookings(&self, filter: &BookingFilter) -> Result<BookingPage, BookingError> {
        let now = self.clock.now();
        let (page, page_size, offset) = filter.paging(PENDING_PAGE_SIZE);
        let include_expired = filter.include_expired.unwrap_or(true);
        let (purchased_from, purchased_before) = filter.purchased_range();

        let query = BookingQuery {
            booking_id: None,
            status: Some(BookingStatus::PendingPayment),
            customer_id: filter.customer_id.clone(),
            search: filter.search(),
            purchased_from,
            purchased_before,
            deadline_after: (!include_expired).then_some(now),
            limit: page_size,
            offset,
        };
        let items = self.store.list_bookings(&query).await?;
        Ok(BookingPage { page, page_size, items: self.flag_expired(items, now) })
    }

    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<BookingPage, BookingError> {
        let now = self.clock.now();
        let (page, page_size, offset) = filter.paging(BOOKINGS_PAGE_SIZE);
        let (purchased_from, purchased_before) = filter.purchased_range();

        let query = BookingQuery {
            booking_id: None,
            status: filter.status,
            customer_id: filter.customer_id.clone(),
            search: filter.search(),
            purchased_from,
            purchased_before,
            deadline_after: None,
            limit: page_size,
            offset,
        };
        let items = self.store.list_bookings(&query).await?;
        Ok(BookingPage { page, page_size, items: self.flag_expired(items, now) })
    }

    /// Карточка брони для персонала: клиент, фильм, места и кто подтвердил.
    pub async fn booking_details(&self, booking_id: i64) -> Result<BookingSummary, BookingError> {
        let query = BookingQuery { booking_id: Some(booking_id), limit: 1, ..Default::default() };
        let found = self.store.list_bookings(&query).await?;
        self.flag_expired(found, self.clock.now())
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::not_found("booking", booking_id))
    }

    pub async fn seat_map(&self, show_id: i64) -> Result<Vec<SeatMapEntry>, BookingError> {
        self.store
            .seat_map(show_id)
            .await?
            .ok_or_else(|| BookingError::not_found("show", show_id))
    }

    fn flag_expired(&self, mut items: Vec<BookingSummary>, now: DateTime<Utc>) -> Vec<BookingSummary> {
        for item in &mut items {
            item.expired = self.policy.is_overdue(&item.booking, now);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_clamps() {
        let filter = BookingFilter::default();
        assert_eq!(filter.paging(PENDING_PAGE_SIZE), (1, 10, 0));

        let filter = BookingFilter { page: Some(3), page_size: Some(500), ..Default::default() };
        assert_eq!(filter.paging(BOOKINGS_PAGE_SIZE), (3, 100, 200));

        let filter = BookingFilter { page: Some(0), page_size: Some(0), ..Default::default() };
        assert_eq!(filter.paging(BOOKINGS_PAGE_SIZE), (1, 1, 0));
    }

    #[test]
    fn date_filter_covers_the_whole_last_day() {
        let filter = BookingFilter {
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            to: NaiveDate::from_ymd_opt(2026, 3, 2),
            ..Default::default()
        };
        let (from, before) = filter.purchased_range();
        assert_eq!(from.map(|t| t.to_rfc3339()).as_deref(), Some("2026-03-01T00:00:00+00:00"));
        assert_eq!(before.map(|t| t.to_rfc3339()).as_deref(), Some("2026-03-03T00:00:00+00:00"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let filter = BookingFilter { search: Some("   ".into()), ..Default::default() };
        assert_eq!(filter.search(), None);
        let filter = BookingFilter { search: Some(" BK12 ".into()), ..Default::default() };
        assert_eq!(filter.search().as_deref(), Some("BK12"));
    }
}
