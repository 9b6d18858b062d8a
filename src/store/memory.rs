//! Хранилище в памяти для тестов и локальной отладки.
//!
//! Транзакция держит единственный мьютекс всё время своей жизни и работает с
//! копией состояния: `commit` записывает копию обратно, drop её выбрасывает.
//! Так транзакции строго сериализуются, а откат ничего не стоит.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingQuery, BookingStore, BookingSummary, LockMode, StoreError, StoreResult, StoreTx};
use crate::models::booking::{NewBooking, QR_TRANSACTION_TYPE};
use crate::models::seat::{Seat, SeatType};
use crate::models::show::intervals_overlap;
use crate::models::{Booking, BookingStatus, LockedSeat, Movie, Room, SeatMapEntry, ShowSeat, Show};

#[derive(Debug, Clone)]
struct Customer {
    name: String,
    email: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    customers: BTreeMap<String, Customer>,
    movies: BTreeMap<i64, Movie>,
    rooms: BTreeMap<i64, Room>,
    seat_types: BTreeMap<i64, SeatType>,
    seats: BTreeMap<i64, Seat>,
    shows: BTreeMap<i64, Show>,
    show_seats: BTreeMap<i64, ShowSeat>,
    bookings: BTreeMap<i64, Booking>,
    next_id: i64,
    conflict_on_claim: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn seat_details(&self, show_seat: &ShowSeat) -> StoreResult<(&Seat, &SeatType)> {
        let seat = self
            .seats
            .get(&show_seat.seat_id)
            .ok_or_else(|| StoreError::Corrupt(format!("show seat {} has no seat", show_seat.id)))?;
        let seat_type = self
            .seat_types
            .get(&seat.seat_type_id)
            .ok_or_else(|| StoreError::Corrupt(format!("seat {} has no seat type", seat.id)))?;
        Ok((seat, seat_type))
    }

    fn summarize(&self, booking: &Booking) -> StoreResult<BookingSummary> {
        let customer = booking.customer_id.as_ref().and_then(|id| self.customers.get(id));
        let show = self.shows.get(&booking.show_id);
        let movie = show.and_then(|s| self.movies.get(&s.movie_id));

        let mut positions = Vec::new();
        for show_seat in self.show_seats.values().filter(|ss| ss.booking_id == Some(booking.id)) {
            let (seat, _) = self.seat_details(show_seat)?;
            positions.push((seat.row.clone(), seat.col));
        }
        positions.sort();

        Ok(BookingSummary {
            booking: booking.clone(),
            customer_name: customer.map(|c| c.name.clone()),
            customer_email: customer.map(|c| c.email.clone()),
            movie_title: movie.map(|m| m.title.clone()),
            show_start: show.map(|s| s.start_time),
            seats: positions.into_iter().map(|(row, col)| format!("{row}{col}")).collect(),
            expired: false,
        })
    }

    fn matches(&self, booking: &Booking, query: &BookingQuery) -> bool {
        if query.booking_id.is_some_and(|id| booking.id != id) {
            return false;
        }
        if query.status.is_some_and(|status| booking.status != status) {
            return false;
        }
        if let Some(customer_id) = &query.customer_id {
            if booking.customer_id.as_ref() != Some(customer_id) {
                return false;
            }
        }
        if let Some(search) = &query.search {
            let needle = search.to_lowercase();
            let customer = booking.customer_id.as_ref().and_then(|id| self.customers.get(id));
            let hit = booking.booking_code.to_lowercase().contains(&needle)
                || customer.is_some_and(|c| {
                    c.name.to_lowercase().contains(&needle) || c.email.to_lowercase().contains(&needle)
                });
            if !hit {
                return false;
            }
        }
        if query.purchased_from.is_some_and(|from| booking.purchased_at < from) {
            return false;
        }
        if query.purchased_before.is_some_and(|before| booking.purchased_at >= before) {
            return false;
        }
        if query.deadline_after.is_some_and(|after| booking.payment_deadline <= after) {
            return false;
        }
        true
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- наполнение для тестов ---

    pub async fn add_customer(&self, id: &str, name: &str, email: &str) {
        let mut state = self.state.lock().await;
        state
            .customers
            .insert(id.to_string(), Customer { name: name.to_string(), email: email.to_string() });
    }

    pub async fn add_movie(&self, title: &str, duration_minutes: i32) -> Movie {
        let mut state = self.state.lock().await;
        let movie = Movie { id: state.next_id(), title: title.to_string(), duration_minutes };
        state.movies.insert(movie.id, movie.clone());
        movie
    }

    pub async fn add_room(&self, name: &str) -> Room {
        let mut state = self.state.lock().await;
        let room = Room { id: state.next_id(), name: name.to_string() };
        state.rooms.insert(room.id, room.clone());
        room
    }

    pub async fn add_seat_type(&self, name: &str, cost: i64) -> SeatType {
        let mut state = self.state.lock().await;
        let seat_type = SeatType { id: state.next_id(), name: name.to_string(), cost };
        state.seat_types.insert(seat_type.id, seat_type.clone());
        seat_type
    }

    pub async fn add_seat(&self, room_id: i64, row: &str, col: i32, seat_type_id: i64) -> Seat {
        let mut state = self.state.lock().await;
        let seat = Seat { id: state.next_id(), room_id, row: row.to_string(), col, seat_type_id };
        state.seats.insert(seat.id, seat.clone());
        seat
    }

    pub async fn set_seat_type_cost(&self, seat_type_id: i64, cost: i64) {
        let mut state = self.state.lock().await;
        if let Some(seat_type) = state.seat_types.get_mut(&seat_type_id) {
            seat_type.cost = cost;
        }
    }

    /// Места сеанса в порядке id.
    pub async fn show_seats(&self, show_id: i64) -> Vec<ShowSeat> {
        let state = self.state.lock().await;
        state.show_seats.values().filter(|ss| ss.show_id == show_id).cloned().collect()
    }

    pub async fn booking(&self, booking_id: i64) -> Option<Booking> {
        self.state.lock().await.bookings.get(&booking_id).cloned()
    }

    /// Следующий `claim_seats` завершится `StoreError::Conflict`, как при истечении lock_timeout.
    pub async fn inject_conflict_on_next_claim(&self) {
        self.state.lock().await.conflict_on_claim = true;
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = (*guard).clone();
        Ok(MemoryTx { guard, work })
    }

    async fn find_show(&self, show_id: i64) -> StoreResult<Option<Show>> {
        Ok(self.state.lock().await.shows.get(&show_id).cloned())
    }

    async fn find_booking(&self, booking_id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn list_bookings(&self, query: &BookingQuery) -> StoreResult<Vec<BookingSummary>> {
        let state = self.state.lock().await;
        let mut found: Vec<&Booking> = state.bookings.values().filter(|b| state.matches(b, query)).collect();
        found.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        found
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|booking| state.summarize(booking))
            .collect()
    }

    async fn seat_map(&self, show_id: i64) -> StoreResult<Option<Vec<SeatMapEntry>>> {
        let state = self.state.lock().await;
        if !state.shows.contains_key(&show_id) {
            return Ok(None);
        }
        let mut entries = Vec::new();
        for show_seat in state.show_seats.values().filter(|ss| ss.show_id == show_id) {
            let (seat, seat_type) = state.seat_details(show_seat)?;
            entries.push(SeatMapEntry {
                show_seat_id: show_seat.id,
                row: seat.row.clone(),
                col: seat.col,
                seat_type: seat_type.name.clone(),
                cost: seat_type.cost,
                is_booked: show_seat.is_booked,
            });
        }
        entries.sort_by(|a, b| a.row.cmp(&b.row).then(a.col.cmp(&b.col)));
        Ok(Some(entries))
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<i64>> {
        let state = self.state.lock().await;
        let mut overdue: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::PendingPayment && b.payment_deadline < now)
            .collect();
        overdue.sort_by_key(|b| b.payment_deadline);
        Ok(overdue
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|b| b.id)
            .collect())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_show(&mut self, show_id: i64, _mode: LockMode) -> StoreResult<Option<Show>> {
        Ok(self.work.shows.get(&show_id).cloned())
    }

    async fn lock_show_seats(&mut self, show_id: i64, show_seat_ids: &[i64]) -> StoreResult<Vec<LockedSeat>> {
        let mut ids = show_seat_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut locked = Vec::new();
        for id in ids {
            let Some(show_seat) = self.work.show_seats.get(&id) else { continue };
            if show_seat.show_id != show_id {
                continue;
            }
            let (seat, seat_type) = self.work.seat_details(show_seat)?;
            locked.push(LockedSeat {
                show_seat_id: show_seat.id,
                row: seat.row.clone(),
                col: seat.col,
                cost: seat_type.cost,
                is_booked: show_seat.is_booked,
            });
        }
        Ok(locked)
    }

    async fn insert_booking(&mut self, new: &NewBooking) -> StoreResult<Booking> {
        if self.work.bookings.values().any(|b| b.booking_code == new.booking_code) {
            return Err(StoreError::UniqueViolation("bookings_booking_code_key".to_string()));
        }
        let booking = Booking {
            id: self.work.next_id(),
            booking_code: new.booking_code.clone(),
            show_id: new.show_id,
            customer_id: Some(new.customer_id.clone()),
            status: BookingStatus::PendingPayment,
            total_cost: new.total_cost,
            purchased_at: new.purchased_at,
            payment_deadline: new.payment_deadline,
            staff_confirmed_by: None,
            transaction_type: QR_TRANSACTION_TYPE.to_string(),
        };
        self.work.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn claim_seats(&mut self, show_id: i64, booking_id: i64, show_seat_ids: &[i64]) -> StoreResult<u64> {
        if self.guard.conflict_on_claim {
            // флаг сбрасывается сразу, не дожидаясь commit
            self.guard.conflict_on_claim = false;
            self.work.conflict_on_claim = false;
            return Err(StoreError::Conflict);
        }
        let mut claimed = 0;
        for id in show_seat_ids {
            if let Some(show_seat) = self.work.show_seats.get_mut(id) {
                if show_seat.show_id == show_id && !show_seat.is_booked {
                    show_seat.is_booked = true;
                    show_seat.booking_id = Some(booking_id);
                    claimed += 1;
                }
            }
        }
        Ok(claimed)
    }

    async fn lock_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.work.bookings.get(&booking_id).cloned())
    }

    async fn update_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        staff_id: Option<&str>,
    ) -> StoreResult<Booking> {
        let booking = self
            .work
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| StoreError::Corrupt(format!("booking {booking_id} vanished")))?;
        booking.status = status;
        booking.staff_confirmed_by = staff_id.map(str::to_string);
        Ok(booking.clone())
    }

    async fn release_seats(&mut self, booking_id: i64) -> StoreResult<Vec<i64>> {
        let mut released = Vec::new();
        for show_seat in self.work.show_seats.values_mut() {
            if show_seat.booking_id == Some(booking_id) {
                show_seat.is_booked = false;
                show_seat.booking_id = None;
                released.push(show_seat.id);
            }
        }
        Ok(released)
    }

    async fn find_movie(&mut self, movie_id: i64) -> StoreResult<Option<Movie>> {
        Ok(self.work.movies.get(&movie_id).cloned())
    }

    async fn lock_room(&mut self, room_id: i64) -> StoreResult<Option<Room>> {
        Ok(self.work.rooms.get(&room_id).cloned())
    }

    async fn find_overlapping_show(
        &mut self,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_show_id: Option<i64>,
    ) -> StoreResult<Option<Show>> {
        Ok(self
            .work
            .shows
            .values()
            .filter(|s| s.room_id == room_id && Some(s.id) != exclude_show_id)
            .filter(|s| intervals_overlap(s.start_time, s.end_time, start, end))
            .min_by_key(|s| s.start_time)
            .cloned())
    }

    async fn insert_show(
        &mut self,
        movie_id: i64,
        room_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Show> {
        let show = Show { id: self.work.next_id(), movie_id, room_id, start_time: start, end_time: end };
        self.work.shows.insert(show.id, show.clone());
        Ok(show)
    }

    async fn update_show(&mut self, show: &Show) -> StoreResult<()> {
        self.work.shows.insert(show.id, show.clone());
        Ok(())
    }

    async fn count_booked_seats(&mut self, show_id: i64) -> StoreResult<i64> {
        let count = self
            .work
            .show_seats
            .values()
            .filter(|ss| ss.show_id == show_id && ss.is_booked)
            .count();
        Ok(count as i64)
    }

    async fn count_show_bookings(&mut self, show_id: i64) -> StoreResult<i64> {
        let count = self.work.bookings.values().filter(|b| b.show_id == show_id).count();
        Ok(count as i64)
    }

    async fn create_show_seats(&mut self, show_id: i64, room_id: i64) -> StoreResult<u64> {
        let seat_ids: Vec<i64> = self.work.seats.values().filter(|s| s.room_id == room_id).map(|s| s.id).collect();
        for seat_id in &seat_ids {
            let id = self.work.next_id();
            self.work
                .show_seats
                .insert(id, ShowSeat { id, show_id, seat_id: *seat_id, is_booked: false, booking_id: None });
        }
        Ok(seat_ids.len() as u64)
    }

    async fn delete_show_seats(&mut self, show_id: i64) -> StoreResult<u64> {
        let before = self.work.show_seats.len();
        self.work.show_seats.retain(|_, ss| ss.show_id != show_id);
        Ok((before - self.work.show_seats.len()) as u64)
    }

    async fn delete_show(&mut self, show_id: i64) -> StoreResult<()> {
        self.work.shows.remove(&show_id);
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}
