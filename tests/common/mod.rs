//! Общий стенд для интеграционных тестов: зал из трёх мест, один сеанс
//! завтра, два клиента и часы, которые двигаются только вручную.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use cinema_booking::clock::ManualClock;
use cinema_booking::models::seat::SeatType;
use cinema_booking::models::{Movie, Room, Show, ShowSeat};
use cinema_booking::services::{BookingService, ExpiryPolicy, ScheduleShow};
use cinema_booking::store::memory::MemoryStore;

pub const CUSTOMER: &str = "cust-1";
pub const OTHER_CUSTOMER: &str = "cust-2";
pub const STAFF: &str = "staff-1";

pub const STANDARD_COST: i64 = 70_000;
pub const VIP_COST: i64 = 90_000;

pub struct Cinema {
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub service: BookingService<MemoryStore>,
    pub movie: Movie,
    pub room: Room,
    pub standard: SeatType,
    pub vip: SeatType,
    pub show: Show,
    /// A1 (стандарт), A2 (VIP), A3 (стандарт)
    pub seats: Vec<ShowSeat>,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

impl Cinema {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(t0());
        let service = BookingService::new(store.clone(), Arc::new(clock.clone()), ExpiryPolicy::new(15));

        store.add_customer(CUSTOMER, "Lan Nguyen", "lan@example.com").await;
        store.add_customer(OTHER_CUSTOMER, "Minh Tran", "minh@example.com").await;

        let movie = store.add_movie("Mai", 120).await;
        let room = store.add_room("Hall 1").await;
        let standard = store.add_seat_type("Standard", STANDARD_COST).await;
        let vip = store.add_seat_type("VIP", VIP_COST).await;
        store.add_seat(room.id, "A", 1, standard.id).await;
        store.add_seat(room.id, "A", 2, vip.id).await;
        store.add_seat(room.id, "A", 3, standard.id).await;

        let scheduled = service
            .create_show(&ScheduleShow { movie_id: movie.id, room_id: room.id, start_time: t0() + Duration::days(1) })
            .await
            .unwrap();
        let seats = store.show_seats(scheduled.show.id).await;

        Cinema { store, clock, service, movie, room, standard, vip, show: scheduled.show, seats }
    }

    pub fn a1(&self) -> i64 {
        self.seats[0].id
    }

    pub fn a2(&self) -> i64 {
        self.seats[1].id
    }

    pub fn a3(&self) -> i64 {
        self.seats[2].id
    }

    pub async fn seat(&self, show_seat_id: i64) -> ShowSeat {
        self.store
            .show_seats(self.show.id)
            .await
            .into_iter()
            .find(|s| s.id == show_seat_id)
            .unwrap()
    }

    pub async fn booked_ids(&self) -> Vec<i64> {
        self.store
            .show_seats(self.show.id)
            .await
            .into_iter()
            .filter(|s| s.is_booked)
            .map(|s| s.id)
            .collect()
    }

    /// Место занято тогда и только тогда, когда его бронь живая.
    pub async fn assert_seats_consistent(&self) {
        for seat in self.store.show_seats(self.show.id).await {
            match seat.booking_id {
                Some(booking_id) => {
                    assert!(seat.is_booked, "seat {} has booking but is free", seat.id);
                    let booking = self.store.booking(booking_id).await.unwrap();
                    assert!(
                        booking.status.holds_seats(),
                        "seat {} held by {} booking {}",
                        seat.id,
                        booking.status,
                        booking_id
                    );
                }
                None => assert!(!seat.is_booked, "seat {} booked without booking", seat.id),
            }
        }
    }
}
