mod common;

use chrono::Duration;
use common::{t0, Cinema, CUSTOMER, STAFF};

use cinema_booking::error::BookingError;
use cinema_booking::models::CancelReason;
use cinema_booking::services::ScheduleShow;

fn at(cinema: &Cinema, start: chrono::DateTime<chrono::Utc>) -> ScheduleShow {
    ScheduleShow { movie_id: cinema.movie.id, room_id: cinema.room.id, start_time: start }
}

#[tokio::test]
async fn new_show_gets_one_seat_per_room_seat() {
    let cinema = Cinema::new().await;

    assert_eq!(cinema.seats.len(), 3);
    assert_eq!(cinema.show.end_time - cinema.show.start_time, Duration::minutes(120));
    assert!(cinema.seats.iter().all(|s| !s.is_booked && s.booking_id.is_none()));
}

#[tokio::test]
async fn overlapping_shows_in_one_room_are_refused() {
    let cinema = Cinema::new().await;
    let start = cinema.show.start_time;

    // частичное пересечение
    let err = cinema.service.create_show(&at(&cinema, start + Duration::minutes(119))).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowOverlap { conflicting_show_id } if conflicting_show_id == cinema.show.id));

    // новый сеанс целиком накрывает существующий
    let long = cinema.store.add_movie("Director's cut", 300).await;
    let covering = ScheduleShow { movie_id: long.id, room_id: cinema.room.id, start_time: start - Duration::minutes(60) };
    let err = cinema.service.create_show(&covering).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowOverlap { .. }));

    // тот же интервал
    let err = cinema.service.create_show(&at(&cinema, start)).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowOverlap { .. }));
}

#[tokio::test]
async fn back_to_back_shows_are_fine() {
    let cinema = Cinema::new().await;

    let after = cinema.service.create_show(&at(&cinema, cinema.show.end_time)).await.unwrap();
    assert_eq!(after.seats_created, 3);

    let before = cinema
        .service
        .create_show(&at(&cinema, cinema.show.start_time - Duration::minutes(120)))
        .await
        .unwrap();
    assert_eq!(before.show.end_time, cinema.show.start_time);
}

#[tokio::test]
async fn other_rooms_do_not_conflict() {
    let cinema = Cinema::new().await;
    let hall2 = cinema.store.add_room("Hall 2").await;
    cinema.store.add_seat(hall2.id, "B", 1, cinema.standard.id).await;

    let request = ScheduleShow { movie_id: cinema.movie.id, room_id: hall2.id, start_time: cinema.show.start_time };
    let scheduled = cinema.service.create_show(&request).await.unwrap();
    assert_eq!(scheduled.seats_created, 1);
}

#[tokio::test]
async fn start_time_may_lag_only_slightly() {
    let cinema = Cinema::new().await;

    let err = cinema.service.create_show(&at(&cinema, t0() - Duration::minutes(6))).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidRequest(_)));

    cinema.service.create_show(&at(&cinema, t0() - Duration::minutes(4))).await.unwrap();
}

#[tokio::test]
async fn unknown_movie_or_room_is_not_found() {
    let cinema = Cinema::new().await;
    let start = cinema.show.end_time + Duration::hours(1);

    let err = cinema
        .service
        .create_show(&ScheduleShow { movie_id: 9_001, room_id: cinema.room.id, start_time: start })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { entity: "movie", .. }));

    let err = cinema
        .service
        .create_show(&ScheduleShow { movie_id: cinema.movie.id, room_id: 9_002, start_time: start })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { entity: "room", .. }));
}

#[tokio::test]
async fn shows_with_booked_seats_cannot_move_or_vanish() {
    let cinema = Cinema::new().await;
    cinema.service.reserve(cinema.show.id, &[cinema.a1()], CUSTOMER).await.unwrap();

    let err = cinema.service.delete_show(cinema.show.id).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowHasBookings { .. }));

    let later = at(&cinema, cinema.show.start_time + Duration::hours(5));
    let err = cinema.service.reschedule_show(cinema.show.id, &later).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowHasBookings { .. }));

    assert_eq!(cinema.booked_ids().await, vec![cinema.a1()]);
}

#[tokio::test]
async fn cancelled_bookings_still_pin_the_show() {
    let cinema = Cinema::new().await;
    let reservation = cinema.service.reserve(cinema.show.id, &[cinema.a1()], CUSTOMER).await.unwrap();
    cinema.service.cancel(reservation.booking_id, STAFF, CancelReason::StaffCancelled).await.unwrap();

    // мест не занято, перенос разрешён
    let later = at(&cinema, cinema.show.start_time + Duration::hours(5));
    cinema.service.reschedule_show(cinema.show.id, &later).await.unwrap();

    // но удалить нельзя: на сеанс ссылается бронь
    let err = cinema.service.delete_show(cinema.show.id).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowHasBookings { .. }));
}

#[tokio::test]
async fn reschedule_keeps_seats_unless_room_changes() {
    let cinema = Cinema::new().await;

    let later = at(&cinema, cinema.show.start_time + Duration::hours(3));
    let moved = cinema.service.reschedule_show(cinema.show.id, &later).await.unwrap();
    assert_eq!(moved.seats_created, 0);
    assert_eq!(moved.show.start_time, later.start_time);
    assert_eq!(cinema.store.show_seats(cinema.show.id).await, cinema.seats);

    let hall2 = cinema.store.add_room("Hall 2").await;
    cinema.store.add_seat(hall2.id, "C", 1, cinema.vip.id).await;
    cinema.store.add_seat(hall2.id, "C", 2, cinema.vip.id).await;
    let request = ScheduleShow { movie_id: cinema.movie.id, room_id: hall2.id, start_time: later.start_time };
    let moved = cinema.service.reschedule_show(cinema.show.id, &request).await.unwrap();
    assert_eq!(moved.seats_created, 2);

    let map = cinema.service.seat_map(cinema.show.id).await.unwrap();
    let labels: Vec<String> = map.iter().map(|e| format!("{}{}", e.row, e.col)).collect();
    assert_eq!(labels, ["C1", "C2"]);
}

#[tokio::test]
async fn reschedule_ignores_the_show_itself_but_not_its_neighbours() {
    let cinema = Cinema::new().await;
    let next = cinema.service.create_show(&at(&cinema, cinema.show.end_time)).await.unwrap();

    // сдвиг на 30 минут пересекается только с самим собой
    let shifted = at(&cinema, cinema.show.start_time - Duration::minutes(30));
    cinema.service.reschedule_show(cinema.show.id, &shifted).await.unwrap();

    let clash = at(&cinema, next.show.start_time - Duration::minutes(30));
    let err = cinema.service.reschedule_show(cinema.show.id, &clash).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowOverlap { conflicting_show_id } if conflicting_show_id == next.show.id));
}

#[tokio::test]
async fn empty_show_is_deleted_with_its_seats() {
    let cinema = Cinema::new().await;

    cinema.service.delete_show(cinema.show.id).await.unwrap();

    assert!(cinema.store.show_seats(cinema.show.id).await.is_empty());
    let err = cinema.service.seat_map(cinema.show.id).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound { .. }));
    let err = cinema.service.delete_show(cinema.show.id).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound { .. }));
}
