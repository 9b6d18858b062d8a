use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::BookingService;
use crate::error::BookingError;
use crate::models::Show;
use crate::store::{BookingStore, LockMode, StoreTx};

/// Насколько начало нового сеанса может отставать от текущего времени.
const START_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScheduleShow {
    #[validate(range(min = 1))]
    pub movie_id: i64,
    #[validate(range(min = 1))]
    pub room_id: i64,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledShow {
    pub show: Show,
    /// Сколько мест сеанса создано (0, если места сохранились)
    pub seats_created: u64,
}

impl<S: BookingStore> BookingService<S> {
    pub async fn create_show(&self, request: &ScheduleShow) -> Result<ScheduledShow, BookingError> {
        self.check_schedule_request(request)?;

        let mut tx = self.store.begin().await?;
        // Блокировка зала сериализует параллельные проверки пересечений
        tx.lock_room(request.room_id)
            .await?
            .ok_or_else(|| BookingError::not_found("room", request.room_id))?;
        let movie = tx
            .find_movie(request.movie_id)
            .await?
            .ok_or_else(|| BookingError::not_found("movie", request.movie_id))?;

        let end_time = movie.end_time_from(request.start_time);
        if let Some(other) = tx
            .find_overlapping_show(request.room_id, request.start_time, end_time, None)
            .await?
        {
            warn!("Show in room {} overlaps show {}", request.room_id, other.id);
            return Err(BookingError::ShowOverlap { conflicting_show_id: other.id });
        }

        let show = tx
            .insert_show(movie.id, request.room_id, request.start_time, end_time)
            .await?;
        let seats_created = tx.create_show_seats(show.id, show.room_id).await?;
        tx.commit().await?;

        info!("🎬 Show {} scheduled in room {} with {} seats", show.id, show.room_id, seats_created);
        Ok(ScheduledShow { show, seats_created })
    }

    /// Перенос сеанса. Смена зала или фильма пересоздаёт места.
    pub async fn reschedule_show(&self, show_id: i64, request: &ScheduleShow) -> Result<ScheduledShow, BookingError> {
        self.check_schedule_request(request)?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_show(show_id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| BookingError::not_found("show", show_id))?;
        if tx.count_booked_seats(show_id).await? > 0 {
            return Err(BookingError::ShowHasBookings { show_id });
        }

        tx.lock_room(request.room_id)
            .await?
            .ok_or_else(|| BookingError::not_found("room", request.room_id))?;
        let movie = tx
            .find_movie(request.movie_id)
            .await?
            .ok_or_else(|| BookingError::not_found("movie", request.movie_id))?;

        let end_time = movie.end_time_from(request.start_time);
        if let Some(other) = tx
            .find_overlapping_show(request.room_id, request.start_time, end_time, Some(show_id))
            .await?
        {
            return Err(BookingError::ShowOverlap { conflicting_show_id: other.id });
        }

        let show = Show {
            id: show_id,
            movie_id: movie.id,
            room_id: request.room_id,
            start_time: request.start_time,
            end_time,
        };
        tx.update_show(&show).await?;

        let mut seats_created = 0;
        if current.room_id != show.room_id || current.movie_id != show.movie_id {
            tx.delete_show_seats(show_id).await?;
            seats_created = tx.create_show_seats(show_id, show.room_id).await?;
        }
        tx.commit().await?;

        info!("🎬 Show {} rescheduled to {}", show_id, show.start_time);
        Ok(ScheduledShow { show, seats_created })
    }

    /// Удаление сеанса вместе с местами. Сеанс, на который есть хоть одна
    /// бронь (даже отменённая), не удаляется: брони ссылаются на него.
    pub async fn delete_show(&self, show_id: i64) -> Result<(), BookingError> {
        let mut tx = self.store.begin().await?;
        tx.lock_show(show_id, LockMode::Exclusive)
            .await?
            .ok_or_else(|| BookingError::not_found("show", show_id))?;
        if tx.count_booked_seats(show_id).await? > 0 || tx.count_show_bookings(show_id).await? > 0 {
            return Err(BookingError::ShowHasBookings { show_id });
        }

        tx.delete_show_seats(show_id).await?;
        tx.delete_show(show_id).await?;
        tx.commit().await?;

        info!("🗑️ Show {} deleted", show_id);
        Ok(())
    }

    fn check_schedule_request(&self, request: &ScheduleShow) -> Result<(), BookingError> {
        request
            .validate()
            .map_err(|e| BookingError::InvalidRequest(e.to_string()))?;
        let earliest = self.clock.now() - Duration::minutes(START_GRACE_MINUTES);
        if request.start_time < earliest {
            return Err(BookingError::InvalidRequest("show cannot start in the past".into()));
        }
        Ok(())
    }
}
