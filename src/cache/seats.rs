use crate::cache::CacheService;
use crate::models::SeatMapEntry;
use redis::AsyncCommands;
use tracing::{info, warn};

// Поколение карты мест: растёт при каждой инвалидации
fn seat_map_generation_key(show_id: i64) -> String {
    format!("seats:show:{}:gen", show_id)
}

fn seat_map_key(show_id: i64, generation: u64) -> String {
    format!("seats:show:{}:v{}", show_id, generation)
}

/// Результат чтения карты мест из кеша.
#[derive(Debug)]
pub enum CachedSeatMap {
    Hit(Vec<SeatMapEntry>),
    /// Промах. Свежую карту можно положить только под этим поколением,
    /// `None` значит Redis недоступен и писать не нужно.
    Miss(Option<u64>),
}

impl CacheService {
    pub async fn cached_seat_map(&self, show_id: i64) -> CachedSeatMap {
        match self.get_seat_map_from_cache(show_id).await {
            Ok((generation, Some(seats))) => {
                info!("Seat map cache hit for show {} (v{})", show_id, generation);
                CachedSeatMap::Hit(seats)
            }
            Ok((generation, None)) => CachedSeatMap::Miss(Some(generation)),
            Err(e) => {
                warn!("Seat map cache read failed for show {}: {}", show_id, e);
                CachedSeatMap::Miss(None)
            }
        }
    }

    /// Если между чтением из БД и записью случилась инвалидация, карта ляжет
    /// под устаревшим поколением и её никто не прочитает.
    pub async fn store_seat_map(&self, show_id: i64, generation: u64, seats: &[SeatMapEntry]) {
        if let Err(e) = self.save_seat_map_to_cache(show_id, generation, seats).await {
            warn!("Seat map cache write failed for show {}: {}", show_id, e);
        }
    }

    // Сбросить кеш после любого изменения мест сеанса
    pub async fn invalidate_seats(&self, show_id: i64) {
        let mut conn = self.redis.conn.clone();
        match conn.incr::<_, _, u64>(seat_map_generation_key(show_id), 1).await {
            Ok(generation) => info!("Invalidated seats cache for show {} (now v{})", show_id, generation),
            Err(e) => warn!("Seat map cache invalidation failed for show {}: {}", show_id, e),
        }
    }

    // === Работа с кешем ===
    async fn get_seat_map_from_cache(
        &self,
        show_id: i64,
    ) -> Result<(u64, Option<Vec<SeatMapEntry>>), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let generation: Option<u64> = conn.get(seat_map_generation_key(show_id)).await?;
        let generation = generation.unwrap_or(0);

        let data: Option<String> = conn.get(seat_map_key(show_id, generation)).await?;
        let Some(data) = data else { return Ok((generation, None)) };
        let seats: Vec<SeatMapEntry> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok((generation, Some(seats)))
    }

    async fn save_seat_map_to_cache(
        &self,
        show_id: i64,
        generation: u64,
        seats: &[SeatMapEntry],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(seat_map_key(show_id, generation), data, self.seat_map_ttl_secs).await
    }
}
