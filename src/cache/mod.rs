use crate::redis_client::RedisClient;

pub mod seats;

/// Кеш карт мест в Redis. Кеш вспомогательный: любая ошибка Redis означает
/// чтение из БД, а не отказ запроса.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seat_map_ttl_secs: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, seat_map_ttl_secs: u64) -> Self {
        Self { redis, seat_map_ttl_secs }
    }
}
