pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use std::sync::Arc;

use clock::SystemClock;
use services::{BookingService, ExpiryPolicy};
use store::postgres::PgStore;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub bookings: BookingService<PgStore>,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database).await?;
        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let cache = cache::CacheService::new(redis.clone(), config.redis.seat_map_ttl_secs);

        let store = Arc::new(db.booking_store(config.database.lock_timeout_ms));
        let bookings = BookingService::new(
            store,
            Arc::new(SystemClock),
            ExpiryPolicy::new(config.booking.payment_window_minutes),
        );

        Ok(Arc::new(Self { db, redis, cache, config, bookings }))
    }
}
