use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    /// `text` или `json`
    pub log_format: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    /// Сколько транзакция ждёт блокировку строки, прежде чем сдаться
    pub lock_timeout_ms: u64,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub seat_map_ttl_secs: u64,
}

// Настройки бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub payment_window_minutes: i64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            payment_window_minutes: 15,
            sweep_interval_secs: 60,
            sweep_batch_size: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingConfig::default();

        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_booking=debug,tower_http=debug".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parse_or("DB_POOL_SIZE", 20)?,
                lock_timeout_ms: parse_or("DB_LOCK_TIMEOUT_MS", 5000)?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
                seat_map_ttl_secs: parse_or("SEAT_MAP_TTL_SECS", 30)?,
            },
            booking: BookingConfig {
                payment_window_minutes: parse_or(
                    "PAYMENT_WINDOW_MINUTES",
                    defaults.payment_window_minutes,
                )?,
                sweep_interval_secs: parse_or("EXPIRY_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
                sweep_batch_size: parse_or("EXPIRY_SWEEP_BATCH_SIZE", defaults.sweep_batch_size)?,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
