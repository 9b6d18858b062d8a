use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{config::Config, controllers, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    if config.app.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting cinema booking API ({})", config.app.environment);

    // БД, миграции, Redis и сервис бронирования
    let app_state = AppState::new(config.clone())
        .await
        .context("Failed to initialise application state")?;
    info!("Database and Redis connected");

    // --- Start background tasks ---
    #[cfg(feature = "expiry-sweeper")]
    spawn_expiry_sweeper(app_state.clone());

    // --- Start the web server ---
    let app = Router::new()
        .route("/", get(|| async { "Cinema booking API v1.0" }))
        .route("/health", get(controllers::health::health))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[cfg(feature = "expiry-sweeper")]
fn spawn_expiry_sweeper(state: Arc<AppState>) {
    use cinema_booking::services::ExpirySweeper;
    use std::time::Duration;

    let sweeper = ExpirySweeper::new(state.bookings.clone(), state.config.booking.sweep_batch_size);
    let interval = Duration::from_secs(state.config.booking.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        loop {
            match sweeper.run_once().await {
                Ok(report) => {
                    for show_id in report.affected_shows {
                        state.cache.invalidate_seats(show_id).await;
                    }
                }
                Err(e) => tracing::error!("⏰ Expiry sweep failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    });
}
