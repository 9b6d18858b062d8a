pub mod bookings;
pub mod error;
pub mod health;
pub mod shows;
pub mod staff;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(bookings::routes())
        .merge(staff::routes())
        .merge(shows::routes())
}
