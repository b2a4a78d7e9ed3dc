//! API Routes
//!
//! One router per area, merged here:
//! - `/`, `/health` - greeting and store health
//! - `/jwt`, `/logout` - identity cookie
//! - `/add-job`, `/jobs`, `/job/{id}`, `/update-job/{id}`, `/all-jobs` - jobs
//! - `/add-bid`, `/bids/{email}`, `/bid-status-update/{id}` - bids

pub mod auth;
pub mod bids;
pub mod health;
pub mod jobs;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(jobs::router())
        .merge(bids::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
