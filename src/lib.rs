// SoloSphere - job marketplace API: buyers post jobs, freelancers bid on them

pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
