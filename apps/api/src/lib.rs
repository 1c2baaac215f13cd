//! Potluck API library
//!
//! This module exposes the core API components for use in integration tests
//! and as a library.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod websocket;

use axum::{extract::Extension, routing::get, Router};

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse, PartyError};
pub use services::{Party, PartyRegistry, RegistryStats};

use routes::{health_router, parties_router, HealthState};

/// Build the application router without transport layers (CORS, tracing)
///
/// # Routes
/// - `GET /` - Banner
/// - `/health`, `/health/live`, `/health/ready`
/// - `GET /parties`, `GET /parties/:code`, `GET /parties/ws`
pub fn router(registry: PartyRegistry) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/health", health_router(HealthState::new(registry.clone())))
        .nest("/parties", parties_router(registry.clone()))
        .layer(Extension(registry))
}

async fn root() -> &'static str {
    "Welcome to Potluck - Watch Party Sync"
}
