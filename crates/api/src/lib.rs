//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes
//! - Authentication middleware
//! - Response types

pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use coursepay_core::gateway::HttpGatewayClient;
use coursepay_core::payment::PaymentService;
use coursepay_db::{CourseRepository, PaymentRepository};
use coursepay_shared::JwtService;
use coursepay_shared::config::GatewaySettings;

/// The orchestrator wired to its production collaborators.
pub type LivePaymentService =
    PaymentService<HttpGatewayClient, PaymentRepository, CourseRepository>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Payment orchestrator.
    pub payments: Arc<LivePaymentService>,
    /// Gateway settings; handlers need the key id and webhook secret.
    pub gateway: Arc<GatewaySettings>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
