//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth::auth_middleware};

pub mod enrollments;
pub mod health;
pub mod payments;
pub mod payouts;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Protected routes that require authentication
    let protected_routes = Router::new()
        .merge(payments::routes())
        .merge(enrollments::routes())
        .merge(payouts::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The webhook authenticates by body signature, not by bearer token
    Router::new()
        .merge(health::routes())
        .merge(payments::webhook_routes())
        .merge(protected_routes)
}
