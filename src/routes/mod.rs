//! HTTP route definitions and handlers.
//!
//! Every handler does its work inside a request context (see [`crate::context::run`]).

mod health_routes;
mod provider_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(provider_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
