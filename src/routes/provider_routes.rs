//! Authenticator listing endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::context::{self, ExecutionContext};
use crate::error::ApiError;
use crate::state::AppState;
use crate::utils::logger::Logger;

/// Registers provider information routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/providers", get(list_providers))
}

/// Names of the registered authenticators, in lookup order.
async fn list_providers(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    context::run(state.env, |ctx| async move {
        let names = ctx.env().authenticators().names();
        ctx.info(&format!("Listing {} authenticator(s)", names.len()));
        Ok(Json(json!({ "providers": names })))
    })
    .await
}
