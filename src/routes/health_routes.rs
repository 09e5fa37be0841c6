//! Health check endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::context;
use crate::error::ApiError;
use crate::query::SqlQuery;
use crate::state::AppState;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Round-trips a trivial query through the pool.
///
/// Returns 200 with pool statistics when the database answers; otherwise the
/// error's status code.
async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let env = state.env.clone();
    context::run(state.env, |ctx| async move {
        ctx.query(SqlQuery::new("SELECT 1")).await?;
        let stats = env.pool().stats();
        Ok(Json(json!({
            "status": "ok",
            "request_id": ctx.request_id().to_string(),
            "pool": {
                "stripes": stats.len(),
                "connections": stats.iter().map(|s| s.connections).sum::<u32>(),
                "in_use": stats.iter().map(|s| s.in_use).sum::<u32>(),
                "capacity": env.pool().capacity(),
            }
        })))
    })
    .await
}
