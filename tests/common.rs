#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use figment::providers::{Format, Yaml};
use figment::Figment;
use reqenv::config::{extract_config, ConfigV1};
use reqenv::routes::create_router;
use reqenv::startup::build_state;
use reqenv::state::AppState;
use serde_json::Value;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret";

/// A config pointing at a fresh database inside `dir`, with `extra` YAML
/// appended at the top level.
pub fn test_config(dir: &TempDir, extra: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
database:
  url: "{db}"
  min_idle_per_stripe: 0
jwt:
  iss: "reqenv-tests"
  secret: "{secret}"
{extra}
"#,
        db = dir.path().join("test.db").display(),
        secret = TEST_SECRET,
        extra = extra,
    );
    extract_config(&Figment::from(Yaml::string(&yaml))).expect("test config should parse")
}

pub fn build_app(config: ConfigV1) -> (Router, AppState) {
    let state = build_state(Arc::new(config)).expect("state should build");
    (create_router(state.clone()), state)
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
