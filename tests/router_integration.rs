mod common;

use axum::http::StatusCode;
use common::{build_app, get, json_body, test_config};
use tower::ServiceExt;

const AUTHENTICATORS: &str = r#"
authenticators:
  - type: "userinfo"
    name: "github"
    userinfo_url: "https://api.github.com/user"
    realm: "github"
    username_claim: "login"
  - type: "userinfo"
    name: "google"
    userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo"
    realm: "google"
"#;

#[tokio::test]
async fn test_health_runs_a_query() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = build_app(test_config(&dir, ""));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pool"]["stripes"], 4);
    assert_eq!(body["pool"]["capacity"], 40);
    assert!(body["request_id"].as_str().is_some());
    assert_eq!(state.env.pool().in_use(), 0);
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir, "");
    config.database.url = dir
        .path()
        .join("missing")
        .join("nested")
        .join("test.db")
        .display()
        .to_string();
    config.database.acquire_timeout_secs = 1;
    let (app, _state) = build_app(config);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Service temporarily unavailable");
}

#[tokio::test]
async fn test_providers_lists_names_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = build_app(test_config(&dir, AUTHENTICATORS));

    let response = app.oneshot(get("/providers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["providers"], serde_json::json!(["github", "google"]));
    assert!(state.env.authenticators().lookup("google").is_some());
    assert!(state.env.authenticators().lookup("missing").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _state) = build_app(test_config(&dir, ""));

    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
