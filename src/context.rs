//! Per-request execution context.
//!
//! A [`Context`] is created by [`run`] for exactly one handler invocation and
//! moved into it. Handler steps return `Result<_, ApiError>` and chain with
//! `?`, so the first failing step ends the request and becomes its outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::authenticators::Authenticator;
use crate::env::Env;
use crate::error::ApiError;
use crate::jwt::{Claims, SignedToken};
use crate::models::User;
use crate::query::{self, Query};
use crate::utils::logger::{emit, LogMessage, Logger, Severity};

/// What every execution context offers handler code besides logging.
pub trait ExecutionContext: Logger {
    fn env(&self) -> &Env;

    /// End the current step with `error`.
    fn fail<T>(&self, error: impl Into<ApiError>) -> Result<T, ApiError> {
        Err(error.into())
    }
}

/// The per-request bundle of environment access and logging.
pub struct Context {
    env: Arc<Env>,
    request_id: Uuid,
    started: Instant,
}

impl Context {
    fn new(env: Arc<Env>) -> Self {
        Context {
            env,
            request_id: Uuid::new_v4(),
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Log `query` at Debug, then run it on a pooled connection.
    pub async fn query<Q: Query>(&self, query: Q) -> Result<Vec<Q::Row>, ApiError> {
        query::execute(self, self.env.pool(), query).await
    }

    pub fn authenticator(&self, name: &str) -> Option<&dyn Authenticator> {
        self.env.authenticators().lookup(name)
    }

    /// Run the login flow of the authenticator called `name`.
    pub async fn authenticate(&self, name: &str, credential: &str) -> Result<User, ApiError> {
        let authenticator = self
            .authenticator(name)
            .ok_or_else(|| ApiError::not_found(format!("no authenticator named '{}'", name)))?;
        let user = authenticator.authenticate(self.env.http(), credential).await?;
        self.info(&format!(
            "Authenticated '{}' via '{}'",
            user.subject(),
            name
        ));
        Ok(user)
    }

    pub fn issue_token(
        &self,
        user: &User,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<SignedToken, ApiError> {
        Ok(self.env.jwt().issue(user, expiry)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        Ok(self.env.jwt().verify(token)?)
    }

    /// Hand the shared HTTP client to `f`.
    pub async fn with_http<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a Client) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        self.env.http().with_client(f).await
    }
}

impl Logger for Context {
    fn log(&self, severity: Severity, message: &str) {
        emit(&LogMessage::new(severity, message));
    }
}

impl ExecutionContext for Context {
    fn env(&self) -> &Env {
        &self.env
    }
}

/// Run `handler` inside a fresh context bound to `env` and return its outcome.
///
/// The outcome is logged (Debug on success, Warning on failure) and passed
/// back unchanged.
pub async fn run<T, F, Fut>(env: Arc<Env>, handler: F) -> Result<T, ApiError>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let context = Context::new(env);
    let request_id = context.request_id;
    let started = context.started;
    let span = info_span!("request", request_id = %request_id);

    let outcome = handler(context).instrument(span).await;

    let message = match &outcome {
        Ok(_) => LogMessage::new(
            Severity::Debug,
            format!("Request {} completed in {:?}", request_id, started.elapsed()),
        ),
        Err(e) => LogMessage::new(
            Severity::Warning,
            format!(
                "Request {} failed after {:?}: {}",
                request_id,
                started.elapsed(),
                e
            ),
        ),
    };
    emit(&message);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigV1;
    use crate::error::ErrorKind;
    use crate::query::SqlQuery;

    fn test_env(dir: &tempfile::TempDir) -> Arc<Env> {
        let mut config = ConfigV1::with_database(dir.path().join("ctx.db").display().to_string());
        config.database.min_idle_per_stripe = 0;
        config.jwt.secret = Some("context-test-secret".to_string());
        Arc::new(Env::new(&config, vec![]).unwrap())
    }

    #[tokio::test]
    async fn test_success_outcome_is_handler_value() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(&dir);

        let rows = run(env.clone(), |ctx| async move {
            ctx.debug("starting");
            ctx.query(SqlQuery::new("SELECT 1 AS one")).await
        })
        .await
        .unwrap();

        assert_eq!(rows[0]["one"], 1);
        assert_eq!(env.pool().in_use(), 0);
    }

    #[tokio::test]
    async fn test_fail_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(&dir);

        let outcome: Result<(), ApiError> = run(env, |ctx| async move {
            let _: () = ctx.fail(ApiError::bad_request("nope"))?;
            ctx.query(SqlQuery::new("CREATE TABLE never (id INTEGER)"))
                .await?;
            Ok(())
        })
        .await;

        assert_eq!(outcome.unwrap_err().kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_unknown_authenticator_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(&dir);

        let outcome = run(env, |ctx| async move {
            assert!(ctx.authenticator("github").is_none());
            ctx.authenticate("github", "token").await
        })
        .await;

        assert_eq!(outcome.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_tokens_round_trip_through_context() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(&dir);
        let user = User::new("github", "octocat", Some(vec!["dev".to_string()]), None);

        let claims = run(env, |ctx| async move {
            let token = ctx.issue_token(&user, None)?;
            ctx.verify_token(token.as_str())
        })
        .await
        .unwrap();

        assert_eq!(claims.sub, "github-octocat");
        assert_eq!(claims.roles, vec!["dev".to_string()]);
    }

    #[tokio::test]
    async fn test_each_run_gets_its_own_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(&dir);

        let first = run(env.clone(), |ctx| async move { Ok(ctx.request_id()) })
            .await
            .unwrap();
        let second = run(env, |ctx| async move { Ok(ctx.request_id()) })
            .await
            .unwrap();
        assert_ne!(first, second);
    }
}
