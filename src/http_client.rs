//! The process-wide outbound HTTP client.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::error::ApiError;

/// Owns the single `reqwest::Client` shared by every request.
///
/// `reqwest::Client` keeps its own connection pool behind an `Arc`, so one
/// instance serves any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct HttpClientManager {
    client: Client,
}

impl HttpClientManager {
    /// Build the TLS-enabled client.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        info!(
            "Created shared HTTP client (timeout {} ms)",
            config.timeout_ms
        );
        Ok(HttpClientManager { client })
    }

    /// Hand the shared client to `f`.
    pub async fn with_client<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a Client) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        f(&self.client).await
    }

    /// GET `url` and decode the JSON body. Non-success statuses are errors.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T, ApiError> {
        debug!("GET {}", url);
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}
