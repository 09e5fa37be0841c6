use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::userinfo::{UserInfoAuthenticator, UserInfoConfig};
use crate::error::ApiError;
use crate::http_client::HttpClientManager;
use crate::models::User;

/// Configuration options for each authenticator.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum AuthenticatorConfig {
    #[serde(rename = "userinfo")]
    UserInfo(UserInfoConfig),
}

/// A named login provider.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Stable name used for lookup, e.g. `"github"`.
    fn name(&self) -> &str;

    /// Complete the provider's login flow for `credential` (an access token
    /// or authorization code, depending on the provider) and produce a user.
    async fn authenticate(
        &self,
        http: &HttpClientManager,
        credential: &str,
    ) -> Result<User, ApiError>;
}

/// Create an authenticator from a given config.
pub fn create_authenticator(config: &AuthenticatorConfig) -> Box<dyn Authenticator> {
    match config {
        AuthenticatorConfig::UserInfo(cfg) => Box::new(UserInfoAuthenticator::new(cfg)),
    }
}

/// The read-only, ordered set of authenticators known to the process.
#[derive(Default)]
pub struct Authenticators {
    entries: Vec<Box<dyn Authenticator>>,
}

impl Authenticators {
    pub fn new(entries: Vec<Box<dyn Authenticator>>) -> Self {
        info!(
            "Registered {} authenticator(s): [{}]",
            entries.len(),
            entries
                .iter()
                .map(|a| a.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Authenticators { entries }
    }

    /// First authenticator called `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<&dyn Authenticator> {
        self.entries
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|a| a.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Authenticator> {
        self.entries.iter().map(|a| a.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Box<dyn Authenticator>>> for Authenticators {
    fn from(entries: Vec<Box<dyn Authenticator>>) -> Self {
        Authenticators::new(entries)
    }
}
