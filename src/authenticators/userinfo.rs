use std::collections::HashMap;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::base::Authenticator;
use crate::error::ApiError;
use crate::http_client::HttpClientManager;
use crate::models::User;
use crate::utils::value::value_to_string;

/// Config for an authenticator backed by an OAuth2/OpenID user-info endpoint.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct UserInfoConfig {
    /// Name used to look the authenticator up.
    pub name: String,
    pub userinfo_url: String,
    /// Realm stamped on every user this authenticator produces.
    pub realm: String,
    /// Claim holding the username; falls back to `sub`.
    #[serde(default = "default_username_claim")]
    pub username_claim: String,
}

fn default_username_claim() -> String {
    "preferred_username".to_string()
}

/// Treats the credential as an access token and asks the provider who it belongs to.
pub struct UserInfoAuthenticator {
    config: UserInfoConfig,
}

impl UserInfoAuthenticator {
    pub fn new(config: &UserInfoConfig) -> Self {
        info!(
            "Creating userinfo authenticator '{}' for realm '{}'",
            config.name, config.realm
        );
        Self {
            config: config.clone(),
        }
    }

    /// Map the user-info document onto a `User`.
    fn user_from_claims(&self, mut claims: Map<String, Value>) -> Result<User, ApiError> {
        let username = claims
            .get(&self.config.username_claim)
            .or_else(|| claims.get("sub"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ApiError::unauthorized(format!(
                    "'{}' returned no '{}' or 'sub' claim",
                    self.config.name, self.config.username_claim
                ))
            })?;

        let roles = match claims.remove("roles") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let attributes: HashMap<String, String> = claims
            .into_iter()
            .map(|(key, value)| (key, value_to_string(value)))
            .collect();

        Ok(User::new(
            self.config.realm.clone(),
            username,
            Some(roles),
            Some(attributes),
        ))
    }
}

#[async_trait]
impl Authenticator for UserInfoAuthenticator {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(
        &self,
        http: &HttpClientManager,
        credential: &str,
    ) -> Result<User, ApiError> {
        if credential.trim().is_empty() {
            return Err(ApiError::unauthorized("empty access token"));
        }
        debug!(
            "Fetching user info for authenticator '{}' from {}",
            self.config.name, self.config.userinfo_url
        );

        let claims: Map<String, Value> = http
            .get_json(&self.config.userinfo_url, Some(credential))
            .await?;
        self.user_from_claims(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::error::ErrorKind;
    use mockito::Server;

    fn config(url: String) -> UserInfoConfig {
        UserInfoConfig {
            name: "google".to_string(),
            userinfo_url: url,
            realm: "google".to_string(),
            username_claim: "email".to_string(),
        }
    }

    #[tokio::test]
    async fn test_userinfo_maps_claims_onto_user() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"sub": "1234", "email": "ada@example.com", "roles": ["admin", 7],
                    "email_verified": true, "nested": {"a": 1}}"#,
            )
            .create_async()
            .await;

        let authenticator = UserInfoAuthenticator::new(&config(format!("{}/userinfo", server.url())));
        let http = HttpClientManager::new(&HttpConfig::default()).unwrap();
        let user = authenticator
            .authenticate(&http, "token-1")
            .await
            .expect("authentication should succeed");

        m.assert_async().await;
        assert_eq!(user.realm, "google");
        assert_eq!(user.username, "ada@example.com");
        assert_eq!(user.roles, vec!["admin".to_string()]);
        assert_eq!(user.attributes["sub"], "1234");
        assert_eq!(user.attributes["email_verified"], "true");
        assert_eq!(user.attributes["nested"], "{\"a\":1}");
        assert!(!user.attributes.contains_key("roles"));
    }

    #[test]
    fn test_userinfo_falls_back_to_sub() {
        let authenticator = UserInfoAuthenticator::new(&config("http://unused".to_string()));
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::from("1234"));
        let user = authenticator.user_from_claims(claims).unwrap();
        assert_eq!(user.username, "1234");

        let err = authenticator.user_from_claims(Map::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_rejected_token_is_upstream_error() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/userinfo")
            .with_status(401)
            .create_async()
            .await;

        let authenticator = UserInfoAuthenticator::new(&config(format!("{}/userinfo", server.url())));
        let http = HttpClientManager::new(&HttpConfig::default()).unwrap();
        let err = authenticator.authenticate(&http, "expired").await.unwrap_err();

        m.assert_async().await;
        assert_eq!(err.kind(), ErrorKind::Upstream);

        let err = authenticator.authenticate(&http, "  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
