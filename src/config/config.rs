use std::path::Path;

use figment::providers::{Env as EnvVars, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::database::DatabaseConfig;
use super::logging::LoggingConfig;
use crate::authenticators::AuthenticatorConfig;

/// Prefix of environment variables that override file settings,
/// e.g. `REQENV_DATABASE__URL`.
pub const ENV_PREFIX: &str = "REQENV_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub jwt: JWTConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub authenticators: Vec<AuthenticatorConfig>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl ConfigV1 {
    /// A config with every section at its default, pointed at `database_url`.
    pub fn with_database(database_url: impl Into<String>) -> Self {
        ConfigV1 {
            bind_address: default_bind_address(),
            database: DatabaseConfig::new(database_url),
            http: HttpConfig::default(),
            jwt: JWTConfig::default(),
            logging: LoggingConfig::default(),
            authenticators: Vec::new(),
        }
    }
}

/// Extract a `ConfigV1` from an already assembled figment.
pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from a YAML file, with `REQENV_*` environment variables layered on top.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1, figment::Error> {
    let figment = Figment::new()
        .merge(Yaml::file(path.as_ref()))
        .merge(EnvVars::prefixed(ENV_PREFIX).split("__"));
    extract_config(&figment)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Settings for the shared outbound HTTP client.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Signing settings for issued tokens.
///
/// HMAC algorithms use `secret`, or a generated key when it is absent.
/// RSA, EC and EdDSA algorithms read PEM files from the two key paths.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct JWTConfig {
    #[serde(default = "default_issuer")]
    pub iss: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub secret: Option<String>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    /// Lifetime applied when a token is issued without an explicit expiry.
    pub default_ttl_secs: Option<i64>,
}

fn default_issuer() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

impl Default for JWTConfig {
    fn default() -> Self {
        JWTConfig {
            iss: default_issuer(),
            algorithm: default_algorithm(),
            secret: None,
            private_key_path: None,
            public_key_path: None,
            default_ttl_secs: None,
        }
    }
}
