//! The process-wide environment shared by every request.

use thiserror::Error;
use tracing::info;

use crate::authenticators::{Authenticator, Authenticators};
use crate::config::ConfigV1;
use crate::http_client::HttpClientManager;
use crate::jwt::{CryptoError, JwtSettings};
use crate::pool::{open_sqlite_pool, PoolError, SqlitePool};

/// Failures while building the [`Env`]. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to create connection pool: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to prepare JWT signing key: {0}")]
    Crypto(#[from] CryptoError),
}

/// Built once at startup and read, never mutated, by every request context.
pub struct Env {
    pool: SqlitePool,
    http: HttpClientManager,
    authenticators: Authenticators,
    jwt: JwtSettings,
}

impl Env {
    /// Open the pool, build the HTTP client and load (or generate) the JWT key.
    pub fn new(
        config: &ConfigV1,
        authenticators: Vec<Box<dyn Authenticator>>,
    ) -> Result<Self, EnvError> {
        let pool = open_sqlite_pool(&config.database)?;
        let http = HttpClientManager::new(&config.http)?;
        let jwt = JwtSettings::from_config(&config.jwt)?;

        info!("Environment ready for database '{}'", config.database.url);
        Ok(Self::from_parts(pool, http, authenticators.into(), jwt))
    }

    pub fn from_parts(
        pool: SqlitePool,
        http: HttpClientManager,
        authenticators: Authenticators,
        jwt: JwtSettings,
    ) -> Self {
        Env {
            pool,
            http,
            authenticators,
            jwt,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn http(&self) -> &HttpClientManager {
        &self.http
    }

    pub fn authenticators(&self) -> &Authenticators {
        &self.authenticators
    }

    pub fn jwt(&self) -> &JwtSettings {
        &self.jwt
    }
}
