//! Application startup and server initialization.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::authenticators::create_authenticator;
use crate::config::ConfigV1;
use crate::env::{Env, EnvError};
use crate::routes;
use crate::state::AppState;
use crate::utils::logger::LoggingError;

/// Anything that stops the service from starting or keeps it from serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the authenticators named in `config` and the environment around them.
pub fn build_state(config: Arc<ConfigV1>) -> Result<AppState, StartupError> {
    let authenticators = config
        .authenticators
        .iter()
        .map(create_authenticator)
        .collect();
    let env = Arc::new(Env::new(&config, authenticators)?);
    Ok(AppState { config, env })
}

/// Initializes and runs the application server.
///
/// Binds to the address in the configuration and serves until the process
/// is stopped.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), StartupError> {
    let state = build_state(config.clone())?;
    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.bind_address.clone(),
            source,
        })?;

    axum::serve(listener, app)
        .await
        .map_err(StartupError::Serve)
}
