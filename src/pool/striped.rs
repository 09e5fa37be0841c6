//! A connection pool split into independent stripes.
//!
//! Each stripe is its own `r2d2` pool, so borrowers landing on different
//! stripes never contend on the same lock. Borrowing happens only through
//! [`StripedPool::with_connection`], which owns the pooled connection for the
//! whole call and hands it back when the call ends, however it ends.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use r2d2::{HandleError, ManageConnection, Pool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::ApiError;
use crate::utils::logger::{Logger, TracingLogger};

/// Bounds applied to every stripe of a [`StripedPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub stripes: usize,
    pub max_per_stripe: u32,
    pub min_idle_per_stripe: u32,
    pub idle_timeout: Option<Duration>,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            stripes: 4,
            max_per_stripe: 10,
            min_idle_per_stripe: 4,
            idle_timeout: Some(Duration::from_secs(600)),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        PoolSettings {
            stripes: config.stripes,
            max_per_stripe: config.max_connections_per_stripe,
            min_idle_per_stripe: config.min_idle_per_stripe,
            idle_timeout: Some(config.idle_timeout()),
            acquire_timeout: config.acquire_timeout(),
        }
    }
}

impl PoolSettings {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.stripes == 0 {
            return Err(PoolError::InvalidSettings(
                "a pool needs at least one stripe".to_string(),
            ));
        }
        if self.max_per_stripe == 0 {
            return Err(PoolError::InvalidSettings(
                "max connections per stripe must be positive".to_string(),
            ));
        }
        if self.min_idle_per_stripe > self.max_per_stripe {
            return Err(PoolError::InvalidSettings(format!(
                "min idle ({}) exceeds max connections ({}) per stripe",
                self.min_idle_per_stripe, self.max_per_stripe
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool settings: {0}")]
    InvalidSettings(String),
}

/// Occupancy of one stripe at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeStats {
    pub connections: u32,
    pub idle: u32,
    pub in_use: u32,
}

/// Sends connection errors raised inside r2d2 through our logger.
#[derive(Debug, Clone, Copy)]
struct LogErrorHandler;

impl<E> HandleError<E> for LogErrorHandler
where
    E: fmt::Display,
{
    fn handle_error(&self, error: E) {
        TracingLogger.error(&format!("database connection error: {}", error));
    }
}

/// A fixed-capacity pool of database connections, organized into stripes.
pub struct StripedPool<M: ManageConnection> {
    stripes: Vec<Pool<M>>,
    next: AtomicUsize,
    settings: PoolSettings,
}

impl<M: ManageConnection + Clone> StripedPool<M> {
    /// Build the stripes. Connections are opened lazily in the background,
    /// so this does not touch the database.
    pub fn new(manager: M, settings: PoolSettings) -> Result<Self, PoolError> {
        settings.validate()?;

        let stripes = (0..settings.stripes)
            .map(|_| {
                Pool::builder()
                    .max_size(settings.max_per_stripe)
                    .min_idle(Some(settings.min_idle_per_stripe))
                    .idle_timeout(settings.idle_timeout)
                    .connection_timeout(settings.acquire_timeout)
                    .error_handler(Box::new(LogErrorHandler))
                    .build_unchecked(manager.clone())
            })
            .collect();

        info!(
            "Created connection pool: {} stripes x {} max connections ({} min idle)",
            settings.stripes, settings.max_per_stripe, settings.min_idle_per_stripe
        );

        Ok(StripedPool {
            stripes,
            next: AtomicUsize::new(0),
            settings,
        })
    }
}

impl<M: ManageConnection> StripedPool<M> {
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Total number of connections the pool may ever hold.
    pub fn capacity(&self) -> usize {
        self.settings.stripes * self.settings.max_per_stripe as usize
    }

    pub fn stats(&self) -> Vec<StripeStats> {
        self.stripes
            .iter()
            .map(|stripe| {
                let state = stripe.state();
                StripeStats {
                    connections: state.connections,
                    idle: state.idle_connections,
                    in_use: state.connections - state.idle_connections,
                }
            })
            .collect()
    }

    pub fn in_use(&self) -> u32 {
        self.stats().iter().map(|s| s.in_use).sum()
    }

    fn pick_stripe(&self) -> &Pool<M> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.stripes.len();
        &self.stripes[index]
    }

    /// Borrow a connection, run `f` with it on the blocking thread pool, and
    /// give the connection back.
    ///
    /// The connection is owned by the blocking task, so it goes back to its
    /// stripe when `f` returns, fails or panics, and also when the returned
    /// future is dropped before completion. Waiting on an exhausted stripe
    /// gives up after the configured acquire timeout with [`ApiError::Pool`].
    pub async fn with_connection<F, T, E>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut M::Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ApiError> + Send + 'static,
    {
        let stripe = self.pick_stripe().clone();
        let task = tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let mut conn = stripe.get()?;
            f(&mut *conn).map_err(Into::into)
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ApiError::internal(
                "task holding a database connection panicked",
            )),
            Err(e) => Err(ApiError::internal(format!(
                "task holding a database connection failed: {}",
                e
            ))),
        }
    }
}
