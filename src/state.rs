//! Shared application state.

use crate::config::ConfigV1;
use crate::env::Env;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; both members are reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// The environment every request context is bound to.
    pub env: Arc<Env>,
}
