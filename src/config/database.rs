use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Connection settings and pool bounds for the database.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct DatabaseConfig {
    /// SQLite path or `file:` URI, e.g. `app.db` or `file:app.db?mode=rwc`.
    pub url: String,
    #[serde(default = "default_stripes")]
    pub stripes: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections_per_stripe: u32,
    #[serde(default = "default_min_idle")]
    pub min_idle_per_stripe: u32,
    /// Idle connections beyond `min_idle_per_stripe` are closed after this long.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// How long a borrower waits on an exhausted stripe before giving up.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_stripes() -> usize {
    4
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_idle() -> u32 {
    4
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl DatabaseConfig {
    /// Default pool bounds against the given connection string.
    pub fn new(url: impl Into<String>) -> Self {
        DatabaseConfig {
            url: url.into(),
            stripes: default_stripes(),
            max_connections_per_stripe: default_max_connections(),
            min_idle_per_stripe: default_min_idle(),
            idle_timeout_secs: default_idle_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}
