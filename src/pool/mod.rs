pub mod sqlite;
pub mod striped;

// Re-export the pool types so callers can do "use crate::pool::{StripedPool, SqlitePool};"
pub use sqlite::{open_sqlite_pool, SqliteConnectionManager, SqlitePool};
pub use striped::{PoolError, PoolSettings, StripeStats, StripedPool};
