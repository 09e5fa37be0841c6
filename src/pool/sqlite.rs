use std::time::Duration;

use r2d2::ManageConnection;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::striped::{PoolError, PoolSettings, StripedPool};
use crate::config::DatabaseConfig;

/// The pool type the environment runs on.
pub type SqlitePool = StripedPool<SqliteConnectionManager>;

/// Opens SQLite connections against a path or `file:` URI.
#[derive(Debug, Clone)]
pub struct SqliteConnectionManager {
    url: String,
    flags: OpenFlags,
    busy_timeout: Duration,
}

impl SqliteConnectionManager {
    pub fn new(url: impl Into<String>) -> Self {
        SqliteConnectionManager {
            url: url.into(),
            flags: OpenFlags::default(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl ManageConnection for SqliteConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        debug!("Opening SQLite connection to {}", self.url);
        let conn = Connection::open_with_flags(&self.url, self.flags)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

/// Open the striped pool described by `config`.
pub fn open_sqlite_pool(config: &DatabaseConfig) -> Result<SqlitePool, PoolError> {
    StripedPool::new(
        SqliteConnectionManager::new(config.url.clone()),
        PoolSettings::from(config),
    )
}
