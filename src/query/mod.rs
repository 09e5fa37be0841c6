//! Logged query execution against the connection pool.

pub mod sql;

pub use sql::{JsonRow, RowMapper, SqlQuery};

use rusqlite::Connection;

use crate::error::ApiError;
use crate::pool::SqlitePool;
use crate::utils::logger::{Logger, Severity};

/// Logged in place of a query that renders to nothing.
pub const EMPTY_QUERY: &str = "Empty query";

/// Something that can describe itself for the log and then run on a connection.
pub trait Query: Send + 'static {
    type Row: Send + 'static;

    /// Human-readable form of the query. May be empty.
    fn render(&self) -> String;

    fn run(self, conn: &mut Connection) -> rusqlite::Result<Vec<Self::Row>>;
}

/// The text logged for `query`.
pub fn describe<Q: Query>(query: &Q) -> String {
    let rendered = query.render();
    if rendered.trim().is_empty() {
        EMPTY_QUERY.to_string()
    } else {
        rendered
    }
}

/// Log the query at Debug, then run it on a pooled connection.
pub async fn execute<L, Q>(logger: &L, pool: &SqlitePool, query: Q) -> Result<Vec<Q::Row>, ApiError>
where
    L: Logger + ?Sized,
    Q: Query,
{
    logger.log(Severity::Debug, &describe(&query));
    pool.with_connection(move |conn| query.run(conn)).await
}
