//! Query execution engine.
//!
//! Runs fully rendered SQL text and decodes the result into a `RowSet`. Every
//! query is bounded by:
//! - a timeout covering pool acquisition and row transfer
//! - a row cap (sqlx drivers stop streaming once the cap is reached)
//!
//! # Architecture
//!
//! Driver-specific fetching is organized in submodules:
//! - `mssql`: tiberius simple-query protocol through the bb8 pool
//! - `mysql`: sqlx text protocol
//! - `postgres`: sqlx simple-query protocol
//!
//! Statements are sent without bind parameters. Caller text reaches SQL only
//! through filter fragments, which are screened before any statement is built.

use crate::db::pool::DbConnection;
use crate::db::types::{RowSet, RowToRecord};
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::Provider;
use futures_util::StreamExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Something that can run SQL text and hand back decoded rows.
///
/// Implemented by `QueryExecutor` over live pools. Tests substitute scripted
/// runners.
pub trait QueryRunner: Send + Sync {
    /// Dialect the runner talks to.
    fn provider(&self) -> Provider;

    /// Execute `sql` and decode its first result set.
    fn fetch(&self, sql: &str) -> impl Future<Output = DbResult<RowSet>> + Send;
}

/// Query executor bound to one connection pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    connection: DbConnection,
    query_timeout: Duration,
    max_rows: usize,
}

impl QueryExecutor {
    pub fn new(connection: DbConnection, query_timeout: Duration, max_rows: usize) -> Self {
        Self {
            connection,
            query_timeout,
            max_rows: max_rows.max(1),
        }
    }

    pub fn connection(&self) -> &DbConnection {
        &self.connection
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

impl QueryRunner for QueryExecutor {
    fn provider(&self) -> Provider {
        self.connection.provider()
    }

    async fn fetch(&self, sql: &str) -> DbResult<RowSet> {
        let start = Instant::now();
        debug!(
            dialect = %self.provider(),
            sql = %sql,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        let rows = impl_db_dispatch!(&self.connection, {
            Mssql(p) => process_rows(
                mssql::fetch_rows(p, sql, self.query_timeout).await?,
                self.max_rows,
            ),
            MySql(p) => process_rows(
                mysql::fetch_rows(p, sql, self.max_rows, self.query_timeout).await?,
                self.max_rows,
            ),
            Postgres(p) => process_rows(
                postgres::fetch_rows(p, sql, self.max_rows, self.query_timeout).await?,
                self.max_rows,
            ),
        });

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(rows)
    }
}

/// Decode driver rows, dropping anything past the row cap.
fn process_rows<R: RowToRecord>(rows: Vec<R>, max_rows: usize) -> RowSet {
    if rows.len() > max_rows {
        warn!(
            total_rows = rows.len(),
            limit = max_rows,
            "Query result truncated"
        );
    }
    let kept = &rows[..rows.len().min(max_rows)];
    RowSet::from_rows(kept)
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

// =============================================================================
// Driver-Specific Implementations
// =============================================================================

mod mssql {
    use super::*;
    use crate::db::pool::MssqlPool;

    pub async fn fetch_rows(
        pool: &MssqlPool,
        sql: &str,
        query_timeout: Duration,
    ) -> DbResult<Vec<tiberius::Row>> {
        let work = async {
            let mut conn = pool.get().await?;
            let stream = conn.simple_query(sql).await?;
            let rows = stream.into_first_result().await?;
            Ok::<_, DbError>(rows)
        };

        match timeout(query_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error("Query execution", query_timeout)),
        }
    }
}

mod mysql {
    use super::*;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        max_rows: usize,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>> {
        use sqlx::Executor;
        // One extra row so truncation can be detected
        let rows_future = pool.fetch(sql).take(max_rows + 1).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("Query execution", query_timeout)),
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        max_rows: usize,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>> {
        use sqlx::Executor;
        let rows_future = pool.fetch(sql).take(max_rows + 1).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("Query execution", query_timeout)),
        }
    }
}
