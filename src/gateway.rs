//! Fail-soft query execution.
//!
//! The gateway is the single place SQL reaches a driver. It applies the
//! dialect's contention policy around each query:
//! - SQL Server: queries are serialized through an `ExecutionGate`
//! - PostgreSQL: a `BackendReaper` periodically sweeps idle backends
//! - MySQL: queries run as issued
//!
//! `run` never fails. Execution errors are logged and replaced by an empty
//! row set so callers render "no data" rather than an error.

use crate::config::RepositoryOptions;
use crate::db::{QueryRunner, RecordExt, RowSet};
use crate::error::DbResult;
use crate::guard::{BackendReaper, ExecutionGate};
use crate::models::Provider;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-dialect contention state, owned by one gateway.
#[derive(Debug)]
pub enum Contention {
    None,
    Serialized(ExecutionGate),
    Reaper(BackendReaper),
}

impl Contention {
    /// The policy a provider needs, configured from `options`.
    pub fn for_provider(provider: Provider, options: &RepositoryOptions) -> Self {
        match provider {
            Provider::Mssql => Contention::Serialized(ExecutionGate::from_polling(
                options.lock_poll_interval(),
                options.lock_max_polls,
                options.lock_settle_delay(),
            )),
            Provider::Postgres => Contention::Reaper(BackendReaper::new(
                options.reaper_threshold,
                options.reaper_query_pattern.clone(),
            )),
            Provider::MySql => Contention::None,
        }
    }
}

/// Executes rendered SQL through a runner under a contention policy.
#[derive(Debug)]
pub struct ExecutionGateway<R> {
    runner: R,
    contention: Contention,
}

impl<R: QueryRunner> ExecutionGateway<R> {
    pub fn new(runner: R, contention: Contention) -> Self {
        Self { runner, contention }
    }

    /// Gateway with the contention policy the runner's provider needs.
    pub fn for_runner(runner: R, options: &RepositoryOptions) -> Self {
        let contention = Contention::for_provider(runner.provider(), options);
        Self::new(runner, contention)
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn contention(&self) -> &Contention {
        &self.contention
    }

    /// Execute `sql`, propagating errors.
    pub async fn try_run(&self, sql: &str) -> DbResult<RowSet> {
        match &self.contention {
            Contention::Serialized(gate) => gate.run(self.runner.fetch(sql)).await,
            Contention::Reaper(reaper) => {
                let result = self.runner.fetch(sql).await;
                if reaper.record_query() {
                    self.sweep(reaper).await;
                }
                result
            }
            Contention::None => self.runner.fetch(sql).await,
        }
    }

    /// Execute `sql`; any failure yields an empty row set.
    pub async fn run(&self, sql: &str) -> RowSet {
        let start = Instant::now();
        match self.try_run(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    dialect = %self.runner.provider(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Query failed, returning no rows"
                );
                debug!(sql = %sql, "Failed query text");
                RowSet::default()
            }
        }
    }

    /// Runs outside the reaper's count, so a sweep never triggers another.
    async fn sweep(&self, reaper: &BackendReaper) {
        match self.runner.fetch(&reaper.maintenance_sql()).await {
            Ok(rows) => {
                let terminated = rows.records.iter().filter(|r| r.flag("terminated")).count();
                info!(
                    terminated,
                    threshold = reaper.threshold(),
                    "Swept idle backends"
                );
            }
            Err(e) => warn!(error = %e, "Idle backend sweep failed"),
        }
    }
}
