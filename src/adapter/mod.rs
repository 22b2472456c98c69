//! Engine adapters
//!
//! One adapter per engine bridges that driver's timing model into the
//! shared contract: `execute` returns one [`RequestSample`] per
//! iteration, resolving its own connection per the caching policy. The
//! adapter instance owns the connection handle for exactly one
//! orchestrator invocation; nothing here is process-global, so
//! independent runs (and tests) cannot interfere through shared state.

pub mod mariadb;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;

use std::time::Instant;

use async_trait::async_trait;

pub use mariadb::MariadbAdapter;
pub use mssql::MssqlAdapter;
pub use mysql::MysqlAdapter;
pub use oracle::OracleAdapter;
pub use postgres::PostgresAdapter;

use crate::config::ConnectionParams;
use crate::context::{ExecutionMode, RequestSample, RowSample, RunContext};
use crate::engine::{Engine, Phase};
use crate::error::{Error, Result};
use crate::model::TreeEntity;
use crate::repo::AccessMethod;

/// Streaming drivers record a row sample for the first row and then every
/// this-many rows, bounding sample memory on very large results.
pub const DEFAULT_ROW_SAMPLE_INTERVAL: u64 = 1000;

/// What to execute: literal dialect SQL or a pre-bound data-access
/// method. Discriminated at compile time; adapters accept only the raw
/// side and the method runner only the method side.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
    /// Literal, dialect-specific SQL text, executed verbatim
    Raw(&'a str),
    /// Pre-bound data-access operation
    Method(AccessMethod),
}

impl<'a> Request<'a> {
    /// The raw SQL of this request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for method requests; adapters execute
    /// only raw SQL.
    pub fn raw_sql(&self) -> Result<&'a str> {
        match *self {
            Self::Raw(sql) => Ok(sql),
            Self::Method(method) => Err(Error::Validation(format!(
                "cannot handle methods, only raw SQL (got {})",
                method.reference()
            ))),
        }
    }
}

/// Per-engine execution surface.
///
/// `execute` is the timed path (one sample per iteration);
/// `fetch_entities` is the untimed mapped fetch the method runner times
/// around; `execute_raw` is the untimed statement path the seeder and
/// cleaner use.
#[async_trait]
pub trait EngineAdapter: Send {
    /// Engine this adapter drives.
    fn engine(&self) -> Engine;

    /// Run `context.runs` timed iterations of a raw request.
    async fn execute(
        &mut self,
        request: Request<'_>,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>>;

    /// Fetch and map every row of `sql` into entities (method mode).
    async fn fetch_entities(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<TreeEntity>>;

    /// Execute one untimed statement, returning the affected-row count
    /// where the driver reports one.
    async fn execute_raw(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        phase: Phase,
    ) -> Result<u64>;

    /// Release the cached connection handle.
    async fn shutdown(&mut self) -> Result<()>;
}

/// The stock adapter for an engine.
#[must_use]
pub fn default_adapter(engine: Engine) -> Box<dyn EngineAdapter> {
    match engine {
        Engine::Postgres => Box::new(PostgresAdapter::new()),
        Engine::Mysql => Box::new(MysqlAdapter::new()),
        Engine::Mssql => Box::new(MssqlAdapter::new()),
        Engine::Oracle => Box::new(OracleAdapter::new()),
        Engine::Mariadb => Box::new(MariadbAdapter::new()),
    }
}

/// Milliseconds elapsed since `start`.
pub(crate) fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Reject modes the engine does not support.
pub(crate) fn ensure_mode(engine: Engine, mode: ExecutionMode) -> Result<()> {
    if mode.supported_by(engine) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "execution mode {mode:?} is unsupported by {engine}"
        )))
    }
}

/// Collects row-arrival samples at the configured cadence: the first row,
/// then every `interval`-th row.
pub(crate) struct RowSampler {
    started: Instant,
    interval: u64,
    seen: u64,
    samples: Vec<RowSample>,
}

impl RowSampler {
    pub(crate) fn new(started: Instant, interval: u64) -> Self {
        Self {
            started,
            interval: interval.max(1),
            seen: 0,
            samples: Vec::new(),
        }
    }

    /// Record one row arrival.
    pub(crate) fn observe(&mut self) {
        self.seen += 1;
        if self.seen == 1 || self.seen % self.interval == 0 {
            self.samples.push(RowSample {
                row_index: self.seen,
                at_ms: ms_since(self.started),
            });
        }
    }

    pub(crate) const fn rows_seen(&self) -> u64 {
        self.seen
    }

    /// First-row time and the ordered samples. A zero-row result reports
    /// `first_row_ms = full_ms`.
    pub(crate) fn finish(self, full_ms: f64) -> (Option<f64>, Vec<RowSample>) {
        let first = self.samples.first().map_or(full_ms, |s| s.at_ms);
        (Some(first), self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_records_first_and_every_interval() {
        let mut sampler = RowSampler::new(Instant::now(), 1000);
        for _ in 0..2500 {
            sampler.observe();
        }
        let (first, samples) = sampler.finish(9.9);
        assert!(first.is_some());
        let indexes: Vec<u64> = samples.iter().map(|s| s.row_index).collect();
        assert_eq!(indexes, vec![1, 1000, 2000]);
    }

    #[test]
    fn zero_rows_fall_back_to_full_time() {
        let sampler = RowSampler::new(Instant::now(), 1000);
        assert_eq!(sampler.rows_seen(), 0);
        let (first, samples) = sampler.finish(42.0);
        assert_eq!(first, Some(42.0));
        assert!(samples.is_empty());
    }

    #[test]
    fn method_request_is_rejected_by_raw_accessor() {
        let request = Request::Method(AccessMethod::FindAll);
        let error = request.raw_sql().unwrap_err();
        assert!(format!("{error}").contains("only raw SQL"));
    }
}
