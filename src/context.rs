//! Per-run context and captured timing samples

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, Environment};
use crate::model::TreeEntity;

/// Connection-caching policy across the iterations of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Reconnect before every iteration
    Never,
    /// Reuse the handle opened by the first iteration
    #[default]
    BetweenRuns,
}

/// Execution mode of a run. The diagnostic modes are engine-specific and
/// mutually exclusive with each other and with the default mode per
/// invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// First-row / by-row timing capture
    #[default]
    Default,
    /// Postgres only: prefix the text with `EXPLAIN ANALYSE`
    ExplainAnalyze,
    /// Mssql only: prefix `SET STATISTICS TIME ON;` and parse the server's
    /// out-of-band `CPU time = <n> ms, elapsed time = <n> ms` message
    StatisticsOn,
}

impl ExecutionMode {
    /// Whether `engine` supports this mode.
    #[must_use]
    pub const fn supported_by(self, engine: Engine) -> bool {
        match self {
            Self::Default => true,
            Self::ExplainAnalyze => matches!(engine, Engine::Postgres),
            Self::StatisticsOn => matches!(engine, Engine::Mssql),
        }
    }
}

/// Selects which aggregate fields the statistics pass computes. An unset
/// flag leaves the corresponding output field absent, never zero-filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateFlags {
    /// Mean of full elapsed times
    pub mean: bool,
    /// Population SD of full elapsed times
    pub sd: bool,
    /// Mean of first-row times
    pub first_row_mean: bool,
    /// Population SD of first-row times
    pub first_row_sd: bool,
    /// Mean of pooled inter-row deltas
    pub by_row_mean: bool,
    /// Population SD of pooled inter-row deltas
    pub by_row_sd: bool,
    /// Mean of engine-reported CPU time (diagnostic mode)
    pub mean_cpu_time: bool,
    /// Mean of engine-reported elapsed time (diagnostic mode)
    pub mean_elapsed_time: bool,
}

impl AggregateFlags {
    /// The six timing aggregates, as every catalog run requests them.
    #[must_use]
    pub const fn timing() -> Self {
        Self {
            mean: true,
            sd: true,
            first_row_mean: true,
            first_row_sd: true,
            by_row_mean: true,
            by_row_sd: true,
            mean_cpu_time: false,
            mean_elapsed_time: false,
        }
    }

    /// Every aggregate, including the diagnostic-mode means.
    #[must_use]
    pub const fn all() -> Self {
        let mut flags = Self::timing();
        flags.mean_cpu_time = true;
        flags.mean_elapsed_time = true;
        flags
    }
}

/// Everything an adapter needs to know about the run it is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Engine under measurement
    pub engine: Engine,
    /// Credential set selector
    pub environment: Environment,
    /// Number of timed iterations
    pub runs: u32,
    /// Connection-caching policy
    pub cache: CachePolicy,
    /// Execution mode
    pub mode: ExecutionMode,
    /// Aggregate-field selection
    pub flags: AggregateFlags,
    /// Keep the returned rows on each sample (off for real measurements)
    pub retain_rows: bool,
}

impl RunContext {
    /// A context with the catalog defaults: cached connection between
    /// runs, default mode, the six timing aggregates, rows discarded.
    #[must_use]
    pub const fn new(engine: Engine, environment: Environment, runs: u32) -> Self {
        Self {
            engine,
            environment,
            runs,
            cache: CachePolicy::BetweenRuns,
            mode: ExecutionMode::Default,
            flags: AggregateFlags::timing(),
            retain_rows: false,
        }
    }

    /// Same context with a different execution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One sampled row arrival: 1-based row index and milliseconds since the
/// statement was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowSample {
    /// 1-based index of the observed row
    pub row_index: u64,
    /// Arrival time in ms relative to dispatch
    pub at_ms: f64,
}

/// Captured timing of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSample {
    /// Total elapsed time in ms
    pub full_ms: f64,
    /// Time to the first observed row; equals `full_ms` for zero-row
    /// results and for drivers without a per-row hook
    pub first_row_ms: Option<f64>,
    /// Ordered row-arrival samples (first row, then every Nth)
    pub row_samples: Vec<RowSample>,
    /// Engine-reported CPU time (diagnostic mode only)
    pub cpu_ms: Option<f64>,
    /// Engine-reported elapsed time (diagnostic mode only)
    pub elapsed_ms: Option<f64>,
    /// Returned rows, retained only when the context asks for them
    pub rows: Option<Vec<TreeEntity>>,
}

impl RequestSample {
    /// A sample carrying only a full elapsed time (method-mode runs).
    #[must_use]
    pub const fn full_only(full_ms: f64) -> Self {
        Self {
            full_ms,
            first_row_ms: None,
            row_samples: Vec::new(),
            cpu_ms: None,
            elapsed_ms: None,
            rows: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_modes_are_engine_specific() {
        assert!(ExecutionMode::Default.supported_by(Engine::Mariadb));
        assert!(ExecutionMode::ExplainAnalyze.supported_by(Engine::Postgres));
        assert!(!ExecutionMode::ExplainAnalyze.supported_by(Engine::Mysql));
        assert!(ExecutionMode::StatisticsOn.supported_by(Engine::Mssql));
        assert!(!ExecutionMode::StatisticsOn.supported_by(Engine::Postgres));
    }

    #[test]
    fn default_context_matches_catalog_conventions() {
        let ctx = RunContext::new(Engine::Postgres, Environment::Local, 10);
        assert_eq!(ctx.cache, CachePolicy::BetweenRuns);
        assert_eq!(ctx.mode, ExecutionMode::Default);
        assert!(ctx.flags.mean && ctx.flags.by_row_sd);
        assert!(!ctx.flags.mean_cpu_time);
        assert!(!ctx.retain_rows);
    }
}
