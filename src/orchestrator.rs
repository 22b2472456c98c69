//! Run orchestrator
//!
//! Sequences one experiment run: resolve the catalog entry, seed, settle,
//! time N iterations through the engine adapter, clean up (always), then
//! aggregate and record. Holding `&mut self` for the whole run makes the
//! exclusivity contract structural: one (engine × environment × key) at a
//! time per orchestrator value. Cross-process exclusion against a shared
//! database stays the caller's responsibility.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{default_adapter, EngineAdapter, Request};
use crate::catalog::{Catalog, CleanupSpec, Runner};
use crate::config::CredentialsProvider;
use crate::context::{RequestSample, RunContext};
use crate::engine::{Engine, Environment};
use crate::error::Result;
use crate::recorder::CsvRecorder;
use crate::repo;
use crate::seed::Seeder;
use crate::stats::{self, AggregatedResult};

/// Pause between prepare and the first timed iteration, excluding
/// prepare-induced cache warmth from the measurements. A constant by
/// design, not policy.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// What an external caller supplies to start a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Catalog key, e.g. `_104_raw_1m`
    pub key: String,
    /// Engine under measurement
    pub engine: Engine,
    /// Credential set selector
    pub environment: Environment,
    /// Number of timed iterations
    pub runs: u32,
}

/// One recorded run: identity, the executed code, every captured sample
/// and the aggregate figures.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run id (UUID v4)
    pub id: String,
    /// Experiment name (the catalog key)
    pub name: String,
    /// Description embedding engine and run count
    pub description: String,
    /// Executed query text or method reference
    pub code: String,
    /// Engine measured
    pub engine: Engine,
    /// Environment measured against
    pub environment: Environment,
    /// One sample per iteration
    pub samples: Vec<RequestSample>,
    /// Flag-selected aggregates
    pub aggregated: AggregatedResult,
}

/// Orchestrator state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    /// No run in flight
    #[default]
    Idle,
    /// Awaiting the seed plan
    Preparing,
    /// Timed iterations in flight
    Running,
    /// Cleanup in flight
    Cleaning,
    /// Aggregating and persisting
    Recorded,
}

/// Builds adapters per run; swap it out to orchestrate against test
/// doubles.
pub type AdapterFactory = Box<dyn Fn(Engine) -> Box<dyn EngineAdapter> + Send + Sync>;

/// The run orchestrator.
pub struct Orchestrator {
    catalog: Catalog,
    credentials: Box<dyn CredentialsProvider>,
    seeder: Seeder,
    recorder: CsvRecorder,
    adapters: AdapterFactory,
    phase: RunPhase,
}

impl Orchestrator {
    /// Orchestrator over the stock engine adapters.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        credentials: Box<dyn CredentialsProvider>,
        seeder: Seeder,
        recorder: CsvRecorder,
    ) -> Self {
        Self {
            catalog,
            credentials,
            seeder,
            recorder,
            adapters: Box::new(default_adapter),
            phase: RunPhase::Idle,
        }
    }

    /// Replace the adapter factory (tests, custom drivers).
    #[must_use]
    pub fn with_adapter_factory(mut self, adapters: AdapterFactory) -> Self {
        self.adapters = adapters;
        self
    }

    /// Current phase of the state machine.
    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run one experiment with the catalog-default context.
    ///
    /// # Errors
    ///
    /// Validation errors surface before any phase starts; prepare and run
    /// failures short-circuit to cleanup before rethrowing; non-skippable
    /// cleanup failures and persistence failures are fatal.
    pub async fn run(&mut self, request: &RunRequest) -> Result<RunReport> {
        let context = RunContext::new(request.engine, request.environment, request.runs);
        self.run_with_context(&request.key, context).await
    }

    /// Run one experiment with full control over the context.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run_with_context(&mut self, key: &str, context: RunContext) -> Result<RunReport> {
        self.phase = RunPhase::Idle;
        let definition = self.catalog.get(key)?;
        if !context.mode.supported_by(context.engine) {
            return Err(crate::error::Error::Validation(format!(
                "execution mode {:?} is unsupported by {}",
                context.mode, context.engine
            )));
        }
        let credentials = self
            .credentials
            .connection(context.engine, context.environment)?;
        let mut adapter = (self.adapters)(context.engine);

        self.phase = RunPhase::Preparing;
        info!(key, engine = %context.engine, "preparing experiment");
        let prepared = self
            .seeder
            .apply(&definition.prepare, adapter.as_mut(), &credentials, &context)
            .await;
        if let Err(prepare_error) = prepared {
            // Cleanup still runs; the prepare error is what callers see.
            self.phase = RunPhase::Cleaning;
            if let Err(cleanup_error) = self
                .seeder
                .clean(adapter.as_mut(), &credentials, &context)
                .await
            {
                warn!(%cleanup_error, "cleanup after failed prepare also failed");
            }
            if let Err(shutdown_error) = adapter.shutdown().await {
                warn!(%shutdown_error, "adapter shutdown failed");
            }
            return Err(prepare_error);
        }

        tokio::time::sleep(SETTLE_DELAY).await;

        self.phase = RunPhase::Running;
        info!(key, engine = %context.engine, runs = context.runs, "running experiment");
        let samples_result = match &definition.runner {
            Runner::Raw(sql) => {
                adapter
                    .execute(
                        Request::Raw(sql.get(context.engine)),
                        &credentials,
                        &context,
                    )
                    .await
            }
            Runner::Method(method) => {
                repo::run_method(adapter.as_mut(), *method, &credentials, &context).await
            }
        };

        self.phase = RunPhase::Cleaning;
        info!("experiment cleanup started");
        let cleanup_result = match definition.cleanup {
            CleanupSpec::DropSchema => {
                self.seeder
                    .clean(adapter.as_mut(), &credentials, &context)
                    .await
            }
        };
        if let Err(shutdown_error) = adapter.shutdown().await {
            warn!(%shutdown_error, "adapter shutdown failed");
        }
        info!("experiment cleanup finished");

        // A run failure wins over a cleanup failure; a cleanup failure
        // alone aborts recording.
        let samples = samples_result?;
        cleanup_result?;

        self.phase = RunPhase::Recorded;
        let aggregated = stats::aggregate(&context.flags, &samples);
        if let Ok(rendered) = serde_json::to_string(&aggregated) {
            debug!(aggregated = %rendered, "aggregated stats");
        }
        let report = RunReport {
            id: Uuid::new_v4().to_string(),
            name: key.to_string(),
            description: format!("[{}. {}]", context.engine, context.runs),
            code: definition.runner.code(context.engine),
            engine: context.engine,
            environment: context.environment,
            samples,
            aggregated,
        };
        let path = self.recorder.record(&report)?;
        info!(artifact = %path.display(), "experiment recorded");

        self.phase = RunPhase::Idle;
        Ok(report)
    }
}
