//! # Rowbench: Cross-Engine Query Latency Benchmarking Harness
//!
//! Rowbench measures query latency characteristics (total elapsed time,
//! time-to-first-row and inter-row arrival timing) for a fixed
//! self-referencing tree dataset across five relational engines
//! (postgres, mysql, mssql, oracle, mariadb), under both literal-SQL and
//! data-access-method execution paths, at controlled dataset scales, and
//! reduces repeated runs to reproducible aggregate statistics persisted
//! as CSV artifacts.
//!
//! ## Moving parts
//!
//! - [`catalog`]: named experiment definitions (runner + seed plan +
//!   cleanup)
//! - [`adapter`]: one timing-capture adapter per engine
//! - [`seed`]: tree-dataset seeder and idempotent cleaner
//! - [`stats`]: mean / population-SD aggregation over captured samples
//! - [`orchestrator`]: prepare → settle → run → cleanup → record
//! - [`recorder`]: the CSV result artifact
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowbench::catalog::Catalog;
//! use rowbench::config::EnvCredentials;
//! use rowbench::orchestrator::{Orchestrator, RunRequest};
//! use rowbench::recorder::CsvRecorder;
//! use rowbench::seed::Seeder;
//! use rowbench::{Engine, Environment};
//!
//! #[tokio::main]
//! async fn main() -> rowbench::Result<()> {
//!     let mut orchestrator = Orchestrator::new(
//!         Catalog::builtin(),
//!         Box::new(EnvCredentials::from_env()),
//!         Seeder::new(),
//!         CsvRecorder::new("."),
//!     );
//!
//!     let report = orchestrator
//!         .run(&RunRequest {
//!             key: "_101_raw_100k".to_string(),
//!             engine: Engine::Postgres,
//!             environment: Environment::Local,
//!             runs: 10,
//!         })
//!         .await?;
//!     println!("mean = {:?} ms", report.aggregated.mean);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod context;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod recorder;
pub mod repo;
pub mod seed;
pub mod stats;

pub use context::{AggregateFlags, CachePolicy, ExecutionMode, RequestSample, RowSample, RunContext};
pub use engine::{Engine, Environment, Phase};
pub use error::{Error, ErrorKind, Result};
pub use model::TreeEntity;
pub use orchestrator::{Orchestrator, RunReport, RunRequest};
pub use stats::AggregatedResult;
