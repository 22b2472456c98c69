//! Result recorder
//!
//! Persists one aggregated row per run to a CSV artifact keyed by
//! (experiment name, engine, environment). Re-running the identical
//! triple overwrites the prior artifact; last write wins. Absent
//! aggregates render as empty cells, and the Code column is quoted with
//! newlines collapsed and embedded quotes doubled.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::engine::{Engine, Environment};
use crate::error::{Error, Result};
use crate::orchestrator::RunReport;

/// Fixed artifact header.
pub const CSV_HEADER: [&str; 10] = [
    "ID",
    "Name",
    "Description",
    "Mean",
    "SD",
    "By Row Mean",
    "By Row SD",
    "First Row Mean",
    "First Row SD",
    "Code",
];

/// CSV artifact writer.
#[derive(Debug, Clone)]
pub struct CsvRecorder {
    dir: PathBuf,
}

fn cell(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn quoted_code(code: &str) -> String {
    format!("\"{}\"", code.replace('\n', " ").replace('"', "\"\""))
}

impl CsvRecorder {
    /// Recorder writing artifacts into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory artifacts are written into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `logs_<name>_<engine>_<environment>.csv` under the recorder's
    /// directory.
    #[must_use]
    pub fn artifact_path(&self, name: &str, engine: Engine, environment: Environment) -> PathBuf {
        self.dir
            .join(format!("logs_{name}_{engine}_{environment}.csv"))
    }

    /// Persist one run report, overwriting any prior artifact for the
    /// same (name, engine, environment) triple.
    ///
    /// # Errors
    ///
    /// A persistence failure is fatal and surfaces to the caller.
    pub fn record(&self, report: &RunReport) -> Result<PathBuf> {
        info!("saving experiment response");
        let path = self.artifact_path(&report.name, report.engine, report.environment);

        let aggr = &report.aggregated;
        let row = [
            report.id.clone(),
            report.name.clone(),
            report.description.clone(),
            cell(aggr.mean),
            cell(aggr.sd),
            cell(aggr.by_row_mean),
            cell(aggr.by_row_sd),
            cell(aggr.first_row_mean),
            cell(aggr.first_row_sd),
            quoted_code(&report.code),
        ];

        let content = format!("{}\n{}", CSV_HEADER.join(", "), row.join(", "));
        fs::write(&path, content).map_err(|e| {
            Error::Fatal(format!(
                "failed to write result artifact {}: {e}",
                path.display()
            ))
        })?;
        Ok(path)
    }
}
