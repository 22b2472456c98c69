//! End-to-end orchestration against the scriptable adapter: the full
//! prepare → settle → run → cleanup → record sequence, its failure
//! short-circuits, and the persisted artifact.

mod common;

use std::sync::{Arc, Mutex};

use common::MockBehavior;
use rowbench::catalog::Catalog;
use rowbench::context::{ExecutionMode, RunContext};
use rowbench::orchestrator::{Orchestrator, RunRequest};
use rowbench::recorder::CsvRecorder;
use rowbench::seed::Seeder;
use rowbench::{Engine, Environment, ErrorKind};

type Log = Arc<Mutex<Vec<String>>>;

fn orchestrator(dir: &std::path::Path, log: &Log, behavior: MockBehavior) -> Orchestrator {
    Orchestrator::new(
        Catalog::builtin(),
        Box::new(common::provider()),
        Seeder::new(),
        CsvRecorder::new(dir),
    )
    .with_adapter_factory(common::mock_factory(Arc::clone(log), behavior))
}

fn request(key: &str, runs: u32) -> RunRequest {
    RunRequest {
        key: key.to_string(),
        engine: Engine::Postgres,
        environment: Environment::Local,
        runs,
    }
}

#[tokio::test]
async fn raw_scan_end_to_end_records_one_csv_row() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let mut orchestrator = orchestrator(dir.path(), &log, MockBehavior::default());

    let report = orchestrator.run(&request("_101_raw_100k", 3)).await?;

    assert_eq!(report.samples.len(), 3);
    // full times 100, 110, 120
    assert_eq!(report.aggregated.mean, Some(110));
    assert_eq!(report.aggregated.sd, Some(8));
    assert_eq!(report.aggregated.first_row_mean, Some(10));
    assert_eq!(report.aggregated.first_row_sd, Some(0));
    // five row samples 10 ms apart pool three 10 ms interior deltas
    assert_eq!(report.aggregated.by_row_mean, Some(10));
    assert_eq!(report.aggregated.by_row_sd, Some(0));

    let log = log.lock().unwrap();
    // 100,000 roots at 500 rows per chunk
    let inserts = log.iter().filter(|l| l.starts_with("RAW INSERT")).count();
    assert_eq!(inserts, 200);
    // prepare cleans first and cleanup cleans again: 2 tables each time
    let drops = log.iter().filter(|l| l.starts_with("RAW DROP")).count();
    assert_eq!(drops, 4);
    // three timed iterations collapse into one adapter call
    assert_eq!(log.iter().filter(|l| l.starts_with("EXEC")).count(), 1);
    assert_eq!(log.last().map(String::as_str), Some("SHUTDOWN"));

    let path = dir.path().join("logs__101_raw_100k_postgres_local.csv");
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some("ID, Name, Description, Mean, SD, By Row Mean, By Row SD, First Row Mean, First Row SD, Code")
    );
    let fields: Vec<&str> = lines.next().unwrap().splitn(10, ", ").collect();
    assert_eq!(fields[0], report.id);
    assert_eq!(fields[1], "_101_raw_100k");
    assert_eq!(fields[2], "[postgres. 3]");
    assert_eq!(fields[3], "110");
    assert_eq!(fields[9].matches("SELECT").count(), 1);
    assert!(lines.next().is_none(), "exactly one aggregated row");
    Ok(())
}

#[tokio::test]
async fn method_mode_times_mapped_fetches() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let mut orchestrator = orchestrator(dir.path(), &log, MockBehavior::default());

    let report = orchestrator.run(&request("_104_method_100k", 2)).await?;

    assert_eq!(report.samples.len(), 2);
    assert!(report.aggregated.mean.is_some());
    // Mapped fetches carry no first-row or inter-row data.
    assert!(report.aggregated.first_row_mean.is_none());
    assert!(report.aggregated.by_row_mean.is_none());
    assert_eq!(report.code, "TreeStore::find_with_children_inner");

    let log = log.lock().unwrap();
    assert_eq!(log.iter().filter(|l| l.starts_with("FETCH")).count(), 2);
    assert!(log
        .iter()
        .find(|l| l.starts_with("FETCH"))
        .unwrap()
        .contains("INNER JOIN"));
    Ok(())
}

#[tokio::test]
async fn prepare_failure_still_cleans_then_rethrows() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let behavior = MockBehavior {
        fail_inserts: true,
        ..MockBehavior::default()
    };
    let mut orchestrator = orchestrator(dir.path(), &log, behavior);

    let error = orchestrator
        .run(&request("_101_raw_100k", 3))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Driver);

    let log = log.lock().unwrap();
    // The failed insert is the last prepare statement; cleanup drops both
    // tables again afterwards.
    let drops = log.iter().filter(|l| l.starts_with("RAW DROP")).count();
    assert_eq!(drops, 4);
    assert!(!log.iter().any(|l| l.starts_with("EXEC")), "running skipped");
    assert_eq!(log.last().map(String::as_str), Some("SHUTDOWN"));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0, "nothing recorded");
    Ok(())
}

#[tokio::test]
async fn absent_drop_targets_are_swallowed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let behavior = MockBehavior {
        absent_drops: true,
        ..MockBehavior::default()
    };
    let mut orchestrator = orchestrator(dir.path(), &log, behavior);

    // Every drop errors with "does not exist", on both the prepare-side
    // clean and the final cleanup, and the run still records.
    let report = orchestrator.run(&request("_101_raw_100k", 2)).await?;
    assert_eq!(report.samples.len(), 2);
    assert!(dir
        .path()
        .join("logs__101_raw_100k_postgres_local.csv")
        .exists());
    Ok(())
}

#[tokio::test]
async fn fatal_cleanup_failure_aborts_recording() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    // Prepare-side drops (indexes 0 and 1) succeed; the final cleanup's
    // drops fail hard.
    let behavior = MockBehavior {
        fail_drop_from: Some(2),
        ..MockBehavior::default()
    };
    let mut orchestrator = orchestrator(dir.path(), &log, behavior);

    let error = orchestrator
        .run(&request("_101_raw_100k", 2))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Fatal);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0, "nothing recorded");
    Ok(())
}

#[tokio::test]
async fn unknown_key_is_rejected_before_any_phase() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let mut orchestrator = orchestrator(dir.path(), &log, MockBehavior::default());

    let error = orchestrator
        .run(&request("_999_raw_100k", 1))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(log.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn diagnostic_mode_on_wrong_engine_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let mut orchestrator = orchestrator(dir.path(), &log, MockBehavior::default());

    let context = RunContext::new(Engine::Mysql, Environment::Local, 1)
        .with_mode(ExecutionMode::StatisticsOn);
    let error = orchestrator
        .run_with_context("_101_raw_100k", context)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(log.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn diagnostic_mode_rejects_method_runners() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log: Log = Arc::default();
    let mut orchestrator = orchestrator(dir.path(), &log, MockBehavior::default());

    let context = RunContext::new(Engine::Postgres, Environment::Local, 1)
        .with_mode(ExecutionMode::ExplainAnalyze);
    let error = orchestrator
        .run_with_context("_101_method_100k", context)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
    Ok(())
}
