//! Dataset seeder and cleaner
//!
//! Applies [`SeedPlan`]s through an engine adapter's untimed execution
//! path and owns cleanup: dropping the dataset schema idempotently and,
//! when configured, re-running the external schema-migration command.

pub mod plan;
pub mod sql;

use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

pub use plan::{build_plan, FanOut, PlannedRow, SeedPlan, SeedRound, TreePlan};

use crate::adapter::EngineAdapter;
use crate::config::ConnectionParams;
use crate::context::RunContext;
use crate::engine::{Environment, Phase};
use crate::error::{Error, Result};

/// External schema-migration command, run from cleanup to recreate the
/// dataset's backing schema after the drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCommand {
    /// Program to spawn
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
}

/// What one [`Seeder::apply`] call inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Rounds applied
    pub rounds: usize,
    /// Root rows inserted
    pub roots: u64,
    /// Total rows inserted across all depths
    pub rows_inserted: u64,
}

/// Builds and destroys the benchmark dataset.
#[derive(Debug, Clone)]
pub struct Seeder {
    chunk_rows: usize,
    migration: Option<MigrationCommand>,
}

impl Default for Seeder {
    fn default() -> Self {
        Self::new()
    }
}

impl Seeder {
    /// Seeder with the default chunk size and no migration command.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_rows: sql::DEFAULT_CHUNK_ROWS,
            migration: None,
        }
    }

    /// Override the bulk-insert chunk size.
    #[must_use]
    pub const fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows;
        self
    }

    /// Configure the schema-migration command run after cleanup drops.
    #[must_use]
    pub fn with_migration_command(mut self, command: MigrationCommand) -> Self {
        self.migration = Some(command);
        self
    }

    /// Apply a seed plan: for each round, optionally clean, then insert
    /// the planned forest depth by depth in homogeneous bulk batches.
    ///
    /// # Errors
    ///
    /// Fails fast on the first insert error (a partially seeded dataset
    /// must never be measured), on fan-out validation problems, and on
    /// non-skippable cleanup errors.
    pub async fn apply(
        &self,
        seed_plan: &SeedPlan,
        adapter: &mut dyn EngineAdapter,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        for (index, round) in seed_plan.rounds.iter().enumerate() {
            info!(round = index + 1, total = seed_plan.rounds.len(), "seed run");
            if round.clean_first {
                self.clean(adapter, credentials, context).await?;
            }

            debug!("preparing seeds");
            let tree = plan::build_plan(round)?;
            debug!(rows = tree.total_rows(), "inserting seeds into db");
            for depth_rows in tree.depths() {
                for statement in sql::insert_statements(context.engine, depth_rows, self.chunk_rows)
                {
                    adapter
                        .execute_raw(&statement, credentials, Phase::Prepare)
                        .await?;
                }
            }

            summary.rounds += 1;
            summary.roots += tree.roots();
            summary.rows_inserted += tree.total_rows();
        }
        Ok(summary)
    }

    /// Drop the dataset and bookkeeping tables, then recreate the schema
    /// via the configured migration command.
    ///
    /// Idempotent: drops that fail because the object is already absent
    /// are swallowed; anything else is fatal.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for non-skippable drop failures or a failing
    /// migration command.
    pub async fn clean(
        &self,
        adapter: &mut dyn EngineAdapter,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<()> {
        info!("clearing the database");
        for statement in sql::drop_statements(context.engine) {
            match adapter
                .execute_raw(&statement, credentials, Phase::Cleanup)
                .await
            {
                Ok(_) => {}
                Err(error) if is_already_absent(&error) => {
                    debug!(%error, "drop target already absent, skipping");
                }
                Err(error) => {
                    return Err(Error::Fatal(format!("cleanup failed: {error}")));
                }
            }
        }

        if let Some(command) = &self.migration {
            let output = run_migration(command, credentials, context).await?;
            debug!(bytes = output.len(), "migration command output captured");
        } else {
            debug!("no migration command configured; creating backing schema directly");
            for statement in sql::create_table_statements(context.engine) {
                adapter
                    .execute_raw(&statement, credentials, Phase::Cleanup)
                    .await?;
            }
        }
        Ok(())
    }
}

static ALREADY_ABSENT: OnceLock<Regex> = OnceLock::new();

/// The swallowable cleanup class: the drop target is already gone.
#[must_use]
pub fn is_already_absent(error: &Error) -> bool {
    let pattern = ALREADY_ABSENT
        .get_or_init(|| Regex::new("(?i)does not exist").expect("absent-object pattern is valid"));
    pattern.is_match(&format!("{error}"))
}

/// Run the external migration command with the `SCRIPT_DB_*` environment
/// contract.
async fn run_migration(
    command: &MigrationCommand,
    credentials: &ConnectionParams,
    context: &RunContext,
) -> Result<String> {
    info!(program = %command.program, "running schema migration");
    let mut process = Command::new(&command.program);
    process
        .args(&command.args)
        .env("DB_TO_MIGRATE", context.engine.to_string())
        .env("IS_SCRIPT", "true")
        .env("SCRIPT_DB_HOST", &credentials.host)
        .env("SCRIPT_DB_PORT", credentials.port.to_string())
        .env("SCRIPT_DB_USER", &credentials.user)
        .env("SCRIPT_DB_PASSWORD", &credentials.password)
        .env("SCRIPT_DB_DATABASE", &credentials.database);
    if context.environment == Environment::Remote {
        process.env("IS_REMOTE", "true");
    }
    if let Some(service) = &credentials.service {
        process.env("SCRIPT_DB_SERVICE", service);
    }

    let output = process
        .output()
        .await
        .map_err(|e| Error::Fatal(format!("failed to spawn migration command: {e}")))?;
    if !output.status.success() {
        return Err(Error::Fatal(format!(
            "migration command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn absent_object_matching_is_case_insensitive() {
        let oracle = Error::driver(
            Engine::Oracle,
            Phase::Cleanup,
            std::io::Error::other("ORA-00942: table or view does not exist"),
        );
        assert!(is_already_absent(&oracle));

        let postgres = Error::driver(
            Engine::Postgres,
            Phase::Cleanup,
            std::io::Error::other("relation \"Department\" DOES NOT EXIST"),
        );
        assert!(is_already_absent(&postgres));

        let denied = Error::driver(
            Engine::Mysql,
            Phase::Cleanup,
            std::io::Error::other("access denied"),
        );
        assert!(!is_already_absent(&denied));
    }
}
