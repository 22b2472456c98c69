//! Postgres adapter (tokio-postgres)
//!
//! The only adapter with a true row *stream*: rows are observed as the
//! socket yields them, so first-row and inter-row timings are genuine
//! arrival times. Also carries the `EXPLAIN ANALYSE` diagnostic mode.

use std::time::Instant;

use async_trait::async_trait;
use futures_util::{pin_mut, TryStreamExt};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info};

use crate::adapter::{
    ensure_mode, ms_since, EngineAdapter, Request, RowSampler, DEFAULT_ROW_SAMPLE_INTERVAL,
};
use crate::config::ConnectionParams;
use crate::context::{CachePolicy, ExecutionMode, RequestSample, RunContext};
use crate::engine::{Engine, Phase};
use crate::error::{Error, Result};
use crate::model::TreeEntity;

const EXPLAIN_PREFIX: &str = "EXPLAIN ANALYSE\n";

/// Streaming postgres adapter.
pub struct PostgresAdapter {
    client: Option<Client>,
    interval: u64,
}

impl Default for PostgresAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresAdapter {
    /// Adapter with the default row-sampling interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            client: None,
            interval: DEFAULT_ROW_SAMPLE_INTERVAL,
        }
    }

    async fn resolve_client(
        &mut self,
        cache: CachePolicy,
        credentials: &ConnectionParams,
    ) -> Result<&Client> {
        if matches!(cache, CachePolicy::BetweenRuns) && self.client.is_some() {
            debug!("returning cached client");
        } else {
            // Reconnecting closes the previous handle first.
            self.client.take();
            let mut config = tokio_postgres::Config::new();
            config
                .host(&credentials.host)
                .port(credentials.port)
                .user(&credentials.user)
                .password(&credentials.password)
                .dbname(&credentials.database);
            let (client, connection) = config
                .connect(NoTls)
                .await
                .map_err(|e| Error::driver(Engine::Postgres, Phase::Connect, e))?;
            tokio::spawn(async move {
                if let Err(error) = connection.await {
                    debug!(%error, "postgres connection task ended");
                }
            });
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| Error::Fatal("postgres client unavailable after connect".to_string()))
    }
}

fn map_row(row: &Row) -> TreeEntity {
    TreeEntity {
        id: row.try_get::<_, String>(0).unwrap_or_default(),
        name: row.try_get::<_, String>(1).unwrap_or_default(),
        external_id: row.try_get::<_, String>(2).unwrap_or_default(),
        parent_id: row.try_get::<_, Option<String>>(3).ok().flatten(),
        created_at: row.try_get(4).ok().flatten(),
        updated_at: row.try_get(5).ok().flatten(),
        deleted_at: row.try_get(6).ok().flatten(),
    }
}

#[async_trait]
impl EngineAdapter for PostgresAdapter {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn execute(
        &mut self,
        request: Request<'_>,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>> {
        ensure_mode(Engine::Postgres, context.mode)?;
        let sql = request.raw_sql()?;
        let final_query = match context.mode {
            ExecutionMode::ExplainAnalyze => format!("{EXPLAIN_PREFIX}{sql}"),
            _ => sql.to_string(),
        };
        let interval = self.interval;

        let mut samples = Vec::with_capacity(context.runs as usize);
        for run in 0..context.runs {
            let client = self.resolve_client(context.cache, credentials).await?;

            let started = Instant::now();
            let stream = client
                .query_raw(final_query.as_str(), Vec::<i32>::new())
                .await
                .map_err(|e| Error::driver(Engine::Postgres, Phase::Execute, e))?;
            pin_mut!(stream);

            let mut sampler = RowSampler::new(started, interval);
            let mut retained = context.retain_rows.then(Vec::new);
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(|e| Error::driver(Engine::Postgres, Phase::Execute, e))?
            {
                sampler.observe();
                if let Some(rows) = retained.as_mut() {
                    rows.push(map_row(&row));
                }
            }

            let full_ms = ms_since(started);
            let rows_seen = sampler.rows_seen();
            let (first_row_ms, row_samples) = sampler.finish(full_ms);
            info!(
                run = run + 1,
                full_ms,
                first_row_ms = first_row_ms.unwrap_or(full_ms),
                rows = rows_seen,
                "request run"
            );
            samples.push(RequestSample {
                full_ms,
                first_row_ms,
                row_samples,
                cpu_ms: None,
                elapsed_ms: None,
                rows: retained,
            });
        }
        Ok(samples)
    }

    async fn fetch_entities(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<TreeEntity>> {
        let client = self.resolve_client(context.cache, credentials).await?;
        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| Error::driver(Engine::Postgres, Phase::Execute, e))?;
        Ok(rows.iter().map(map_row).collect())
    }

    async fn execute_raw(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        phase: Phase,
    ) -> Result<u64> {
        let client = self
            .resolve_client(CachePolicy::BetweenRuns, credentials)
            .await?;
        client
            .execute(sql, &[])
            .await
            .map_err(|e| Error::driver(Engine::Postgres, phase, e))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.client.take();
        Ok(())
    }
}
