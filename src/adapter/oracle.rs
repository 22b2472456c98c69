//! Oracle adapter (blocking `oracle` client isolated on the blocking
//! pool)
//!
//! The driver is synchronous, so every call moves the cached connection
//! into `spawn_blocking` and moves it back afterwards. Ownership is
//! exclusive either way, which is exactly what the strictly sequential
//! orchestration guarantees; rows still iterate one at a time, so per-row
//! sampling works like the streaming adapters.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use oracle::Connection;
use tracing::{debug, info};

use crate::adapter::{
    ensure_mode, ms_since, EngineAdapter, Request, RowSampler, DEFAULT_ROW_SAMPLE_INTERVAL,
};
use crate::config::ConnectionParams;
use crate::context::{CachePolicy, RequestSample, RunContext};
use crate::engine::{Engine, Phase};
use crate::error::{Error, Result};
use crate::model::TreeEntity;

/// Blocking-pool oracle adapter.
pub struct OracleAdapter {
    conn: Option<Connection>,
    interval: u64,
}

impl Default for OracleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleAdapter {
    /// Adapter with the default row-sampling interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conn: None,
            interval: DEFAULT_ROW_SAMPLE_INTERVAL,
        }
    }
}

fn connect(credentials: &ConnectionParams) -> Result<Connection> {
    let service = credentials
        .service
        .clone()
        .unwrap_or_else(|| credentials.database.clone());
    let connect_string = format!("//{}:{}/{}", credentials.host, credentials.port, service);
    let mut conn = Connection::connect(&credentials.user, &credentials.password, &connect_string)
        .map_err(|e| Error::driver(Engine::Oracle, Phase::Connect, e))?;
    // Seed inserts go through this handle; each statement stands alone.
    conn.set_autocommit(true);
    Ok(conn)
}

fn resolve_blocking(
    cached: Option<Connection>,
    cache: CachePolicy,
    credentials: &ConnectionParams,
) -> Result<Connection> {
    match cached {
        Some(conn) if matches!(cache, CachePolicy::BetweenRuns) => {
            debug!("returning cached client");
            Ok(conn)
        }
        other => {
            if let Some(old) = other {
                old.close().ok();
            }
            connect(credentials)
        }
    }
}

fn map_row(row: &oracle::Row) -> TreeEntity {
    fn text(row: &oracle::Row, index: usize) -> Option<String> {
        row.get::<usize, Option<String>>(index).ok().flatten()
    }
    fn timestamp(row: &oracle::Row, index: usize) -> Option<DateTime<Utc>> {
        row.get::<usize, Option<NaiveDateTime>>(index)
            .ok()
            .flatten()
            .map(|n| n.and_utc())
    }

    TreeEntity {
        id: text(row, 0).unwrap_or_default(),
        name: text(row, 1).unwrap_or_default(),
        external_id: text(row, 2).unwrap_or_default(),
        parent_id: text(row, 3),
        created_at: timestamp(row, 4),
        updated_at: timestamp(row, 5),
        deleted_at: timestamp(row, 6),
    }
}

async fn on_blocking_pool<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Fatal(format!("oracle worker task failed: {e}")))?
}

#[async_trait]
impl EngineAdapter for OracleAdapter {
    fn engine(&self) -> Engine {
        Engine::Oracle
    }

    async fn execute(
        &mut self,
        request: Request<'_>,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>> {
        ensure_mode(Engine::Oracle, context.mode)?;
        let sql = request.raw_sql()?.to_string();
        let interval = self.interval;
        let retain = context.retain_rows;
        let cache = context.cache;

        let mut samples = Vec::with_capacity(context.runs as usize);
        for run in 0..context.runs {
            let cached = self.conn.take();
            let credentials = credentials.clone();
            let sql = sql.clone();
            let (conn, sample) = on_blocking_pool(move || {
                let conn = resolve_blocking(cached, cache, &credentials)?;

                let started = Instant::now();
                let rows = conn
                    .query(&sql, &[])
                    .map_err(|e| Error::driver(Engine::Oracle, Phase::Execute, e))?;
                let mut sampler = RowSampler::new(started, interval);
                let mut retained = retain.then(Vec::new);
                for row in rows {
                    let row = row.map_err(|e| Error::driver(Engine::Oracle, Phase::Execute, e))?;
                    sampler.observe();
                    if let Some(entities) = retained.as_mut() {
                        entities.push(map_row(&row));
                    }
                }

                let full_ms = ms_since(started);
                let (first_row_ms, row_samples) = sampler.finish(full_ms);
                Ok((
                    conn,
                    RequestSample {
                        full_ms,
                        first_row_ms,
                        row_samples,
                        cpu_ms: None,
                        elapsed_ms: None,
                        rows: retained,
                    },
                ))
            })
            .await?;

            info!(
                run = run + 1,
                full_ms = sample.full_ms,
                first_row_ms = sample.first_row_ms.unwrap_or(sample.full_ms),
                "request run"
            );
            self.conn = Some(conn);
            samples.push(sample);
        }
        Ok(samples)
    }

    async fn fetch_entities(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<TreeEntity>> {
        let cached = self.conn.take();
        let credentials = credentials.clone();
        let sql = sql.to_string();
        let cache = context.cache;
        let (conn, entities) = on_blocking_pool(move || {
            let conn = resolve_blocking(cached, cache, &credentials)?;
            let rows = conn
                .query(&sql, &[])
                .map_err(|e| Error::driver(Engine::Oracle, Phase::Execute, e))?;
            let mut entities = Vec::new();
            for row in rows {
                let row = row.map_err(|e| Error::driver(Engine::Oracle, Phase::Execute, e))?;
                entities.push(map_row(&row));
            }
            Ok((conn, entities))
        })
        .await?;
        self.conn = Some(conn);
        Ok(entities)
    }

    async fn execute_raw(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        phase: Phase,
    ) -> Result<u64> {
        let cached = self.conn.take();
        let credentials = credentials.clone();
        let sql = sql.to_string();
        let (conn, affected) = on_blocking_pool(move || {
            let conn = resolve_blocking(cached, CachePolicy::BetweenRuns, &credentials)?;
            let affected = {
                let statement = conn
                    .execute(&sql, &[])
                    .map_err(|e| Error::driver(Engine::Oracle, phase, e))?;
                statement.row_count().unwrap_or(0)
            };
            Ok((conn, affected))
        })
        .await?;
        self.conn = Some(conn);
        Ok(affected)
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            on_blocking_pool(move || {
                conn.close().ok();
                Ok(())
            })
            .await?;
        }
        Ok(())
    }
}
