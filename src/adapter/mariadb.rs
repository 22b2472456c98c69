//! Mariadb adapter (mysql_async over a pool constrained to one
//! connection)
//!
//! Mariadb historically ran through a pooled driver; the pool survives
//! here but is pinned to a single connection, which is all the strictly
//! sequential orchestration can ever use.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Pool, PoolConstraints, PoolOpts, Row};
use tracing::{debug, info};

use crate::adapter::mysql::{map_row, run_timed, MysqlAdapter};
use crate::adapter::{ensure_mode, EngineAdapter, Request, DEFAULT_ROW_SAMPLE_INTERVAL};
use crate::config::ConnectionParams;
use crate::context::{CachePolicy, RequestSample, RunContext};
use crate::engine::{Engine, Phase};
use crate::error::{Error, Result};
use crate::model::TreeEntity;

/// Pool-of-one mariadb adapter.
pub struct MariadbAdapter {
    pool: Option<Pool>,
    conn: Option<Conn>,
    interval: u64,
}

impl Default for MariadbAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MariadbAdapter {
    /// Adapter with the default row-sampling interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pool: None,
            conn: None,
            interval: DEFAULT_ROW_SAMPLE_INTERVAL,
        }
    }

    async fn resolve_conn(
        &mut self,
        cache: CachePolicy,
        credentials: &ConnectionParams,
    ) -> Result<&mut Conn> {
        if matches!(cache, CachePolicy::BetweenRuns) && self.conn.is_some() {
            debug!("returning cached client");
        } else {
            // Dropping the old connection returns it to the pool.
            self.conn.take();
            if self.pool.is_none() {
                let constraints = PoolConstraints::new(1, 1)
                    .ok_or_else(|| Error::Fatal("invalid pool constraints".to_string()))?;
                let opts = MysqlAdapter::opts(credentials)
                    .pool_opts(PoolOpts::default().with_constraints(constraints));
                self.pool = Some(Pool::new(opts));
            }
            let pool = self
                .pool
                .as_ref()
                .ok_or_else(|| Error::Fatal("mariadb pool unavailable".to_string()))?;
            let conn = pool
                .get_conn()
                .await
                .map_err(|e| Error::driver(Engine::Mariadb, Phase::Connect, e))?;
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::Fatal("mariadb connection unavailable after connect".to_string()))
    }
}

#[async_trait]
impl EngineAdapter for MariadbAdapter {
    fn engine(&self) -> Engine {
        Engine::Mariadb
    }

    async fn execute(
        &mut self,
        request: Request<'_>,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>> {
        ensure_mode(Engine::Mariadb, context.mode)?;
        let sql = request.raw_sql()?.to_string();
        let interval = self.interval;
        let retain = context.retain_rows;

        let mut samples = Vec::with_capacity(context.runs as usize);
        for run in 0..context.runs {
            let conn = self.resolve_conn(context.cache, credentials).await?;
            let sample = run_timed(Engine::Mariadb, conn, &sql, interval, retain).await?;
            info!(
                run = run + 1,
                full_ms = sample.full_ms,
                first_row_ms = sample.first_row_ms.unwrap_or(sample.full_ms),
                "request run"
            );
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
        let conn = self.resolve_conn(context.cache, credentials).await?;
        let rows: Vec<Row> = conn
            .query(sql)
            .await
            .map_err(|e| Error::driver(Engine::Mariadb, Phase::Execute, e))?;
        Ok(rows.iter().map(map_row).collect())
    }

    async fn execute_raw(
        &mut self,
        sql: &str,
        credentials: &ConnectionParams,
        phase: Phase,
    ) -> Result<u64> {
        let conn = self
            .resolve_conn(CachePolicy::BetweenRuns, credentials)
            .await?;
        conn.query_drop(sql)
            .await
            .map_err(|e| Error::driver(Engine::Mariadb, phase, e))?;
        Ok(conn.affected_rows())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.conn.take();
        if let Some(pool) = self.pool.take() {
            pool.disconnect()
                .await
                .map_err(|e| Error::driver(Engine::Mariadb, Phase::Cleanup, e))?;
        }
        Ok(())
    }
}
