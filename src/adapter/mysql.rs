//! Mysql adapter (mysql_async, single connection)
//!
//! Rows are consumed one packet at a time off the text-protocol result,
//! which is as close to arrival order as the driver exposes.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Row, Value};
use tracing::{debug, info};

use crate::adapter::{
    ensure_mode, ms_since, EngineAdapter, Request, RowSampler, DEFAULT_ROW_SAMPLE_INTERVAL,
};
use crate::config::ConnectionParams;
use crate::context::{CachePolicy, RequestSample, RunContext};
use crate::engine::{Engine, Phase};
use crate::error::{Error, Result};
use crate::model::TreeEntity;

/// Single-connection mysql adapter.
pub struct MysqlAdapter {
    conn: Option<Conn>,
    interval: u64,
}

impl Default for MysqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlAdapter {
    /// Adapter with the default row-sampling interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conn: None,
            interval: DEFAULT_ROW_SAMPLE_INTERVAL,
        }
    }

    pub(crate) fn opts(credentials: &ConnectionParams) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(credentials.host.clone())
            .tcp_port(credentials.port)
            .user(Some(credentials.user.clone()))
            .pass(Some(credentials.password.clone()))
            .db_name(Some(credentials.database.clone()))
    }

    async fn resolve_conn(
        &mut self,
        cache: CachePolicy,
        credentials: &ConnectionParams,
    ) -> Result<&mut Conn> {
        if matches!(cache, CachePolicy::BetweenRuns) && self.conn.is_some() {
            debug!("returning cached client");
        } else {
            if let Some(old) = self.conn.take() {
                old.disconnect().await.ok();
            }
            let conn = Conn::new(Self::opts(credentials))
                .await
                .map_err(|e| Error::driver(Engine::Mysql, Phase::Connect, e))?;
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| Error::Fatal("mysql connection unavailable after connect".to_string()))
    }
}

fn text_value(row: &Row, index: usize) -> Option<String> {
    match row.as_ref(index) {
        Some(Value::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn timestamp_value(row: &Row, index: usize) -> Option<DateTime<Utc>> {
    let naive: Option<NaiveDateTime> = match row.as_ref(index) {
        Some(&Value::Date(year, month, day, hour, minute, second, micros)) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day)).and_then(
                |date| {
                    date.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                },
            )
        }
        // Text protocol delivers temporal columns as bytes.
        Some(Value::Bytes(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S"))
                .ok()
        }
        _ => None,
    };
    naive.map(|n| n.and_utc())
}

/// Map a `Department` row; shared with the mariadb adapter.
pub(crate) fn map_row(row: &Row) -> TreeEntity {
    TreeEntity {
        id: text_value(row, 0).unwrap_or_default(),
        name: text_value(row, 1).unwrap_or_default(),
        external_id: text_value(row, 2).unwrap_or_default(),
        parent_id: text_value(row, 3),
        created_at: timestamp_value(row, 4),
        updated_at: timestamp_value(row, 5),
        deleted_at: timestamp_value(row, 6),
    }
}

/// One timed text-protocol execution over an already resolved connection;
/// shared with the mariadb adapter.
pub(crate) async fn run_timed(
    engine: Engine,
    conn: &mut Conn,
    sql: &str,
    interval: u64,
    retain_rows: bool,
) -> Result<RequestSample> {
    let started = Instant::now();
    let mut result = conn
        .query_iter(sql)
        .await
        .map_err(|e| Error::driver(engine, Phase::Execute, e))?;

    let mut sampler = RowSampler::new(started, interval);
    let mut retained = retain_rows.then(Vec::new);
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| Error::driver(engine, Phase::Execute, e))?
    {
        sampler.observe();
        if let Some(rows) = retained.as_mut() {
            rows.push(map_row(&row));
        }
    }
    drop(result);

    let full_ms = ms_since(started);
    let (first_row_ms, row_samples) = sampler.finish(full_ms);
    Ok(RequestSample {
        full_ms,
        first_row_ms,
        row_samples,
        cpu_ms: None,
        elapsed_ms: None,
        rows: retained,
    })
}

#[async_trait]
impl EngineAdapter for MysqlAdapter {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    async fn execute(
        &mut self,
        request: Request<'_>,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>> {
        ensure_mode(Engine::Mysql, context.mode)?;
        let sql = request.raw_sql()?.to_string();
        let interval = self.interval;
        let retain = context.retain_rows;

        let mut samples = Vec::with_capacity(context.runs as usize);
        for run in 0..context.runs {
            let conn = self.resolve_conn(context.cache, credentials).await?;
            let sample = run_timed(Engine::Mysql, conn, &sql, interval, retain).await?;
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
            .map_err(|e| Error::driver(Engine::Mysql, Phase::Execute, e))?;
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
            .map_err(|e| Error::driver(Engine::Mysql, phase, e))?;
        Ok(conn.affected_rows())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.disconnect()
                .await
                .map_err(|e| Error::driver(Engine::Mysql, Phase::Cleanup, e))?;
        }
        Ok(())
    }
}
