//! Mssql adapter (tiberius over a compat-wrapped TCP stream)
//!
//! Streams `QueryItem`s row by row and carries the `SET STATISTICS TIME
//! ON` diagnostic mode: the query text is prefixed with the directive and
//! any captured server informational messages are parsed for the
//! `CPU time = <n> ms, elapsed time = <n> ms` pattern. The current driver
//! surfaces no informational messages to the application, so the parsed
//! figures stay absent until it grows such a hook; the run itself is
//! unaffected.

use std::sync::OnceLock;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use regex::Regex;
use tiberius::{AuthMethod, Client, Config, QueryItem, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use crate::adapter::{
    ensure_mode, ms_since, EngineAdapter, Request, RowSampler, DEFAULT_ROW_SAMPLE_INTERVAL,
};
use crate::config::ConnectionParams;
use crate::context::{CachePolicy, ExecutionMode, RequestSample, RunContext};
use crate::engine::{Engine, Phase};
use crate::error::{Error, Result};
use crate::model::TreeEntity;

const STATISTICS_PREFIX: &str = "SET STATISTICS TIME ON;\n";

type TdsClient = Client<Compat<TcpStream>>;

static TIME_STATISTICS: OnceLock<Regex> = OnceLock::new();

/// Parse SQL Server's time-statistics informational message. The server
/// historically prints two spaces after the comma; both spacings match.
pub(crate) fn parse_time_statistics(message: &str) -> Option<(f64, f64)> {
    let pattern = TIME_STATISTICS.get_or_init(|| {
        Regex::new(r"(?i)CPU time = ([0-9]+) ms,\s+elapsed time = ([0-9]+) ms")
            .expect("time-statistics pattern is valid")
    });
    let captures = pattern.captures(message)?;
    let cpu: f64 = captures.get(1)?.as_str().parse().ok()?;
    let elapsed: f64 = captures.get(2)?.as_str().parse().ok()?;
    Some((cpu, elapsed))
}

/// Streaming mssql adapter.
pub struct MssqlAdapter {
    client: Option<TdsClient>,
    interval: u64,
    info_messages: Vec<String>,
}

impl Default for MssqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MssqlAdapter {
    /// Adapter with the default row-sampling interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            client: None,
            interval: DEFAULT_ROW_SAMPLE_INTERVAL,
            info_messages: Vec::new(),
        }
    }

    async fn resolve_client(
        &mut self,
        cache: CachePolicy,
        credentials: &ConnectionParams,
    ) -> Result<&mut TdsClient> {
        if matches!(cache, CachePolicy::BetweenRuns) && self.client.is_some() {
            debug!("returning cached client");
        } else {
            // Dropping the previous client closes its socket.
            self.client.take();
            let mut config = Config::new();
            config.host(&credentials.host);
            config.port(credentials.port);
            config.database(&credentials.database);
            config.authentication(AuthMethod::sql_server(&credentials.user, &credentials.password));
            config.trust_cert();

            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| Error::driver(Engine::Mssql, Phase::Connect, e))?;
            tcp.set_nodelay(true)
                .map_err(|e| Error::driver(Engine::Mssql, Phase::Connect, e))?;
            let client = Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| Error::driver(Engine::Mssql, Phase::Connect, e))?;
            self.client = Some(client);
        }
        self.client
            .as_mut()
            .ok_or_else(|| Error::Fatal("mssql client unavailable after connect".to_string()))
    }

    /// Parse and clear captured informational messages.
    fn captured_statistics(&mut self) -> (Option<f64>, Option<f64>) {
        let mut cpu = None;
        let mut elapsed = None;
        for message in self.info_messages.drain(..) {
            if let Some((c, e)) = parse_time_statistics(&message) {
                cpu = Some(c);
                elapsed = Some(e);
            }
        }
        if cpu.is_none() {
            warn!("server surfaced no time-statistics message; cpu/elapsed omitted");
        }
        (cpu, elapsed)
    }
}

fn map_row(row: &Row) -> TreeEntity {
    TreeEntity {
        id: row
            .try_get::<&str, _>(0)
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or_default(),
        name: row
            .try_get::<&str, _>(1)
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or_default(),
        external_id: row
            .try_get::<&str, _>(2)
            .ok()
            .flatten()
            .map(str::to_string)
            .unwrap_or_default(),
        parent_id: row.try_get::<&str, _>(3).ok().flatten().map(str::to_string),
        created_at: row
            .try_get::<chrono::NaiveDateTime, _>(4)
            .ok()
            .flatten()
            .map(|n| n.and_utc()),
        updated_at: row
            .try_get::<chrono::NaiveDateTime, _>(5)
            .ok()
            .flatten()
            .map(|n| n.and_utc()),
        deleted_at: row
            .try_get::<chrono::NaiveDateTime, _>(6)
            .ok()
            .flatten()
            .map(|n| n.and_utc()),
    }
}

#[async_trait]
impl EngineAdapter for MssqlAdapter {
    fn engine(&self) -> Engine {
        Engine::Mssql
    }

    async fn execute(
        &mut self,
        request: Request<'_>,
        credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>> {
        ensure_mode(Engine::Mssql, context.mode)?;
        let sql = request.raw_sql()?;
        let statistics = context.mode == ExecutionMode::StatisticsOn;
        let final_query = if statistics {
            format!("{STATISTICS_PREFIX}{sql}")
        } else {
            sql.to_string()
        };
        let interval = self.interval;
        let retain = context.retain_rows;

        let mut samples = Vec::with_capacity(context.runs as usize);
        for run in 0..context.runs {
            let client = self.resolve_client(context.cache, credentials).await?;

            let started = Instant::now();
            let mut stream = client
                .simple_query(final_query.as_str())
                .await
                .map_err(|e| Error::driver(Engine::Mssql, Phase::Execute, e))?;

            let mut sampler = RowSampler::new(started, interval);
            let mut retained = retain.then(Vec::new);
            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| Error::driver(Engine::Mssql, Phase::Execute, e))?
            {
                if let QueryItem::Row(row) = item {
                    sampler.observe();
                    if let Some(rows) = retained.as_mut() {
                        rows.push(map_row(&row));
                    }
                }
            }
            drop(stream);

            let full_ms = ms_since(started);
            let (first_row_ms, row_samples) = sampler.finish(full_ms);
            let (cpu_ms, elapsed_ms) = if statistics {
                self.captured_statistics()
            } else {
                (None, None)
            };
            info!(
                run = run + 1,
                full_ms,
                first_row_ms = first_row_ms.unwrap_or(full_ms),
                "request run"
            );
            samples.push(RequestSample {
                full_ms,
                first_row_ms,
                row_samples,
                cpu_ms,
                elapsed_ms,
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
            .simple_query(sql)
            .await
            .map_err(|e| Error::driver(Engine::Mssql, Phase::Execute, e))?
            .into_first_result()
            .await
            .map_err(|e| Error::driver(Engine::Mssql, Phase::Execute, e))?;
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
        let result = client
            .execute(sql, &[])
            .await
            .map_err(|e| Error::driver(Engine::Mssql, phase, e))?;
        Ok(result.total())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.client.take();
        Ok(())
    }
}
