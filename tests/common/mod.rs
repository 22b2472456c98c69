//! Shared test doubles: a scriptable engine adapter and fixed credentials.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rowbench::adapter::{EngineAdapter, Request};
use rowbench::config::{ConnectionParams, StaticCredentials};
use rowbench::context::{RequestSample, RowSample, RunContext};
use rowbench::orchestrator::AdapterFactory;
use rowbench::{Engine, Environment, Error, Phase, Result, TreeEntity};

pub fn params() -> ConnectionParams {
    ConnectionParams {
        host: "localhost".to_string(),
        port: 5432,
        user: "bench".to_string(),
        password: "bench".to_string(),
        database: "bench".to_string(),
        service: None,
    }
}

/// Credentials for every engine in both environments.
pub fn provider() -> StaticCredentials {
    let mut provider = StaticCredentials::new();
    for engine in Engine::ALL {
        for environment in [Environment::Local, Environment::Remote] {
            provider = provider.with(engine, environment, params());
        }
    }
    provider
}

/// Failure script for the mock adapter.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Every bulk INSERT fails with a driver error.
    pub fail_inserts: bool,
    /// Every DROP fails with an "object does not exist" driver error.
    pub absent_drops: bool,
    /// DROPs fail hard from this 0-based drop index on.
    pub fail_drop_from: Option<usize>,
}

/// Adapter double that logs every statement and returns deterministic
/// samples: full times 100, 110, 120, … with a first row at 10 ms and
/// five row samples 10 ms apart.
pub struct MockAdapter {
    engine: Engine,
    log: Arc<Mutex<Vec<String>>>,
    behavior: MockBehavior,
    drops_seen: Arc<Mutex<usize>>,
}

fn entity(id: &str) -> TreeEntity {
    TreeEntity {
        id: id.to_string(),
        name: format!("name-{id}"),
        external_id: format!("ext-{id}"),
        parent_id: None,
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
        deleted_at: None,
    }
}

#[async_trait]
impl EngineAdapter for MockAdapter {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn execute(
        &mut self,
        request: Request<'_>,
        _credentials: &ConnectionParams,
        context: &RunContext,
    ) -> Result<Vec<RequestSample>> {
        let sql = request.raw_sql()?;
        self.log.lock().unwrap().push(format!("EXEC {sql}"));
        Ok((0..context.runs)
            .map(|i| RequestSample {
                full_ms: 100.0 + f64::from(i) * 10.0,
                first_row_ms: Some(10.0),
                row_samples: (0..5)
                    .map(|j| RowSample {
                        row_index: j * 1000 + 1,
                        at_ms: 10.0 * (j + 1) as f64,
                    })
                    .collect(),
                cpu_ms: None,
                elapsed_ms: None,
                rows: None,
            })
            .collect())
    }

    async fn fetch_entities(
        &mut self,
        sql: &str,
        _credentials: &ConnectionParams,
        _context: &RunContext,
    ) -> Result<Vec<TreeEntity>> {
        self.log.lock().unwrap().push(format!("FETCH {sql}"));
        Ok(vec![entity("a"), entity("b"), entity("c")])
    }

    async fn execute_raw(
        &mut self,
        sql: &str,
        _credentials: &ConnectionParams,
        phase: Phase,
    ) -> Result<u64> {
        self.log.lock().unwrap().push(format!("RAW {sql}"));
        if sql.starts_with("INSERT") && self.behavior.fail_inserts {
            return Err(Error::driver(
                self.engine,
                phase,
                std::io::Error::other("bulk create failed"),
            ));
        }
        if sql.starts_with("DROP") {
            let index = {
                let mut seen = self.drops_seen.lock().unwrap();
                let index = *seen;
                *seen += 1;
                index
            };
            if let Some(from) = self.behavior.fail_drop_from {
                if index >= from {
                    return Err(Error::driver(
                        self.engine,
                        phase,
                        std::io::Error::other("insufficient privileges to drop"),
                    ));
                }
            }
            if self.behavior.absent_drops {
                return Err(Error::driver(
                    self.engine,
                    phase,
                    std::io::Error::other("table \"Department\" does not exist"),
                ));
            }
        }
        Ok(0)
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.log.lock().unwrap().push("SHUTDOWN".to_string());
        Ok(())
    }
}

/// Factory wiring mock adapters to a shared statement log.
pub fn mock_factory(log: Arc<Mutex<Vec<String>>>, behavior: MockBehavior) -> AdapterFactory {
    let drops_seen = Arc::new(Mutex::new(0));
    Box::new(move |engine| {
        Box::new(MockAdapter {
            engine,
            log: Arc::clone(&log),
            behavior: behavior.clone(),
            drops_seen: Arc::clone(&drops_seen),
        })
    })
}
