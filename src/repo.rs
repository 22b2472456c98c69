//! Data-access methods (the mapped execution path)
//!
//! Method mode runs one of five pre-bound access operations against the
//! engine's entity mapping: the same dialect SQL the raw path would use,
//! plus full materialization of every row into [`TreeEntity`]. Only the
//! full elapsed time is captured; the driver-internal row cadence is not
//! observable through the mapped fetch.

use std::time::Instant;

use tracing::info;

use crate::adapter::{ms_since, EngineAdapter};
use crate::config::ConnectionParams;
use crate::context::{ExecutionMode, RequestSample, RunContext};
use crate::dialect::{self, JoinKind};
use crate::engine::Engine;
use crate::error::{Error, Result};

/// The five pre-bound data-access operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMethod {
    /// Full scan, soft-deleted rows included
    FindAll,
    /// Full scan ordered by name
    FindAllOrdered,
    /// Soft-deleted rows excluded
    FindAllLive,
    /// Parents joined with their children (inner)
    FindWithChildrenInner,
    /// Parents joined with their children (left outer)
    FindWithChildrenLeft,
}

impl AccessMethod {
    /// The dialect SQL this operation executes on `engine`.
    #[must_use]
    pub fn sql(self, engine: Engine) -> String {
        match self {
            Self::FindAll => dialect::select_all(engine),
            Self::FindAllOrdered => dialect::select_ordered(engine),
            Self::FindAllLive => dialect::select_live(engine),
            Self::FindWithChildrenInner => dialect::select_with_children(engine, JoinKind::Inner),
            Self::FindWithChildrenLeft => {
                dialect::select_with_children(engine, JoinKind::LeftOuter)
            }
        }
    }

    /// Stable reference string, recorded in the result artifact's Code
    /// column.
    #[must_use]
    pub const fn reference(self) -> &'static str {
        match self {
            Self::FindAll => "TreeStore::find_all",
            Self::FindAllOrdered => "TreeStore::find_all_ordered",
            Self::FindAllLive => "TreeStore::find_all_live",
            Self::FindWithChildrenInner => "TreeStore::find_with_children_inner",
            Self::FindWithChildrenLeft => "TreeStore::find_with_children_left",
        }
    }
}

/// Run `context.runs` timed method-mode iterations.
///
/// # Errors
///
/// Diagnostic modes execute raw SQL only and are rejected here; driver
/// failures propagate wrapped.
pub async fn run_method(
    adapter: &mut dyn EngineAdapter,
    method: AccessMethod,
    credentials: &ConnectionParams,
    context: &RunContext,
) -> Result<Vec<RequestSample>> {
    if context.mode != ExecutionMode::Default {
        return Err(Error::Validation(format!(
            "execution mode {:?} executes raw SQL only, not {}",
            context.mode,
            method.reference()
        )));
    }

    let sql = method.sql(context.engine);
    let mut samples = Vec::with_capacity(context.runs as usize);
    for run in 0..context.runs {
        let started = Instant::now();
        let entities = adapter.fetch_entities(&sql, credentials, context).await?;
        let full_ms = ms_since(started);
        info!(
            run = run + 1,
            full_ms,
            rows = entities.len(),
            "request run (method mode)"
        );

        let mut sample = RequestSample::full_only(full_ms);
        if context.retain_rows {
            sample.rows = Some(entities);
        }
        samples.push(sample);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_render_their_shapes() {
        assert!(AccessMethod::FindAll
            .sql(Engine::Postgres)
            .starts_with("SELECT \"id\""));
        assert!(AccessMethod::FindAllLive
            .sql(Engine::Mysql)
            .contains("IS NULL"));
        assert!(AccessMethod::FindWithChildrenInner
            .sql(Engine::Mssql)
            .contains("INNER JOIN"));
        assert!(AccessMethod::FindWithChildrenLeft
            .sql(Engine::Oracle)
            .contains("LEFT OUTER JOIN"));
    }

    #[test]
    fn references_are_stable() {
        assert_eq!(AccessMethod::FindAll.reference(), "TreeStore::find_all");
    }
}
