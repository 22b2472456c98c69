//! Experiment catalog
//!
//! Named, immutable experiment definitions: which runner to time (raw
//! dialect SQL or a data-access method), how to seed beforehand, how to
//! clean up afterwards. The builtin catalog carries the five query shapes
//! in both flavors at the 100k and 1m scales, twenty keys in all
//! (`_101_raw_100k` … `_105_method_1m`).

use std::collections::BTreeMap;

use crate::dialect::{self, JoinKind};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::repo::AccessMethod;
use crate::seed::plan::{FanOut, SeedPlan, SeedRound};

/// Pre-quoted literal SQL, one text per engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlByEngine {
    postgres: String,
    mysql: String,
    mssql: String,
    oracle: String,
    mariadb: String,
}

impl SqlByEngine {
    /// Render one statement shape for every engine.
    pub fn render(shape: impl Fn(Engine) -> String) -> Self {
        Self {
            postgres: shape(Engine::Postgres),
            mysql: shape(Engine::Mysql),
            mssql: shape(Engine::Mssql),
            oracle: shape(Engine::Oracle),
            mariadb: shape(Engine::Mariadb),
        }
    }

    /// The text for one engine.
    #[must_use]
    pub fn get(&self, engine: Engine) -> &str {
        match engine {
            Engine::Postgres => &self.postgres,
            Engine::Mysql => &self.mysql,
            Engine::Mssql => &self.mssql,
            Engine::Oracle => &self.oracle,
            Engine::Mariadb => &self.mariadb,
        }
    }
}

/// What an experiment times: raw literal SQL per engine, or a pre-bound
/// data-access method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runner {
    /// Literal dialect SQL per engine
    Raw(SqlByEngine),
    /// Pre-bound data-access operation
    Method(AccessMethod),
}

impl Runner {
    /// The executed query text or method reference, for the artifact's
    /// Code column.
    #[must_use]
    pub fn code(&self, engine: Engine) -> String {
        match self {
            Self::Raw(sql) => sql.get(engine).to_string(),
            Self::Method(method) => method.reference().to_string(),
        }
    }
}

/// Cleanup side of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupSpec {
    /// Drop the dataset and bookkeeping tables (idempotent), then
    /// recreate the schema
    DropSchema,
}

/// One catalog entry. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDefinition {
    /// Runner to time
    pub runner: Runner,
    /// Seed plan applied before the timed iterations
    pub prepare: SeedPlan,
    /// Cleanup applied afterwards, success or failure
    pub cleanup: CleanupSpec,
}

/// The experiment registry.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, ExperimentDefinition>,
}

#[derive(Clone, Copy)]
enum Shape {
    All,
    Ordered,
    Live,
    ChildrenInner,
    ChildrenLeft,
}

#[derive(Clone, Copy)]
enum Scale {
    K100,
    M1,
}

impl Shape {
    const fn number(self) -> u16 {
        match self {
            Self::All => 101,
            Self::Ordered => 102,
            Self::Live => 103,
            Self::ChildrenInner => 104,
            Self::ChildrenLeft => 105,
        }
    }

    fn sql(self, engine: Engine) -> String {
        match self {
            Self::All => dialect::select_all(engine),
            Self::Ordered => dialect::select_ordered(engine),
            Self::Live => dialect::select_live(engine),
            Self::ChildrenInner => dialect::select_with_children(engine, JoinKind::Inner),
            Self::ChildrenLeft => dialect::select_with_children(engine, JoinKind::LeftOuter),
        }
    }

    const fn method(self) -> AccessMethod {
        match self {
            Self::All => AccessMethod::FindAll,
            Self::Ordered => AccessMethod::FindAllOrdered,
            Self::Live => AccessMethod::FindAllLive,
            Self::ChildrenInner => AccessMethod::FindWithChildrenInner,
            Self::ChildrenLeft => AccessMethod::FindWithChildrenLeft,
        }
    }

    /// Seed plan for this shape at the given scale. The big scales repeat
    /// smaller rounds so bulk batches stay uniform; only the first round
    /// cleans.
    fn seed_plan(self, scale: Scale) -> SeedPlan {
        match self {
            Self::All | Self::Ordered => match scale {
                Scale::K100 => flat_rounds(1, 100_000),
                Scale::M1 => flat_rounds(10, 100_000),
            },
            Self::Live => match scale {
                Scale::K100 => filtered_rounds(2, 50_000),
                Scale::M1 => filtered_rounds(20, 50_000),
            },
            Self::ChildrenInner | Self::ChildrenLeft => match scale {
                Scale::K100 => children_rounds(1, 50_000),
                Scale::M1 => children_rounds(10, 50_000),
            },
        }
    }
}

impl Scale {
    const fn suffix(self) -> &'static str {
        match self {
            Self::K100 => "100k",
            Self::M1 => "1m",
        }
    }
}

/// Root-only rounds.
fn flat_rounds(rounds: usize, roots: u64) -> SeedPlan {
    SeedPlan {
        rounds: (0..rounds)
            .map(|i| SeedRound {
                clean_first: i == 0,
                ..SeedRound::new(roots, FanOut::None)
            })
            .collect(),
    }
}

/// One child per root.
fn children_rounds(rounds: usize, roots: u64) -> SeedPlan {
    SeedPlan {
        rounds: (0..rounds)
            .map(|i| SeedRound {
                clean_first: i == 0,
                ..SeedRound::new(roots, FanOut::PerRoot(1))
            })
            .collect(),
    }
}

/// Half soft-deleted, half live: `rounds_each` soft-deleted rounds
/// followed by `rounds_each` live rounds.
fn filtered_rounds(rounds_each: usize, roots: u64) -> SeedPlan {
    let mut rounds = Vec::with_capacity(rounds_each * 2);
    for i in 0..rounds_each {
        rounds.push(SeedRound {
            clean_first: i == 0,
            soft_deleted: true,
            ..SeedRound::new(roots, FanOut::None)
        });
    }
    for _ in 0..rounds_each {
        rounds.push(SeedRound {
            clean_first: false,
            ..SeedRound::new(roots, FanOut::None)
        });
    }
    SeedPlan { rounds }
}

impl Catalog {
    /// The builtin experiment set.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        let shapes = [
            Shape::All,
            Shape::Ordered,
            Shape::Live,
            Shape::ChildrenInner,
            Shape::ChildrenLeft,
        ];
        for shape in shapes {
            for scale in [Scale::K100, Scale::M1] {
                let prepare = shape.seed_plan(scale);
                catalog.entries.insert(
                    format!("_{}_raw_{}", shape.number(), scale.suffix()),
                    ExperimentDefinition {
                        runner: Runner::Raw(SqlByEngine::render(|e| shape.sql(e))),
                        prepare: prepare.clone(),
                        cleanup: CleanupSpec::DropSchema,
                    },
                );
                catalog.entries.insert(
                    format!("_{}_method_{}", shape.number(), scale.suffix()),
                    ExperimentDefinition {
                        runner: Runner::Method(shape.method()),
                        prepare,
                        cleanup: CleanupSpec::DropSchema,
                    },
                );
            }
        }
        catalog
    }

    /// Register a definition under a new key.
    ///
    /// # Errors
    ///
    /// Definitions are immutable after registration; re-using a key is a
    /// validation error.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        definition: ExperimentDefinition,
    ) -> Result<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(Error::Validation(format!(
                "experiment key already registered: {key}"
            )));
        }
        self.entries.insert(key, definition);
        Ok(())
    }

    /// Resolve a definition.
    ///
    /// # Errors
    ///
    /// Unknown keys are validation errors.
    pub fn get(&self, key: &str) -> Result<&ExperimentDefinition> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::Validation(format!("experiment config not found by key: {key}")))
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
