//! Dialect-quoted query shapes
//!
//! The catalog supplies pre-quoted literal text per engine; adapters
//! execute it verbatim and never translate between dialects. The shapes
//! here are rendered from the shared column list through the engine's
//! quoting table, so all five dialect variants stay structurally
//! identical.

use crate::engine::Engine;
use crate::model::{CHILD_ALIAS, COLUMNS, TABLE};

/// Self-join flavor for the children query shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Parents that have at least one child
    Inner,
    /// Every parent, children when present
    LeftOuter,
}

impl JoinKind {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

fn column_list(engine: Engine) -> String {
    COLUMNS
        .iter()
        .map(|c| engine.quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn qualified(engine: Engine, alias: &str, column: &str) -> String {
    format!("{}.{}", engine.quote(alias), engine.quote(column))
}

fn aliased_table(engine: Engine, alias: &str) -> String {
    let sep = engine.quote_style().table_alias_sep;
    format!("{}{}{}", engine.quote(TABLE), sep, engine.quote(alias))
}

/// Plain full scan of the backing table.
#[must_use]
pub fn select_all(engine: Engine) -> String {
    format!(
        "SELECT {} FROM {}",
        column_list(engine),
        aliased_table(engine, TABLE)
    )
}

/// Full scan ordered by name.
#[must_use]
pub fn select_ordered(engine: Engine) -> String {
    format!(
        "{} ORDER BY {} ASC",
        select_all(engine),
        qualified(engine, TABLE, "name")
    )
}

/// Full scan excluding soft-deleted rows.
#[must_use]
pub fn select_live(engine: Engine) -> String {
    format!(
        "{} WHERE ({} IS NULL)",
        select_all(engine),
        qualified(engine, TABLE, "deletedAt")
    )
}

/// Self-join pulling each parent's children alongside it.
#[must_use]
pub fn select_with_children(engine: Engine, kind: JoinKind) -> String {
    let mut projection: Vec<String> = COLUMNS
        .iter()
        .map(|c| qualified(engine, TABLE, c))
        .collect();
    for column in COLUMNS {
        projection.push(format!(
            "{} AS {}",
            qualified(engine, CHILD_ALIAS, column),
            engine.quote(&format!("{CHILD_ALIAS}.{column}"))
        ));
    }

    format!(
        "SELECT {} FROM {} {} {} ON {} = {}",
        projection.join(", "),
        aliased_table(engine, TABLE),
        kind.keyword(),
        aliased_table(engine, CHILD_ALIAS),
        qualified(engine, TABLE, "id"),
        qualified(engine, CHILD_ALIAS, "parentId"),
    )
}
