//! Literal SQL rendering for seeding and cleanup
//!
//! Bulk inserts are rendered as chunked multi-row statements in each
//! engine's dialect (Oracle gets `INSERT ALL`); drops bracket the
//! statement with foreign-key-check toggles where the engine cannot
//! cascade.

use chrono::{DateTime, Utc};

use crate::engine::Engine;
use crate::model::{COLUMNS, TABLE};
use crate::seed::plan::PlannedRow;

/// Rows per rendered INSERT statement. Kept beneath mssql's 1000-row
/// VALUES limit and Oracle's expression budget.
pub const DEFAULT_CHUNK_ROWS: usize = 500;

/// Migration-bookkeeping table dropped alongside the dataset.
pub const BOOKKEEPING_TABLE: &str = "SchemaMigrations";

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn timestamp_literal(engine: Engine, at: DateTime<Utc>) -> String {
    let rendered = at.format("%Y-%m-%d %H:%M:%S").to_string();
    match engine {
        Engine::Oracle => format!("TO_TIMESTAMP('{rendered}', 'YYYY-MM-DD HH24:MI:SS')"),
        _ => format!("'{rendered}'"),
    }
}

fn nullable_string(value: Option<&str>) -> String {
    value.map_or_else(|| "NULL".to_string(), string_literal)
}

fn nullable_timestamp(engine: Engine, at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "NULL".to_string(), |at| timestamp_literal(engine, at))
}

fn values_tuple(engine: Engine, row: &PlannedRow) -> String {
    format!(
        "({}, {}, {}, {}, {}, {}, {})",
        string_literal(&row.id),
        string_literal(&row.name),
        string_literal(&row.external_id),
        nullable_string(row.parent_id.as_deref()),
        timestamp_literal(engine, row.created_at),
        timestamp_literal(engine, row.updated_at),
        nullable_timestamp(engine, row.deleted_at),
    )
}

fn column_list(engine: Engine) -> String {
    COLUMNS
        .iter()
        .map(|c| engine.quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn multi_row_insert(engine: Engine, rows: &[PlannedRow]) -> String {
    let tuples: Vec<String> = rows.iter().map(|r| values_tuple(engine, r)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        engine.quote(TABLE),
        column_list(engine),
        tuples.join(", ")
    )
}

fn oracle_insert_all(rows: &[PlannedRow]) -> String {
    let engine = Engine::Oracle;
    let into_clauses: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "INTO {} ({}) VALUES {}",
                engine.quote(TABLE),
                column_list(engine),
                values_tuple(engine, r)
            )
        })
        .collect();
    format!("INSERT ALL {} SELECT 1 FROM DUAL", into_clauses.join(" "))
}

/// Render the chunked bulk-insert statements for one homogeneous depth
/// batch.
#[must_use]
pub fn insert_statements(engine: Engine, rows: &[PlannedRow], chunk_rows: usize) -> Vec<String> {
    let chunk_rows = chunk_rows.max(1);
    rows.chunks(chunk_rows)
        .map(|chunk| match engine {
            Engine::Oracle => oracle_insert_all(chunk),
            _ => multi_row_insert(engine, chunk),
        })
        .collect()
}

/// Statements recreating the backing table directly, used when no
/// external migration command is configured. Identifier case is
/// preserved through quoting; the parent reference is a real foreign
/// key, which is why drops on mysql/mariadb must toggle FK checks.
#[must_use]
pub fn create_table_statements(engine: Engine) -> Vec<String> {
    let q = |ident: &str| engine.quote(ident);
    let (timestamp, needs_guard) = match engine {
        Engine::Postgres => ("TIMESTAMPTZ", false),
        Engine::Mysql | Engine::Mariadb => ("DATETIME(6)", false),
        Engine::Mssql => ("DATETIME2", true),
        Engine::Oracle => ("TIMESTAMP", true),
    };
    let exists_clause = if needs_guard { "" } else { "IF NOT EXISTS " };

    vec![format!(
        "CREATE TABLE {exists_clause}{table} ({id} VARCHAR(64) NOT NULL PRIMARY KEY, \
         {name} VARCHAR(255) NOT NULL, {external} VARCHAR(255), \
         {parent} VARCHAR(64) REFERENCES {table} ({id}), \
         {created} {timestamp}, {updated} {timestamp}, {deleted} {timestamp})",
        table = q(TABLE),
        id = q("id"),
        name = q("name"),
        external = q("externalId"),
        parent = q("parentId"),
        created = q("createdAt"),
        updated = q("updatedAt"),
        deleted = q("deletedAt"),
    )]
}

/// Statements dropping the dataset table and the migration-bookkeeping
/// table, in each engine's idiom. For mysql/mariadb the drop is bracketed
/// by foreign-key-check toggles; Oracle has no `IF EXISTS`, its absent-
/// object error is pattern-matched by the caller instead.
#[must_use]
pub fn drop_statements(engine: Engine) -> Vec<String> {
    let mut statements = Vec::new();
    for table in [TABLE, BOOKKEEPING_TABLE] {
        match engine {
            Engine::Postgres => {
                statements.push(format!("DROP TABLE IF EXISTS \"{table}\" CASCADE;"));
            }
            Engine::Mysql | Engine::Mariadb => {
                statements.push("SET FOREIGN_KEY_CHECKS = 0".to_string());
                statements.push(format!("DROP TABLE IF EXISTS {table};"));
                statements.push("SET FOREIGN_KEY_CHECKS = 1".to_string());
            }
            Engine::Mssql => {
                statements.push(format!("DROP TABLE IF EXISTS \"{table}\";"));
            }
            Engine::Oracle => {
                statements.push(format!("DROP TABLE \"{table}\" CASCADE CONSTRAINTS"));
            }
        }
    }
    statements
}
