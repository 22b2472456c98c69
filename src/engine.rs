//! Engine and environment enums plus the per-engine dialect table
//!
//! Identifier quoting is data keyed by [`Engine`], not a type hierarchy:
//! double quotes for postgres and oracle, backticks for mysql/mariadb,
//! brackets for mssql. Oracle additionally aliases tables without the
//! `AS` keyword.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The five supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// `PostgreSQL`
    Postgres,
    /// `MySQL`
    Mysql,
    /// Microsoft SQL Server
    Mssql,
    /// Oracle Database
    Oracle,
    /// `MariaDB`
    Mariadb,
}

impl Engine {
    /// All engines, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::Postgres,
        Self::Mysql,
        Self::Mssql,
        Self::Oracle,
        Self::Mariadb,
    ];

    /// The identifier-quoting style of this engine's dialect.
    #[must_use]
    pub const fn quote_style(self) -> QuoteStyle {
        match self {
            Self::Postgres => QuoteStyle {
                open: "\"",
                close: "\"",
                table_alias_sep: " AS ",
            },
            Self::Mysql | Self::Mariadb => QuoteStyle {
                open: "`",
                close: "`",
                table_alias_sep: " AS ",
            },
            Self::Mssql => QuoteStyle {
                open: "[",
                close: "]",
                table_alias_sep: " AS ",
            },
            // Oracle rejects AS on table aliases; the double space is what
            // its ORM-generated SQL historically looked like.
            Self::Oracle => QuoteStyle {
                open: "\"",
                close: "\"",
                table_alias_sep: "  ",
            },
        }
    }

    /// Quote an identifier for this engine's dialect.
    #[must_use]
    pub fn quote(self, ident: &str) -> String {
        let style = self.quote_style();
        format!("{}{}{}", style.open, ident, style.close)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
            Self::Oracle => "oracle",
            Self::Mariadb => "mariadb",
        };
        f.write_str(name)
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "oracle" | "oracledb" => Ok(Self::Oracle),
            "mariadb" => Ok(Self::Mariadb),
            other => Err(Error::Validation(format!("unknown engine: {other}"))),
        }
    }
}

/// Which credential set resolves for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Locally running engine containers
    Local,
    /// Managed remote instances
    Remote,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Orchestration phase a driver call belongs to, used to annotate wrapped
/// driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Opening or re-opening a connection
    Connect,
    /// Seeding the dataset
    Prepare,
    /// A timed (or method-mode) execution
    Execute,
    /// Dropping the dataset schema
    Cleanup,
    /// Persisting the result artifact
    Record,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Prepare => "prepare",
            Self::Execute => "execute",
            Self::Cleanup => "cleanup",
            Self::Record => "record",
        })
    }
}

/// Identifier-quoting data for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteStyle {
    /// Opening quote token
    pub open: &'static str,
    /// Closing quote token
    pub close: &'static str,
    /// Separator between a table and its alias (oracle omits `AS`)
    pub table_alias_sep: &'static str,
}
