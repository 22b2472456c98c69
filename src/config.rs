//! Connection credentials and their providers
//!
//! The core never reads configuration directly; it asks a
//! [`CredentialsProvider`] for per-engine, per-environment connection
//! parameters. [`EnvCredentials`] is the default provider, backed by
//! environment variables (with `.env` support), matching the variable
//! layout the harness has always been driven by. Embedders with their own
//! configuration systems implement the trait instead.

use std::collections::HashMap;
use std::env;

use crate::engine::{Engine, Environment};
use crate::error::{Error, Result};

/// Connection parameters for one engine in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// User name
    pub user: String,
    /// Password
    pub password: String,
    /// Database (schema) name
    pub database: String,
    /// Oracle service name; `None` for other engines
    pub service: Option<String>,
}

/// Resolves connection parameters for a run.
pub trait CredentialsProvider: Send + Sync {
    /// Parameters for `engine` in `environment`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the configuration is incomplete.
    fn connection(&self, engine: Engine, environment: Environment) -> Result<ConnectionParams>;
}

/// Environment-variable provider.
///
/// Variables are prefixed per engine (`DB`, `MY_SQL_DB`, `MS_SQL_DB`,
/// `ORACLE_DB`, `MARIA_DB`) with `_HOST`, `_PORT`, `_USERNAME`,
/// `_PASSWORD`, `_NAME` suffixes; remote credentials append `_REMOTE`.
/// The Oracle service name comes from `ORACLE_DB_SERVICE[_REMOTE]` and
/// defaults to `XE` locally and `ORCL` remotely.
#[derive(Debug, Default)]
pub struct EnvCredentials {
    _private: (),
}

impl EnvCredentials {
    /// Create the provider, loading a `.env` file when one is present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self { _private: () }
    }

    const fn prefix(engine: Engine) -> &'static str {
        match engine {
            Engine::Postgres => "DB",
            Engine::Mysql => "MY_SQL_DB",
            Engine::Mssql => "MS_SQL_DB",
            Engine::Oracle => "ORACLE_DB",
            Engine::Mariadb => "MARIA_DB",
        }
    }

    fn var(prefix: &str, field: &str, environment: Environment) -> Result<String> {
        let name = match environment {
            Environment::Local => format!("{prefix}_{field}"),
            Environment::Remote => format!("{prefix}_{field}_REMOTE"),
        };
        env::var(&name)
            .map_err(|_| Error::Validation(format!("missing environment variable {name}")))
    }
}

impl CredentialsProvider for EnvCredentials {
    fn connection(&self, engine: Engine, environment: Environment) -> Result<ConnectionParams> {
        let prefix = Self::prefix(engine);
        let port_text = Self::var(prefix, "PORT", environment)?;
        let port: u16 = port_text.parse().map_err(|_| {
            Error::Validation(format!("{prefix}_PORT is not a valid port: {port_text}"))
        })?;

        let service = if engine == Engine::Oracle {
            let default = match environment {
                Environment::Local => "XE",
                Environment::Remote => "ORCL",
            };
            Some(Self::var(prefix, "SERVICE", environment).unwrap_or_else(|_| default.to_string()))
        } else {
            None
        };

        Ok(ConnectionParams {
            host: Self::var(prefix, "HOST", environment)?,
            port,
            user: Self::var(prefix, "USERNAME", environment)?,
            password: Self::var(prefix, "PASSWORD", environment)?,
            database: Self::var(prefix, "NAME", environment)?,
            service,
        })
    }
}

/// Fixed in-memory provider, mainly for tests and one-off scripts.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    entries: HashMap<(Engine, Environment), ConnectionParams>,
}

impl StaticCredentials {
    /// Empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register parameters for one (engine, environment) pair.
    #[must_use]
    pub fn with(mut self, engine: Engine, environment: Environment, params: ConnectionParams) -> Self {
        self.entries.insert((engine, environment), params);
        self
    }
}

impl CredentialsProvider for StaticCredentials {
    fn connection(&self, engine: Engine, environment: Environment) -> Result<ConnectionParams> {
        self.entries
            .get(&(engine, environment))
            .cloned()
            .ok_or_else(|| {
                Error::Validation(format!("no credentials configured for {engine} ({environment})"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "localhost".to_string(),
            port: 5432,
            user: "bench".to_string(),
            password: "bench".to_string(),
            database: "bench".to_string(),
            service: None,
        }
    }

    #[test]
    fn static_provider_resolves_registered_pair() {
        let provider =
            StaticCredentials::new().with(Engine::Postgres, Environment::Local, params());
        assert!(provider
            .connection(Engine::Postgres, Environment::Local)
            .is_ok());
        assert!(provider
            .connection(Engine::Postgres, Environment::Remote)
            .is_err());
    }

    #[test]
    fn env_provider_reports_missing_variables() {
        // Deliberately unset prefix set: mariadb remote.
        std::env::remove_var("MARIA_DB_PORT_REMOTE");
        let provider = EnvCredentials::default();
        let err = provider
            .connection(Engine::Mariadb, Environment::Remote)
            .unwrap_err();
        assert!(format!("{err}").contains("MARIA_DB_PORT_REMOTE"));
    }
}
