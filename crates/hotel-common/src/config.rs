//! Configuration management
//!
//! Every setting is read once at startup into plain structs that are passed
//! explicitly to the loaders, the trigger and the coordinator. Values come
//! from a lookup function so tests can inject credentials without touching
//! the process environment; [`env_lookup`] is the production source.

use crate::error::ConfigError;
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default PostgreSQL port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default bookings file, relative to the working directory.
pub const DEFAULT_CSV_FILE_PATH: &str = "hotel_dwh/hotel_bookings.csv";

/// Default transformation binary.
pub const DEFAULT_DBT_BIN: &str = "dbt";

/// Default number of retries per pipeline step.
pub const DEFAULT_PIPELINE_RETRIES: u32 = 1;

/// Default delay between step attempts in seconds (5 minutes).
pub const DEFAULT_PIPELINE_RETRY_DELAY_SECS: u64 = 300;

/// `.env` locations tried when no explicit file is given.
pub const DEFAULT_ENV_FILES: &[&str] = &[".env", "hotel_dwh/.env"];

/// Reads `.env` variables into the process environment.
///
/// An explicit path must exist; otherwise the first default location found is
/// used and a missing file is not an error. Variables already set in the
/// environment are never overridden.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        dotenvy::from_path(path).map_err(|e| ConfigError::Invalid {
            name: "--env-file".to_string(),
            value: path.display().to_string(),
            reason: e.to_string(),
        })?;
        return Ok(Some(path.to_path_buf()));
    }

    for candidate in DEFAULT_ENV_FILES {
        let candidate = Path::new(candidate);
        if candidate.is_file() && dotenvy::from_path(candidate).is_ok() {
            return Ok(Some(candidate.to_path_buf()));
        }
    }

    Ok(None)
}

/// Lookup backed by the process environment
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name.to_string())),
    }
}

fn parsed_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })
        },
        _ => Ok(default),
    }
}

/// Database connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// Read `DB_HOST`, `DB_USER`, `DB_PASS`, `DB_NAME` (required) and
    /// `DB_PORT`, `DB_CONNECT_TIMEOUT` (optional)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: required(&lookup, "DB_HOST")?,
            user: required(&lookup, "DB_USER")?,
            password: required(&lookup, "DB_PASS")?,
            database: required(&lookup, "DB_NAME")?,
            port: parsed_or(&lookup, "DB_PORT", DEFAULT_DB_PORT)?,
            connect_timeout_secs: parsed_or(
                &lookup,
                "DB_CONNECT_TIMEOUT",
                DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            )?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Settings for the external transformation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Binary to run, `dbt` unless overridden
    pub program: String,
    /// dbt project directory, used as the working directory
    pub project_dir: PathBuf,
    /// Selector for the load stage; `None` rebuilds every model
    pub load_select: Option<String>,
    /// Selector for the transform stage; `None` rebuilds every model
    pub transform_select: Option<String>,
}

impl TransformConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_dir = PathBuf::from(required(&lookup, "DBT_PROJECT_PATH")?);
        let program = lookup("DBT_BIN")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DBT_BIN.to_string());

        // Unset or blank means "no --select".
        let selector = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            program,
            project_dir,
            load_select: selector("DBT_LOAD_SELECT"),
            transform_select: selector("DBT_TRANSFORM_SELECT"),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}

/// Retry policy applied to every pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_PIPELINE_RETRIES,
            delay: Duration::from_secs(DEFAULT_PIPELINE_RETRY_DELAY_SECS),
        }
    }
}

impl RetryConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            retries: parsed_or(&lookup, "PIPELINE_RETRIES", DEFAULT_PIPELINE_RETRIES)?,
            delay: Duration::from_secs(parsed_or(
                &lookup,
                "PIPELINE_RETRY_DELAY_SECS",
                DEFAULT_PIPELINE_RETRY_DELAY_SECS,
            )?),
        })
    }

    /// Total attempts per step, first run included
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Location of the bookings file; `required` demands `CSV_FILE_PATH`
pub fn csv_path_from_lookup<F>(lookup: F, required_var: bool) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if required_var {
        return required(&lookup, "CSV_FILE_PATH").map(PathBuf::from);
    }
    Ok(lookup("CSV_FILE_PATH")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_FILE_PATH)))
}

/// Full configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub csv_path: PathBuf,
    pub transform: TransformConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            csv_path: csv_path_from_lookup(&lookup, false)?,
            transform: TransformConfig::from_lookup(&lookup)?,
            retry: RetryConfig::from_lookup(&lookup)?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}
