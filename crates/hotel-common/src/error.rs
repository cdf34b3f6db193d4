//! Error types for the hotel ETL pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Configuration errors, raised before any I/O happens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(String),

    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Coarse failure category, for callers that branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Database,
    ExternalProcess,
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV file {} has no header row", path.display())]
    EmptyFile { path: PathBuf },

    #[error("CSV file {} is missing column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid value {value:?} for column '{column}' in {} at line {line}", path.display())]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Command `{command}` failed with exit code {}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Transform {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl EtlError {
    /// Wrap an I/O error with a short description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap a CSV error with the file it came from
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Config(_) => ErrorKind::Config,
            EtlError::Io { .. }
            | EtlError::Csv { .. }
            | EtlError::EmptyFile { .. }
            | EtlError::MissingColumn { .. }
            | EtlError::InvalidValue { .. } => ErrorKind::Io,
            EtlError::Database(_) => ErrorKind::Database,
            EtlError::Transform { .. } => ErrorKind::ExternalProcess,
        }
    }

    /// Whether running the same step again could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Config)
    }
}
