//! Error handling for the sales federation core
//!
//! Every data-layer failure is surfaced to the caller tagged with one of five
//! kinds. Nothing here retries or masks a failure; the outer layer decides how
//! to present it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::shard::Shard;

/// Result alias used across the crate
pub type Result<T, E = DataAccessError> = std::result::Result<T, E>;

/// Coarse classification of a [`DataAccessError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown shard name or missing connection settings
    Configuration,
    /// Pool exhaustion or a failed connection
    Connection,
    /// Malformed SQL, constraint violation, or a write that matched nothing
    Query,
    /// Row shape did not match the selected projection
    Scan,
    /// Inbound payload rejected before any query was issued
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::Query => "query",
            ErrorKind::Scan => "scan",
            ErrorKind::Validation => "validation",
        };
        f.write_str(label)
    }
}

/// Main error type for the federation core
#[derive(Error, Debug)]
pub enum DataAccessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection pool for shard '{shard}' exhausted after {}ms", timeout.as_millis())]
    PoolExhausted { shard: Shard, timeout: Duration },

    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query error: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
}

impl DataAccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::PoolExhausted { .. } | Self::Connection(_) => ErrorKind::Connection,
            Self::Query(_) | Self::NotFound { .. } => ErrorKind::Query,
            Self::Scan(_) => ErrorKind::Scan,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Query(e) if is_unique_violation(e) => 409,
            Self::PoolExhausted { .. } | Self::Connection(_) => 503,
            Self::Configuration(_) | Self::Query(_) | Self::Scan(_) => 500,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn scan(message: impl Into<String>) -> Self {
        Self::Scan(message.into())
    }

    /// Classify a driver error raised while talking to `shard`
    pub(crate) fn on_shard(shard: Shard, timeout: Duration, error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolExhausted { shard, timeout },
            other => Self::from(other),
        }
    }
}

impl From<sqlx::Error> for DataAccessError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => Self::Connection(error),
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => Self::Scan(error.to_string()),
            other => Self::Query(other),
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
