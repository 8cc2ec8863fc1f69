use std::time::Duration;

use thiserror::Error;

/// Represents errors that can occur while selecting, configuring and
/// admitting database connections.
///
/// Configuration problems (`UnknownDialect`, `InvalidProfile`,
/// `InvalidOverride`, `UnsupportedDialect`) are fatal at startup: the
/// affected pool is never constructed. `Initialization` is scoped to one
/// physical connection, which the pool discards. `UntaggedConnection` is
/// an invariant violation in the factory wiring itself and closes the
/// affected pool. `AcquireTimeout` is the only failure a caller should
/// expect under normal load.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("unknown dialect: {0}")]
    UnknownDialect(String),
    #[error("invalid profile for {dialect}: {reason}")]
    InvalidProfile { dialect: String, reason: String },
    #[error("invalid override file {path}: {reason}")]
    InvalidOverride { path: String, reason: String },
    #[error("dialect {0} requires a driver not compiled into this build")]
    UnsupportedDialect(String),
    #[error("connection initialization failed: {0}")]
    Initialization(String),
    #[error("connection factory produced an untagged connection")]
    UntaggedConnection,
    #[error("timed out acquiring a connection after {0:?}")]
    AcquireTimeout(Duration),
    #[error("pool for {0} is closed")]
    PoolClosed(String),
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DbError {
    fn from(e: mysql_async::Error) -> Self {
        DbError::Driver(Box::new(e))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::Driver(Box::new(e))
    }
}
