use std::time::Duration;

use serde::Deserialize;

use crate::error::DbError;
use crate::models::dialect::DialectFamily;

fn default_charset() -> String {
    "utf8".to_string()
}

/// Dialect-specific connection parameters, opaque to the pool.
#[derive(Debug, Clone)]
pub enum ConnectionParams {
    Server(ServerParams),
    File(FileParams),
}

/// Host/port/credentials for server-based dialects.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

/// Database file path for embedded dialects. `:memory:` is passed through
/// to the driver untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct FileParams {
    pub filename: String,
}

/// Bounds on live physical connections and acquisition wait.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PoolLimits {
    pub min: u32,
    pub max: u32,
    pub acquire_timeout_ms: u64,
}

impl PoolLimits {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            min: 2,
            max: 10,
            acquire_timeout_ms: 60_000,
        }
    }
}

/// Full connection configuration for one dialect.
///
/// Constructed once at process start (builtin defaults, optionally merged
/// with an override file) and immutable thereafter. The migration/seed
/// directories are opaque path strings handed to the external runner.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub dialect: String,
    pub params: ConnectionParams,
    pub limits: PoolLimits,
    pub migrations_dir: String,
    pub seeds_dir: String,
}

impl ConnectionProfile {
    pub fn new(dialect: impl Into<String>, params: ConnectionParams, limits: PoolLimits) -> Self {
        Self {
            dialect: dialect.into(),
            params,
            limits,
            migrations_dir: "migrations".to_string(),
            seeds_dir: "seeds".to_string(),
        }
    }

    pub fn family(&self) -> DialectFamily {
        DialectFamily::of(&self.dialect)
    }

    /// Checks the profile invariants: `max >= min` and a positive
    /// acquisition timeout.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.limits.max < self.limits.min {
            return Err(DbError::InvalidProfile {
                dialect: self.dialect.clone(),
                reason: format!(
                    "pool max ({}) must be >= min ({})",
                    self.limits.max, self.limits.min
                ),
            });
        }
        if self.limits.acquire_timeout_ms == 0 {
            return Err(DbError::InvalidProfile {
                dialect: self.dialect.clone(),
                reason: "acquire_timeout_ms must be positive".to_string(),
            });
        }
        // A family's setup statement runs against its own driver; params
        // for the other driver could only be admitted with no setup at all.
        match (self.family(), &self.params) {
            (DialectFamily::Sqlite, ConnectionParams::Server(_)) => Err(DbError::InvalidProfile {
                dialect: self.dialect.clone(),
                reason: "sqlite-family dialects take file params".to_string(),
            }),
            (DialectFamily::Mysql, ConnectionParams::File(_)) => Err(DbError::InvalidProfile {
                dialect: self.dialect.clone(),
                reason: "mysql-family dialects take server params".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(min: u32, max: u32, timeout_ms: u64) -> ConnectionProfile {
        ConnectionProfile::new(
            "sqlite3",
            ConnectionParams::File(FileParams {
                filename: ":memory:".to_string(),
            }),
            PoolLimits {
                min,
                max,
                acquire_timeout_ms: timeout_ms,
            },
        )
    }

    #[test]
    fn valid_limits_pass() {
        assert!(profile(0, 1, 1000).validate().is_ok());
        assert!(profile(2, 10, 60_000).validate().is_ok());
    }

    #[test]
    fn max_below_min_is_rejected() {
        let err = profile(5, 1, 1000).validate().unwrap_err();
        assert!(matches!(err, DbError::InvalidProfile { .. }));
    }

    #[test]
    fn zero_acquire_timeout_is_rejected() {
        let err = profile(0, 1, 0).validate().unwrap_err();
        assert!(matches!(err, DbError::InvalidProfile { .. }));
    }

    #[test]
    fn family_and_params_must_agree() {
        let mysql_with_file = ConnectionProfile::new(
            "mysql2",
            ConnectionParams::File(FileParams {
                filename: ":memory:".to_string(),
            }),
            PoolLimits::default(),
        );
        let err = mysql_with_file.validate().unwrap_err();
        assert!(matches!(err, DbError::InvalidProfile { .. }));

        let sqlite_with_server = ConnectionProfile::new(
            "sqlite3",
            ConnectionParams::Server(ServerParams {
                host: "localhost".to_string(),
                port: 23306,
                database: "knex_test".to_string(),
                user: "testuser".to_string(),
                password: "testpassword".to_string(),
                charset: "utf8".to_string(),
            }),
            PoolLimits {
                min: 0,
                max: 1,
                acquire_timeout_ms: 1_000,
            },
        );
        let err = sqlite_with_server.validate().unwrap_err();
        assert!(matches!(err, DbError::InvalidProfile { .. }));
    }

    #[test]
    fn server_params_deserialize_with_default_charset() {
        let params: ServerParams = serde_json::from_str(
            r#"{"host":"localhost","port":23306,"database":"knex_test","user":"testuser","password":"testpassword"}"#,
        )
        .unwrap();
        assert_eq!(params.charset, "utf8");
    }
}
