use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::DbError;
use crate::models::profile::{
    ConnectionParams, ConnectionProfile, FileParams, PoolLimits, ServerParams,
};

/// Environment variable naming a JSON file with connection-param overrides.
pub const OVERRIDES_ENV: &str = "DB_CONFIG";

/// Per-family connection-param overrides, usually loaded from the file
/// named by [`OVERRIDES_ENV`].
///
/// As in the built-in defaults, a `mysql` override applies to both the
/// `mysql` and `mysql2` dialects, and a `sqlite3` override to both
/// `sqlite3` and `better-sqlite3`.
#[derive(Debug, Default, Deserialize)]
pub struct Overrides {
    pub mysql: Option<ServerParams>,
    pub sqlite3: Option<FileParams>,
}

impl Overrides {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DbError::InvalidOverride {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| DbError::InvalidOverride {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Immutable mapping from dialect identifier to its connection profile.
///
/// Populated once at process start; concurrent reads are safe without
/// locking. There is deliberately no global singleton: callers construct a
/// registry and pass it to the selection/wiring layer.
#[derive(Debug)]
pub struct ProfileRegistry {
    profiles: HashMap<String, ConnectionProfile>,
}

impl ProfileRegistry {
    /// Built-in defaults for the four known dialects.
    pub fn builtin() -> Self {
        Self::with_overrides(Overrides::default())
    }

    /// Built-in defaults merged with per-family param overrides.
    pub fn with_overrides(overrides: Overrides) -> Self {
        let mysql_params = overrides.mysql.unwrap_or(ServerParams {
            host: "localhost".to_string(),
            port: 23306,
            database: "knex_test".to_string(),
            user: "testuser".to_string(),
            password: "testpassword".to_string(),
            charset: "utf8".to_string(),
        });
        let sqlite_params = overrides.sqlite3.unwrap_or(FileParams {
            filename: "test.sqlite3".to_string(),
        });

        let sqlite_limits = PoolLimits {
            min: 0,
            max: 1,
            acquire_timeout_ms: 1_000,
        };

        let mut profiles = HashMap::new();
        for dialect in ["mysql", "mysql2"] {
            profiles.insert(
                dialect.to_string(),
                ConnectionProfile::new(
                    dialect,
                    ConnectionParams::Server(mysql_params.clone()),
                    PoolLimits::default(),
                ),
            );
        }
        for dialect in ["sqlite3", "better-sqlite3"] {
            profiles.insert(
                dialect.to_string(),
                ConnectionProfile::new(
                    dialect,
                    ConnectionParams::File(sqlite_params.clone()),
                    sqlite_limits,
                ),
            );
        }
        debug!(dialects = profiles.len(), "profile registry built");
        Self { profiles }
    }

    /// Builds the registry, honoring the [`OVERRIDES_ENV`] variable when it
    /// names an override file. A set-but-unreadable or malformed file is a
    /// configuration error, not a silent fallback.
    pub fn from_env() -> Result<Self, DbError> {
        match std::env::var(OVERRIDES_ENV) {
            Ok(path) if !path.is_empty() => {
                info!(%path, "loading connection overrides");
                Ok(Self::with_overrides(Overrides::from_file(&path)?))
            }
            _ => Ok(Self::builtin()),
        }
    }

    pub fn lookup(&self, dialect: &str) -> Result<&ConnectionProfile, DbError> {
        self.profiles
            .get(dialect)
            .ok_or_else(|| DbError::UnknownDialect(dialect.to_string()))
    }

    pub fn contains(&self, dialect: &str) -> bool {
        self.profiles.contains_key(dialect)
    }

    pub fn dialects(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_registry_knows_all_four_dialects() {
        let registry = ProfileRegistry::builtin();
        for dialect in ["mysql", "mysql2", "sqlite3", "better-sqlite3"] {
            let profile = registry.lookup(dialect).unwrap();
            assert_eq!(profile.dialect, dialect);
            profile.validate().unwrap();
        }
    }

    #[test]
    fn lookup_of_unregistered_dialect_is_an_error() {
        let registry = ProfileRegistry::builtin();
        let err = registry.lookup("oracledb").unwrap_err();
        assert!(matches!(err, DbError::UnknownDialect(d) if d == "oracledb"));
    }

    #[test]
    fn sqlite_profiles_default_to_a_single_connection() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.lookup("sqlite3").unwrap();
        assert_eq!(profile.limits.max, 1);
        assert_eq!(profile.limits.acquire_timeout_ms, 1_000);
    }

    #[test]
    fn overrides_replace_params_but_not_limits() {
        let overrides: Overrides = serde_json::from_str(
            r#"{"sqlite3": {"filename": "/tmp/other.sqlite3"},
                "mysql": {"host": "db.internal", "port": 3306,
                          "database": "app", "user": "app", "password": "s3cret"}}"#,
        )
        .unwrap();
        let registry = ProfileRegistry::with_overrides(overrides);

        // The mysql override fans out to both mysql-family dialects.
        for dialect in ["mysql", "mysql2"] {
            let profile = registry.lookup(dialect).unwrap();
            match &profile.params {
                ConnectionParams::Server(s) => {
                    assert_eq!(s.host, "db.internal");
                    assert_eq!(s.port, 3306);
                }
                other => panic!("expected server params, got {other:?}"),
            }
            assert_eq!(profile.limits.max, PoolLimits::default().max);
        }
        for dialect in ["sqlite3", "better-sqlite3"] {
            let profile = registry.lookup(dialect).unwrap();
            match &profile.params {
                ConnectionParams::File(f) => assert_eq!(f.filename, "/tmp/other.sqlite3"),
                other => panic!("expected file params, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_override_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();
        let err = Overrides::from_file(file.path()).unwrap_err();
        assert!(matches!(err, DbError::InvalidOverride { .. }));
    }

    #[test]
    fn missing_override_file_is_a_configuration_error() {
        let err = Overrides::from_file("/nonexistent/overrides.json").unwrap_err();
        assert!(matches!(err, DbError::InvalidOverride { .. }));
    }
}
