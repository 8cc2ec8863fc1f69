use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use deadpool::Runtime;
use deadpool::managed::{
    Hook, HookError, Object, Pool as ManagedPool, PoolError, QueueMode, Timeouts,
};
use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::factory::{self, ConnectionFactory};
use crate::models::profile::{ConnectionProfile, PoolLimits};
use crate::session::PhysicalConnection;

/// Represents a bounded pool of initialized connections for one dialect.
#[async_trait]
pub trait Pool: Send + Sync {
    fn dialect(&self) -> &str;

    /// Waits for an initialized connection, FIFO relative to other
    /// waiters, bounded by the profile's acquisition timeout.
    async fn acquire(&self) -> Result<PooledConnection, DbError>;

    fn status(&self) -> PoolStatus;

    /// Shuts the pool down; subsequent acquisitions fail with
    /// [`DbError::PoolClosed`].
    fn close(&self);
}

/// A connection on loan from a [`DialectPool`]. Dropping it returns the
/// physical connection to the pool's available set, unblocking the oldest
/// waiter.
pub struct PooledConnection {
    inner: Object<ConnectionFactory>,
}

impl Deref for PooledConnection {
    type Target = PhysicalConnection;

    fn deref(&self) -> &PhysicalConnection {
        &self.inner
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut PhysicalConnection {
        &mut self.inner
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("uid", &self.uid())
            .field("dialect", &self.dialect())
            .finish()
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
}

/// Bounded connection pool for a single dialect, backed by `deadpool`.
///
/// Every physical connection the inner pool creates passes through the
/// admission hook before it becomes acquirable; a hook failure discards
/// the connection. With `limits.max == 1` the pool degrades to mutual
/// exclusion over one connection.
pub struct DialectPool {
    dialect: String,
    limits: PoolLimits,
    pool: ManagedPool<ConnectionFactory>,
}

impl DialectPool {
    pub fn new(profile: ConnectionProfile) -> Result<Self, DbError> {
        profile.validate()?;
        let dialect = profile.dialect.clone();
        let limits = profile.limits;
        let factory = ConnectionFactory::new(profile)?;
        let hook = Hook::async_fn(|conn: &mut PhysicalConnection, _| {
            Box::pin(async move { factory::initialize(conn).await.map_err(HookError::Backend) })
        });
        Self::build(dialect, limits, factory, hook)
    }

    fn build(
        dialect: String,
        limits: PoolLimits,
        factory: ConnectionFactory,
        hook: Hook<ConnectionFactory>,
    ) -> Result<Self, DbError> {
        let timeout = limits.acquire_timeout();
        let pool = ManagedPool::builder(factory)
            .max_size(limits.max as usize)
            .timeouts(Timeouts {
                wait: Some(timeout),
                create: Some(timeout),
                recycle: None,
            })
            .queue_mode(QueueMode::Fifo)
            .runtime(Runtime::Tokio1)
            .post_create(hook)
            .build()
            .map_err(|e| DbError::InvalidProfile {
                dialect: dialect.clone(),
                reason: e.to_string(),
            })?;
        debug!(dialect = %dialect, max = limits.max, "dialect pool ready");
        Ok(Self {
            dialect,
            limits,
            pool,
        })
    }
}

#[async_trait]
impl Pool for DialectPool {
    fn dialect(&self) -> &str {
        &self.dialect
    }

    async fn acquire(&self) -> Result<PooledConnection, DbError> {
        match self.pool.get().await {
            Ok(inner) => Ok(PooledConnection { inner }),
            Err(PoolError::Timeout(_)) => {
                Err(DbError::AcquireTimeout(self.limits.acquire_timeout()))
            }
            Err(PoolError::Closed) => Err(DbError::PoolClosed(self.dialect.clone())),
            Err(PoolError::Backend(e)) => Err(e),
            Err(PoolError::PostCreateHook(hook_err)) => {
                let err = match hook_err {
                    HookError::Backend(e) => e,
                    other => DbError::Initialization(other.to_string()),
                };
                if matches!(err, DbError::UntaggedConnection) {
                    // Broken factory wiring: abort this pool rather than
                    // keep producing untagged connections.
                    error!(dialect = %self.dialect, "identity tag missing, closing pool");
                    self.pool.close();
                } else {
                    warn!(dialect = %self.dialect, error = %err, "connection rejected at admission");
                }
                Err(err)
            }
            Err(other) => Err(DbError::Initialization(other.to_string())),
        }
    }

    fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
        }
    }

    fn close(&self) {
        self.pool.close();
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::models::profile::{ConnectionParams, FileParams};

    fn memory_profile() -> ConnectionProfile {
        ConnectionProfile::new(
            "sqlite3",
            ConnectionParams::File(FileParams {
                filename: ":memory:".to_string(),
            }),
            PoolLimits {
                min: 0,
                max: 1,
                acquire_timeout_ms: 250,
            },
        )
    }

    fn untagged_pool() -> DialectPool {
        let profile = memory_profile();
        let dialect = profile.dialect.clone();
        let limits = profile.limits;
        let factory = ConnectionFactory::untagged(profile).unwrap();
        let hook = Hook::async_fn(|conn: &mut PhysicalConnection, _| {
            Box::pin(async move { factory::initialize(conn).await.map_err(HookError::Backend) })
        });
        DialectPool::build(dialect, limits, factory, hook).unwrap()
    }

    fn rejecting_pool() -> DialectPool {
        let profile = memory_profile();
        let dialect = profile.dialect.clone();
        let limits = profile.limits;
        let factory = ConnectionFactory::new(profile).unwrap();
        let hook = Hook::async_fn(|_: &mut PhysicalConnection, _| {
            Box::pin(async { Err(HookError::Backend(DbError::Initialization("refused".into()))) })
        });
        DialectPool::build(dialect, limits, factory, hook).unwrap()
    }

    #[tokio::test]
    async fn untagged_connection_aborts_the_pool() {
        let pool = untagged_pool();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, DbError::UntaggedConnection));

        // The invariant violation closed the pool; it must not keep
        // serving as if nothing happened.
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, DbError::PoolClosed(_)));
    }

    #[tokio::test]
    async fn rejected_connection_never_reaches_a_caller() {
        let pool = rejecting_pool();
        for _ in 0..2 {
            let err = pool.acquire().await.unwrap_err();
            assert!(matches!(err, DbError::Initialization(_)));
            assert_eq!(pool.status().size, 0, "rejected connection was retained");
        }
    }

    #[tokio::test]
    async fn admitted_connection_is_returned_on_drop() {
        let profile = memory_profile();
        let pool = DialectPool::new(profile).unwrap();
        let status_before = pool.status();
        assert_eq!(status_before.size, 0);

        let conn = pool.acquire().await.unwrap();
        assert!(conn.uid().is_some());
        drop(conn);

        assert_eq!(pool.status().size, 1);
        assert_eq!(pool.status().available, 1);
    }

    #[test]
    fn mysql_family_dialect_with_file_params_never_builds_a_pool() {
        // Admission for a mysql-family dialect issues its setup statement
        // through the mysql driver; file params could only produce a
        // session that skips it.
        let profile = ConnectionProfile::new(
            "mysql2",
            ConnectionParams::File(FileParams {
                filename: ":memory:".to_string(),
            }),
            PoolLimits {
                min: 0,
                max: 1,
                acquire_timeout_ms: 250,
            },
        );
        let err = DialectPool::new(profile).map(|_| ()).unwrap_err();
        assert!(matches!(err, DbError::InvalidProfile { .. }));
    }

    #[test]
    fn unsupported_params_fail_at_construction() {
        if cfg!(feature = "mysql") {
            return;
        }
        let profile = ConnectionProfile::new(
            "mysql",
            ConnectionParams::Server(crate::models::profile::ServerParams {
                host: "localhost".into(),
                port: 23306,
                database: "knex_test".into(),
                user: "testuser".into(),
                password: "testpassword".into(),
                charset: "utf8".into(),
            }),
            PoolLimits::default(),
        );
        let err = DialectPool::new(profile).map(|_| ()).unwrap_err();
        assert!(matches!(err, DbError::UnsupportedDialect(_)));
    }
}
