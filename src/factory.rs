use std::sync::atomic::{AtomicU64, Ordering};

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};
use tracing::{debug, error};

#[cfg(feature = "mysql")]
use mysql_async::prelude::Queryable;

use crate::error::DbError;
use crate::models::dialect::DialectFamily;
use crate::models::profile::{ConnectionParams, ConnectionProfile};
use crate::session::{Driver, PhysicalConnection};

/// Identity tags are unique across every pool in the process, so a tag
/// seen twice among live connections is impossible by construction.
static NEXT_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// True when the driver for these params is compiled into this build.
pub(crate) fn driver_supported(params: &ConnectionParams) -> bool {
    match params {
        ConnectionParams::File(_) => cfg!(feature = "sqlite"),
        ConnectionParams::Server(_) => cfg!(feature = "mysql"),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(params: &crate::models::profile::FileParams) -> Result<Driver, DbError> {
    let conn = rusqlite::Connection::open(&params.filename)?;
    Ok(Driver::Sqlite(conn))
}

#[cfg(feature = "mysql")]
async fn open_mysql(params: &crate::models::profile::ServerParams) -> Result<Driver, DbError> {
    let opts = mysql_async::OptsBuilder::default()
        .ip_or_hostname(params.host.clone())
        .tcp_port(params.port)
        .db_name(Some(params.database.clone()))
        .user(Some(params.user.clone()))
        .pass(Some(params.password.clone()))
        .init(vec![format!("SET NAMES {}", params.charset)]);
    let conn = mysql_async::Conn::new(opts).await?;
    Ok(Driver::Mysql(conn))
}

/// Creates physical connections for one profile and stamps each with its
/// identity tag. The pool drives this through `deadpool`'s managed API;
/// the admission hook ([`initialize`]) runs as the pool's post-create
/// step before a connection becomes acquirable.
pub(crate) struct ConnectionFactory {
    profile: ConnectionProfile,
    tagging: bool,
}

impl ConnectionFactory {
    pub(crate) fn new(profile: ConnectionProfile) -> Result<Self, DbError> {
        if !driver_supported(&profile.params) {
            return Err(DbError::UnsupportedDialect(profile.dialect.clone()));
        }
        Ok(Self {
            profile,
            tagging: true,
        })
    }

    /// Factory that skips identity tagging, simulating broken wiring.
    #[cfg(test)]
    pub(crate) fn untagged(profile: ConnectionProfile) -> Result<Self, DbError> {
        let mut factory = Self::new(profile)?;
        factory.tagging = false;
        Ok(factory)
    }
}

impl Manager for ConnectionFactory {
    type Type = PhysicalConnection;
    type Error = DbError;

    async fn create(&self) -> Result<PhysicalConnection, DbError> {
        let driver = match &self.profile.params {
            #[cfg(feature = "sqlite")]
            ConnectionParams::File(f) => open_sqlite(f)?,
            #[cfg(feature = "mysql")]
            ConnectionParams::Server(s) => open_mysql(s).await?,
            #[allow(unreachable_patterns)]
            _ => return Err(DbError::UnsupportedDialect(self.profile.dialect.clone())),
        };
        let uid = self.tagging.then(next_uid);
        debug!(uid = ?uid, dialect = %self.profile.dialect, "physical connection created");
        Ok(PhysicalConnection::new(
            uid,
            self.profile.dialect.clone(),
            driver,
        ))
    }

    async fn recycle(
        &self,
        conn: &mut PhysicalConnection,
        _metrics: &Metrics,
    ) -> RecycleResult<DbError> {
        match conn.driver_mut() {
            #[cfg(feature = "mysql")]
            Driver::Mysql(c) => c
                .ping()
                .await
                .map_err(|e| RecycleError::Backend(e.into())),
            #[allow(unreachable_patterns)]
            _ => Ok(()),
        }
    }
}

/// Brings a freshly created connection into its dialect's required state.
///
/// Runs exactly once per physical connection, before the pool makes it
/// acquirable. The identity check comes first for every family; its
/// failure is an invariant violation, kept apart from ordinary
/// initialization failures. The setup statements mutate session state on
/// that one connection only.
pub(crate) async fn initialize(conn: &mut PhysicalConnection) -> Result<(), DbError> {
    let Some(uid) = conn.uid() else {
        error!(
            dialect = conn.dialect(),
            "connection reached admission without an identity tag"
        );
        return Err(DbError::UntaggedConnection);
    };
    match conn.family() {
        #[cfg(feature = "sqlite")]
        DialectFamily::Sqlite => {
            let Some(c) = conn.sqlite() else {
                return Err(DbError::Initialization(
                    "sqlite-family session has no sqlite driver".to_string(),
                ));
            };
            c.execute_batch("PRAGMA foreign_keys = ON")
                .map_err(|e| DbError::Initialization(e.to_string()))?;
        }
        #[cfg(feature = "mysql")]
        DialectFamily::Mysql => {
            let Some(c) = conn.mysql_mut() else {
                return Err(DbError::Initialization(
                    "mysql-family session has no mysql driver".to_string(),
                ));
            };
            c.query_drop("SET sql_mode='TRADITIONAL'")
                .await
                .map_err(|e| DbError::Initialization(e.to_string()))?;
        }
        _ => {}
    }
    debug!(uid, dialect = conn.dialect(), "connection admitted");
    Ok(())
}
