use crate::models::dialect::DialectFamily;

/// The driver handle behind a physical connection.
pub(crate) enum Driver {
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Connection),
    #[cfg(feature = "mysql")]
    Mysql(mysql_async::Conn),
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            Driver::Sqlite(_) => f.write_str("Driver::Sqlite"),
            #[cfg(feature = "mysql")]
            Driver::Mysql(_) => f.write_str("Driver::Mysql"),
            #[allow(unreachable_patterns)]
            _ => f.write_str("Driver"),
        }
    }
}

/// A live database session owned by the pool that created it until
/// acquired, then by the acquirer until released.
///
/// Every connection the factory hands out carries a creation-time identity
/// tag, unique among all connections created in this process. The
/// admission hook verifies the tag before any dialect-specific setup runs;
/// a missing tag means the factory wiring is broken.
#[derive(Debug)]
pub struct PhysicalConnection {
    uid: Option<u64>,
    dialect: String,
    family: DialectFamily,
    driver: Driver,
}

impl PhysicalConnection {
    pub(crate) fn new(uid: Option<u64>, dialect: String, driver: Driver) -> Self {
        let family = DialectFamily::of(&dialect);
        Self {
            uid,
            dialect,
            family,
            driver,
        }
    }

    /// Creation-time identity tag. `None` only when the factory wiring is
    /// misconfigured; the admission hook treats that as fatal.
    pub fn uid(&self) -> Option<u64> {
        self.uid
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn family(&self) -> DialectFamily {
        self.family
    }

    /// Underlying sqlite handle, when this session belongs to an embedded
    /// dialect.
    #[cfg(feature = "sqlite")]
    pub fn sqlite(&self) -> Option<&rusqlite::Connection> {
        match &self.driver {
            Driver::Sqlite(conn) => Some(conn),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Underlying mysql handle. Mutable because the driver issues queries
    /// through `&mut Conn`.
    #[cfg(feature = "mysql")]
    pub fn mysql_mut(&mut self) -> Option<&mut mysql_async::Conn> {
        match &mut self.driver {
            Driver::Mysql(conn) => Some(conn),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    pub(crate) fn driver_mut(&mut self) -> &mut Driver {
        &mut self.driver
    }
}
