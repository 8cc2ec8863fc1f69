use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::DbError;
use crate::pool::{DialectPool, Pool};
use crate::registry::ProfileRegistry;
use crate::selector::{self, DEFAULT_DIALECTS};

/// Environment variable carrying the dialect descriptor.
pub const DESCRIPTOR_ENV: &str = "DB";

/// Holds one connection pool per active dialect.
///
/// Built once at startup from the descriptor and a profile registry; any
/// configuration error aborts construction before a single pool exists.
/// There is no process-wide singleton: callers own the manager and pass it
/// where it is needed.
pub struct PoolManager {
    pools: DashMap<String, Arc<dyn Pool>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Wires pools for the dialects named by the [`DESCRIPTOR_ENV`]
    /// variable, falling back to [`DEFAULT_DIALECTS`] when it is unset.
    pub fn from_env(registry: &ProfileRegistry) -> Result<Self, DbError> {
        let descriptor = std::env::var(DESCRIPTOR_ENV).unwrap_or_default();
        info!(descriptor = %descriptor, "dialect descriptor");
        Self::from_descriptor(&descriptor, registry)
    }

    /// Selects dialects from `descriptor`, resolves their profiles
    /// (failing fast on unknown tokens) and builds one pool per profile.
    pub fn from_descriptor(
        descriptor: &str,
        registry: &ProfileRegistry,
    ) -> Result<Self, DbError> {
        let selection = selector::select(descriptor, DEFAULT_DIALECTS);
        let profiles = selector::filter_registry(&selection, registry)?;

        let manager = Self::new();
        for profile in profiles {
            let dialect = profile.dialect.clone();
            let pool = DialectPool::new(profile)?;
            manager.pools.insert(dialect, Arc::new(pool));
        }
        Ok(manager)
    }

    /// Registers a pool built outside the descriptor flow.
    pub fn register(&self, pool: impl Pool + 'static) {
        self.pools.insert(pool.dialect().to_string(), Arc::new(pool));
    }

    pub fn pool(&self, dialect: &str) -> Option<Arc<dyn Pool>> {
        self.pools.get(dialect).map(|entry| entry.value().clone())
    }

    pub fn dialects(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Shuts every pool down. In-flight holders keep their connections
    /// until they drop them; new acquisitions fail.
    pub fn close_all(&self) {
        for entry in self.pools.iter() {
            entry.value().close();
        }
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}
