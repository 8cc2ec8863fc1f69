pub mod error;
pub(crate) mod factory;
pub mod models;
pub mod pool;
pub mod pool_manager;
pub mod registry;
pub mod selector;
pub mod session;

pub use error::DbError;
pub use models::dialect::DialectFamily;
pub use models::profile::{ConnectionParams, ConnectionProfile, FileParams, PoolLimits, ServerParams};
pub use pool::{DialectPool, Pool, PoolStatus, PooledConnection};
pub use pool_manager::PoolManager;
pub use registry::{Overrides, ProfileRegistry};
pub use session::PhysicalConnection;
