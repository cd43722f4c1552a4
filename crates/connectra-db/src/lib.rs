//! # connectra-db
//!
//! PostgreSQL relational store for the connectra data platform: one
//! repository struct per table, aggregated behind a single [`Database`]
//! handle that owns the connection pool.

pub mod companies;
pub mod contacts;
pub mod filters;
pub mod jobs;
pub mod object_store;
pub mod pool;

pub use companies::PgCompanyRepository;
pub use contacts::PgContactRepository;
pub use filters::PgFilterRepository;
pub use jobs::PgJobRepository;
pub use object_store::FilesystemObjectStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

use connectra_core::Result;
use sqlx::PgPool;

/// Aggregates the relational repositories behind a single connection pool.
pub struct Database {
    pool: PgPool,
    pub companies: PgCompanyRepository,
    pub contacts: PgContactRepository,
    pub jobs: PgJobRepository,
    pub filters: PgFilterRepository,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self {
            companies: PgCompanyRepository::new(pool.clone()),
            contacts: PgContactRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            filters: PgFilterRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
