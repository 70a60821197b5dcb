//! # canon-db
//!
//! Persistence adapters for canon.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgUnitOfWork`], the PostgreSQL implementation of the unit-of-work port
//! - [`MemoryUnitOfWork`], an in-memory adapter with the same constraints
//! - Transparent compression of large text columns
//!
//! ## Example
//!
//! ```rust,ignore
//! use canon_db::{Database, DatabaseConfig};
//! use canon_core::UnitOfWork;
//!
//! #[tokio::main]
//! async fn main() -> canon_core::Result<()> {
//!     let db = Database::connect(&DatabaseConfig::from_env()?).await?;
//!     let mut uow = db.unit_of_work();
//!     let profile = uow.series_profiles().get_by_slug("morning-brief", None).await?;
//!     uow.commit().await?;
//!     println!("{:?}", profile);
//!     Ok(())
//! }
//! ```

pub mod compression;
pub mod memory;
pub mod pool;
pub mod uow;

// Test fixtures for integration tests.
// Always compiled so tests/ in other crates can use them.
pub mod test_fixtures;

use async_trait::async_trait;

use canon_core::{Result, UnitOfWork, UnitOfWorkFactory};

pub use compression::{decode_text, CompressionPolicy, EncodedText};
pub use memory::{MemoryStore, MemoryUnitOfWork, TableCounts};
pub use pool::{create_pool_with_config, DatabaseConfig, PoolConfig};
pub use uow::{map_db_error, PgUnitOfWork};

/// PostgreSQL database handle. Opens one [`PgUnitOfWork`] per transaction.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    compression: CompressionPolicy,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            pool,
            compression: CompressionPolicy::default(),
        }
    }

    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }

    /// Connect using an explicit configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = create_pool_with_config(&config.url, config.pool.clone()).await?;
        Ok(Self::new(pool).with_compression(CompressionPolicy::new(config.compress_min_bytes)))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| canon_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Open a unit of work. The transaction starts on first use.
    pub fn unit_of_work(&self) -> PgUnitOfWork {
        PgUnitOfWork::new(self.pool.clone(), self.compression)
    }
}

#[async_trait]
impl UnitOfWorkFactory for Database {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(self.unit_of_work()))
    }
}
