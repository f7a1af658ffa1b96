pub mod alert_repo;
pub mod catalog_repo;
pub mod memory;
pub mod offer_repo;
pub mod price_repo;
pub mod spin_repo;

pub use alert_repo::AlertRepository;
pub use catalog_repo::CatalogRepository;
pub use memory::MemoryStore;
pub use offer_repo::OfferRepository;
pub use price_repo::PriceHistoryRepository;
pub use spin_repo::SpinRepository;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Reachability probe used by the health endpoint.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Postgres-backed implementation of every repository trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
