use async_trait::async_trait;

use super::PgStore;
use crate::models::{Airport, Destination};

/// Read access to the content catalog maintained by the CMS.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn active_airports(&self) -> anyhow::Result<Vec<Airport>>;

    /// Destinations that are both published and featured.
    async fn featured_destinations(&self) -> anyhow::Result<Vec<Destination>>;
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn active_airports(&self) -> anyhow::Result<Vec<Airport>> {
        let airports = sqlx::query_as::<_, Airport>(
            "SELECT * FROM airports WHERE is_active = true ORDER BY iata",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(airports)
    }

    async fn featured_destinations(&self) -> anyhow::Result<Vec<Destination>> {
        let destinations = sqlx::query_as::<_, Destination>(
            r#"
            SELECT * FROM destinations
            WHERE is_published = true AND is_featured = true
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(destinations)
    }
}
