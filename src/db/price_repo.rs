use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::PgStore;
use crate::models::{PriceHistoryEntry, RouteKey};

/// Append-only per-route price series.
#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    async fn append(&self, entry: &PriceHistoryEntry) -> anyhow::Result<()>;

    /// Entries for a route observed at or after `since`, oldest first.
    async fn entries_since(
        &self,
        route_key: &RouteKey,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceHistoryEntry>>;

    /// Delete every entry observed before `cutoff`. Returns the number removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64>;
}

/// Database row for the price_history table.
#[derive(Debug, sqlx::FromRow)]
struct PriceHistoryRow {
    id: Uuid,
    route_key: String,
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    price: Decimal,
    currency: String,
    source: String,
    observed_at: DateTime<Utc>,
}

impl TryFrom<PriceHistoryRow> for PriceHistoryEntry {
    type Error = anyhow::Error;

    fn try_from(row: PriceHistoryRow) -> Result<Self, Self::Error> {
        let route_key = RouteKey::parse(&row.route_key)?;
        anyhow::ensure!(
            route_key.origin() == row.origin && route_key.destination() == row.destination,
            "price_history row {} has route key {} inconsistent with {}-{}",
            row.id,
            row.route_key,
            row.origin,
            row.destination,
        );

        Ok(PriceHistoryEntry {
            id: row.id,
            route_key,
            origin: row.origin,
            destination: row.destination,
            departure_date: row.departure_date,
            price: row.price,
            currency: row.currency,
            source: row.source.parse()?,
            observed_at: row.observed_at,
        })
    }
}

#[async_trait]
impl PriceHistoryRepository for PgStore {
    async fn append(&self, entry: &PriceHistoryEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (id, route_key, origin, destination, departure_date, price, currency, source, observed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.route_key.as_str())
        .bind(&entry.origin)
        .bind(&entry.destination)
        .bind(entry.departure_date)
        .bind(entry.price)
        .bind(&entry.currency)
        .bind(entry.source.as_str())
        .bind(entry.observed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn entries_since(
        &self,
        route_key: &RouteKey,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query_as::<_, PriceHistoryRow>(
            r#"
            SELECT * FROM price_history
            WHERE route_key = $1 AND observed_at >= $2
            ORDER BY observed_at ASC
            "#,
        )
        .bind(route_key.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PriceHistoryEntry::try_from).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM price_history WHERE observed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
