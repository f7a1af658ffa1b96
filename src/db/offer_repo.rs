use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::PgStore;
use crate::models::{FareConditions, Offer};

/// Durable second tier behind the in-memory offer cache.
#[async_trait]
pub trait OfferRepository: Send + Sync {
    /// Insert or overwrite offers by provider id.
    async fn upsert_offers(&self, offers: &[Offer]) -> anyhow::Result<()>;

    async fn get_offer(&self, id: &str) -> anyhow::Result<Option<Offer>>;

    /// Offers for a route that are still valid at `now`, cheapest first.
    async fn valid_offers_for_route(
        &self,
        origin: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Offer>>;

    async fn delete_expired_offers(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;
}

/// Database row for the offers table.
#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: String,
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    return_date: Option<NaiveDate>,
    total_amount: Decimal,
    currency: String,
    cabin_class: String,
    stops: i32,
    carrier: String,
    refundable: bool,
    changeable: bool,
    change_penalty: Option<Decimal>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = anyhow::Error;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        Ok(Offer {
            id: row.id,
            origin: row.origin,
            destination: row.destination,
            departure_date: row.departure_date,
            return_date: row.return_date,
            total_amount: row.total_amount,
            currency: row.currency,
            cabin_class: row.cabin_class.parse()?,
            stops: u32::try_from(row.stops)?,
            carrier: row.carrier,
            conditions: FareConditions {
                refundable: row.refundable,
                changeable: row.changeable,
                change_penalty: row.change_penalty,
            },
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl OfferRepository for PgStore {
    async fn upsert_offers(&self, offers: &[Offer]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for offer in offers {
            sqlx::query(
                r#"
                INSERT INTO offers (id, origin, destination, departure_date, return_date, total_amount,
                                    currency, cabin_class, stops, carrier, refundable, changeable,
                                    change_penalty, created_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (id) DO UPDATE
                SET total_amount = EXCLUDED.total_amount,
                    currency = EXCLUDED.currency,
                    expires_at = EXCLUDED.expires_at,
                    refundable = EXCLUDED.refundable,
                    changeable = EXCLUDED.changeable,
                    change_penalty = EXCLUDED.change_penalty
                "#,
            )
            .bind(&offer.id)
            .bind(&offer.origin)
            .bind(&offer.destination)
            .bind(offer.departure_date)
            .bind(offer.return_date)
            .bind(offer.total_amount)
            .bind(&offer.currency)
            .bind(offer.cabin_class.as_str())
            .bind(i32::try_from(offer.stops)?)
            .bind(&offer.carrier)
            .bind(offer.conditions.refundable)
            .bind(offer.conditions.changeable)
            .bind(offer.conditions.change_penalty)
            .bind(offer.created_at)
            .bind(offer.expires_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_offer(&self, id: &str) -> anyhow::Result<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>("SELECT * FROM offers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Offer::try_from).transpose()
    }

    async fn valid_offers_for_route(
        &self,
        origin: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Offer>> {
        let rows = sqlx::query_as::<_, OfferRow>(
            r#"
            SELECT * FROM offers
            WHERE origin = $1 AND destination = $2 AND expires_at > $3
            ORDER BY total_amount ASC
            "#,
        )
        .bind(origin)
        .bind(destination)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Offer::try_from).collect()
    }

    async fn delete_expired_offers(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM offers WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
