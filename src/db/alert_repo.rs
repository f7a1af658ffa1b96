use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Alert, AlertKind, RouteKey};

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert_alert(&self, alert: &Alert) -> anyhow::Result<()>;

    async fn get_alert(&self, id: Uuid) -> anyhow::Result<Option<Alert>>;

    async fn alerts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Alert>>;

    async fn active_alerts(&self) -> anyhow::Result<Vec<Alert>>;

    /// Returns false when no alert with that id exists.
    async fn set_alert_active(&self, id: Uuid, is_active: bool) -> anyhow::Result<bool>;

    /// Returns false when no alert with that id exists.
    async fn delete_alert(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn mark_checked(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;
}

/// Database row for the price_alerts table.
#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    user_id: String,
    origin: String,
    destination: String,
    route_key: String,
    departure_date: Option<NaiveDate>,
    alert_type: String,
    max_price: Option<Decimal>,
    price_drop_percent: Option<Decimal>,
    is_active: bool,
    last_checked_at: Option<DateTime<Utc>>,
    last_notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = anyhow::Error;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let route_key = RouteKey::new(&row.origin, &row.destination)?;
        anyhow::ensure!(
            route_key.as_str() == row.route_key,
            "alert {} stores route key {} but routes {}",
            row.id,
            row.route_key,
            route_key,
        );

        Ok(Alert {
            id: row.id,
            user_id: row.user_id,
            origin: row.origin,
            destination: row.destination,
            route_key,
            departure_date: row.departure_date,
            kind: AlertKind::from_parts(&row.alert_type, row.max_price, row.price_drop_percent)?,
            is_active: row.is_active,
            last_checked_at: row.last_checked_at,
            last_notified_at: row.last_notified_at,
            created_at: row.created_at,
        })
    }
}

fn into_alerts(rows: Vec<AlertRow>) -> anyhow::Result<Vec<Alert>> {
    rows.into_iter().map(Alert::try_from).collect()
}

#[async_trait]
impl AlertRepository for PgStore {
    async fn insert_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_alerts (id, user_id, origin, destination, route_key, departure_date,
                                      alert_type, max_price, price_drop_percent, is_active,
                                      last_checked_at, last_notified_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.user_id)
        .bind(&alert.origin)
        .bind(&alert.destination)
        .bind(alert.route_key.as_str())
        .bind(alert.departure_date)
        .bind(alert.kind.as_str())
        .bind(alert.kind.max_price())
        .bind(alert.kind.drop_percent())
        .bind(alert.is_active)
        .bind(alert.last_checked_at)
        .bind(alert.last_notified_at)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> anyhow::Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM price_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Alert::try_from).transpose()
    }

    async fn alerts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM price_alerts WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        into_alerts(rows)
    }

    async fn active_alerts(&self) -> anyhow::Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM price_alerts WHERE is_active = true ORDER BY last_checked_at ASC NULLS FIRST",
        )
        .fetch_all(&self.pool)
        .await?;

        into_alerts(rows)
    }

    async fn set_alert_active(&self, id: Uuid, is_active: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE price_alerts SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_alert(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM price_alerts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_checked(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE price_alerts SET last_checked_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("UPDATE price_alerts SET last_notified_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
