use async_trait::async_trait;

use super::PgStore;
use crate::models::WheelSpinRecord;

#[async_trait]
pub trait SpinRepository: Send + Sync {
    async fn record_spin(&self, spin: &WheelSpinRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl SpinRepository for PgStore {
    async fn record_spin(&self, spin: &WheelSpinRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wheel_spins (id, user_id, origin_airport, destination_ids, offers_shown, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(spin.id)
        .bind(&spin.user_id)
        .bind(&spin.origin_airport)
        .bind(&spin.destination_ids)
        .bind(spin.offers_shown)
        .bind(spin.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
