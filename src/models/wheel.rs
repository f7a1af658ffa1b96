use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    pub iata: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_active: bool,
}

/// A spinnable destination from the content catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub slug: String,
    pub primary_airport_iata: Option<String>,
    /// Typical trip budget used by the coarse budget filter.
    pub typical_budget: Option<Decimal>,
    pub is_published: bool,
    pub is_featured: bool,
}

/// Inclusive budget band; `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetRange {
    pub min: Decimal,
    pub max: Option<Decimal>,
}

impl BudgetRange {
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && self.max.map_or(true, |max| amount <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPreference {
    Low,
    Medium,
    High,
}

impl BudgetPreference {
    pub fn range(&self) -> BudgetRange {
        match self {
            BudgetPreference::Low => BudgetRange {
                min: Decimal::ZERO,
                max: Some(Decimal::from(500)),
            },
            BudgetPreference::Medium => BudgetRange {
                min: Decimal::from(500),
                max: Some(Decimal::from(1_500)),
            },
            BudgetPreference::High => BudgetRange {
                min: Decimal::from(1_500),
                max: None,
            },
        }
    }
}

/// Analytics record of one spin. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WheelSpinRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub origin_airport: String,
    pub destination_ids: Vec<Uuid>,
    pub offers_shown: i32,
    pub created_at: DateTime<Utc>,
}
