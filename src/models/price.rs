use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Offer, RouteKey};
use crate::errors::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// PriceSource: which path observed the price
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Search,
    Wheel,
    Alert,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Search => "search",
            PriceSource::Wheel => "wheel",
            PriceSource::Alert => "alert",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(PriceSource::Search),
            "wheel" => Ok(PriceSource::Wheel),
            "alert" => Ok(PriceSource::Alert),
            other => Err(CoreError::validation(format!("unknown price source: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// PriceHistoryEntry: append-only observation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: Uuid,
    pub route_key: RouteKey,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub price: Decimal,
    pub currency: String,
    pub source: PriceSource,
    pub observed_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    /// Build an entry; the route key is always derived from origin and destination.
    pub fn new(
        origin: &str,
        destination: &str,
        departure_date: NaiveDate,
        price: Decimal,
        currency: &str,
        source: PriceSource,
        observed_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let route_key = RouteKey::new(origin, destination)?;
        Ok(Self {
            id: Uuid::new_v4(),
            origin: route_key.origin().to_string(),
            destination: route_key.destination().to_string(),
            route_key,
            departure_date,
            price,
            currency: currency.to_ascii_uppercase(),
            source,
            observed_at,
        })
    }

    pub fn from_offer(offer: &Offer, source: PriceSource, observed_at: DateTime<Utc>) -> CoreResult<Self> {
        Self::new(
            &offer.origin,
            &offer.destination,
            offer.departure_date,
            offer.total_amount,
            &offer.currency,
            source,
            observed_at,
        )
    }
}

// ---------------------------------------------------------------------------
// Derived statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Qualitative verdict on a price. One canonical table:
/// percentile ≤ 15 (and not rising) → excellent, ≤ 35 → good, ≤ 65 → fair, else poor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Excellent => "excellent",
            Recommendation::Good => "good",
            Recommendation::Fair => "fair",
            Recommendation::Poor => "poor",
        }
    }

    pub fn is_deal(&self) -> bool {
        matches!(self, Recommendation::Excellent | Recommendation::Good)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-way badge shown on a wheel candidate. Derived from [`Recommendation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBadge {
    Good,
    Fair,
    Poor,
}

impl From<Recommendation> for PriceBadge {
    fn from(rec: Recommendation) -> Self {
        match rec {
            Recommendation::Excellent | Recommendation::Good => PriceBadge::Good,
            Recommendation::Fair => PriceBadge::Fair,
            Recommendation::Poor => PriceBadge::Poor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStatistics {
    pub route_key: RouteKey,
    pub current_price: Decimal,
    pub average_30d: Decimal,
    pub average_90d: Decimal,
    pub min_30d: Decimal,
    pub max_30d: Decimal,
    pub trend: Trend,
    /// Share of the 30-day sample at or below `current_price`, 0–100.
    pub percentile: Decimal,
    pub recommendation: Recommendation,
    pub sample_size_30d: usize,
    pub sample_size_90d: usize,
}

/// One day of aggregated observations, for charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPrice {
    pub date: NaiveDate,
    pub average: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub count: usize,
}
