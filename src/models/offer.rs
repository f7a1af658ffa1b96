use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{normalize_iata, RouteKey};
use crate::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium_economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium_economy" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            other => Err(CoreError::validation(format!("unknown cabin class: {other}"))),
        }
    }
}

/// Refund/change rules attached to a fare.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareConditions {
    pub refundable: bool,
    pub changeable: bool,
    pub change_penalty: Option<Decimal>,
}

/// A priced itinerary quote returned by the offer provider.
///
/// Immutable once cached; served only while `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Provider-assigned identifier.
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub currency: String,
    pub cabin_class: CabinClass,
    pub stops: u32,
    pub carrier: String,
    pub conditions: FareConditions,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Offer {
    /// Check the structural invariants of an offer and normalise its codes.
    pub fn validated(mut self) -> CoreResult<Self> {
        if self.id.trim().is_empty() {
            return Err(CoreError::validation("offer id must not be empty"));
        }
        self.origin = normalize_iata(&self.origin)?;
        self.destination = normalize_iata(&self.destination)?;
        if self.expires_at <= self.created_at {
            return Err(CoreError::validation(format!(
                "offer {} expires at or before its creation time",
                self.id
            )));
        }
        if self.total_amount.is_sign_negative() {
            return Err(CoreError::validation(format!(
                "offer {} has a negative total amount",
                self.id
            )));
        }
        if let Some(ret) = self.return_date {
            if ret < self.departure_date {
                return Err(CoreError::validation(format!(
                    "offer {} returns before it departs",
                    self.id
                )));
            }
        }
        Ok(self)
    }

    pub fn route_key(&self) -> CoreResult<RouteKey> {
        RouteKey::new(&self.origin, &self.destination)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Parameters of one provider search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub cabin_class: Option<CabinClass>,
}

impl SearchQuery {
    pub fn one_way(origin: &str, destination: &str, departure_date: NaiveDate) -> CoreResult<Self> {
        Ok(Self {
            origin: normalize_iata(origin)?,
            destination: normalize_iata(destination)?,
            departure_date,
            return_date: None,
            cabin_class: None,
        })
    }

    pub fn round_trip(
        origin: &str,
        destination: &str,
        departure_date: NaiveDate,
        return_date: NaiveDate,
    ) -> CoreResult<Self> {
        if return_date < departure_date {
            return Err(CoreError::validation("return date precedes departure date"));
        }
        let mut query = Self::one_way(origin, destination, departure_date)?;
        query.return_date = Some(return_date);
        Ok(query)
    }

    pub fn with_cabin(mut self, cabin: CabinClass) -> Self {
        self.cabin_class = Some(cabin);
        self
    }
}
