pub mod alert;
pub mod offer;
pub mod price;
pub mod wheel;

pub use alert::{Alert, AlertKind, NewAlert};
pub use offer::{CabinClass, FareConditions, Offer, SearchQuery};
pub use price::{
    DailyPrice, PriceBadge, PriceHistoryEntry, PriceSource, PriceStatistics, Recommendation, Trend,
};
pub use wheel::{Airport, BudgetPreference, BudgetRange, Destination, WheelSpinRecord};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CoreError, CoreResult};

/// Normalise and validate a three-letter IATA airport code.
pub fn normalize_iata(code: &str) -> CoreResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::validation(format!(
            "invalid IATA airport code: {code:?}"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// RouteKey: canonical ORIGIN-DESTINATION lookup key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteKey(String);

impl RouteKey {
    /// Build the key for a route, validating both airport codes.
    pub fn new(origin: &str, destination: &str) -> CoreResult<Self> {
        let origin = normalize_iata(origin)?;
        let destination = normalize_iata(destination)?;
        if origin == destination {
            return Err(CoreError::validation(format!(
                "origin and destination must differ ({origin})"
            )));
        }
        Ok(Self(format!("{origin}-{destination}")))
    }

    /// Parse a key of the form `BRU-BCN`.
    pub fn parse(key: &str) -> CoreResult<Self> {
        let (origin, destination) = key
            .split_once('-')
            .ok_or_else(|| CoreError::validation(format!("invalid route key: {key:?}")))?;
        Self::new(origin, destination)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn origin(&self) -> &str {
        &self.0[..3]
    }

    pub fn destination(&self) -> &str {
        &self.0[4..]
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RouteKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RouteKey> for String {
    fn from(key: RouteKey) -> Self {
        key.0
    }
}
