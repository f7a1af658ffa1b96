use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::RouteKey;
use crate::errors::{CoreError, CoreResult};

/// What an alert watches for, with the parameters that kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alertType", rename_all = "snake_case")]
pub enum AlertKind {
    /// Fire when the cheapest offer is at or below `max_price`.
    PriceThreshold {
        #[serde(rename = "maxPrice")]
        max_price: Decimal,
    },
    /// Fire when the cheapest offer sits `drop_percent` or more below the 30-day average.
    PriceDrop {
        #[serde(rename = "priceDropPercent")]
        drop_percent: Decimal,
    },
    /// Fire when the statistics engine rates the cheapest offer excellent or good.
    GoodDeal,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceThreshold { .. } => "price_threshold",
            AlertKind::PriceDrop { .. } => "price_drop",
            AlertKind::GoodDeal => "good_deal",
        }
    }

    /// Build a kind from its wire name and optional parameters.
    pub fn from_parts(
        alert_type: &str,
        max_price: Option<Decimal>,
        drop_percent: Option<Decimal>,
    ) -> CoreResult<Self> {
        let kind = match alert_type {
            "price_threshold" => AlertKind::PriceThreshold {
                max_price: max_price
                    .ok_or_else(|| CoreError::validation("price_threshold alerts require maxPrice"))?,
            },
            "price_drop" => AlertKind::PriceDrop {
                drop_percent: drop_percent.ok_or_else(|| {
                    CoreError::validation("price_drop alerts require priceDropPercent")
                })?,
            },
            "good_deal" => AlertKind::GoodDeal,
            other => return Err(CoreError::validation(format!("unknown alert type: {other}"))),
        };
        kind.validate()?;
        Ok(kind)
    }

    fn validate(&self) -> CoreResult<()> {
        match self {
            AlertKind::PriceThreshold { max_price } if *max_price <= Decimal::ZERO => {
                Err(CoreError::validation("maxPrice must be positive"))
            }
            AlertKind::PriceDrop { drop_percent }
                if *drop_percent <= Decimal::ZERO || *drop_percent > Decimal::ONE_HUNDRED =>
            {
                Err(CoreError::validation("priceDropPercent must be in (0, 100]"))
            }
            _ => Ok(()),
        }
    }

    pub fn max_price(&self) -> Option<Decimal> {
        match self {
            AlertKind::PriceThreshold { max_price } => Some(*max_price),
            _ => None,
        }
    }

    pub fn drop_percent(&self) -> Option<Decimal> {
        match self {
            AlertKind::PriceDrop { drop_percent } => Some(*drop_percent),
            _ => None,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's price-watch subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub user_id: String,
    pub origin: String,
    pub destination: String,
    pub route_key: RouteKey,
    pub departure_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub is_active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// True while the last notification is younger than `cooldown`.
    pub fn in_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_notified_at
            .map(|notified| now - notified < cooldown)
            .unwrap_or(false)
    }
}

/// Validated input for creating an alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub user_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: Option<NaiveDate>,
    pub kind: AlertKind,
}

impl NewAlert {
    pub fn into_alert(self, now: DateTime<Utc>) -> CoreResult<Alert> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::validation("alerts must belong to a user"));
        }
        let route_key = RouteKey::new(&self.origin, &self.destination)?;
        if let Some(date) = self.departure_date {
            if date < now.date_naive() {
                return Err(CoreError::validation(format!(
                    "departure date {date} is in the past"
                )));
            }
        }
        self.kind.validate()?;

        Ok(Alert {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            origin: route_key.origin().to_string(),
            destination: route_key.destination().to_string(),
            route_key,
            departure_date: self.departure_date,
            kind: self.kind,
            is_active: true,
            last_checked_at: None,
            last_notified_at: None,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_alert(kind: AlertKind) -> NewAlert {
        NewAlert {
            user_id: "user-1".into(),
            origin: "bru".into(),
            destination: "bcn".into(),
            departure_date: None,
            kind,
        }
    }

    #[test]
    fn test_route_key_follows_endpoints_for_every_kind() {
        let now = Utc::now();
        for kind in [
            AlertKind::PriceThreshold { max_price: Decimal::from(150) },
            AlertKind::PriceDrop { drop_percent: Decimal::from(10) },
            AlertKind::GoodDeal,
        ] {
            let alert = new_alert(kind).into_alert(now).unwrap();
            assert_eq!(alert.route_key.as_str(), "BRU-BCN");
            assert!(alert.is_active);
        }
    }

    #[test]
    fn test_kind_parameters_are_validated() {
        assert!(AlertKind::from_parts("price_threshold", None, None).is_err());
        assert!(AlertKind::from_parts("price_threshold", Some(Decimal::ZERO), None).is_err());
        assert!(AlertKind::from_parts("price_drop", None, Some(Decimal::from(101))).is_err());
        assert!(AlertKind::from_parts("sudden_love", None, None).is_err());
        assert_eq!(
            AlertKind::from_parts("good_deal", None, None).unwrap(),
            AlertKind::GoodDeal
        );
    }

    #[test]
    fn test_past_departure_is_rejected() {
        let now = Utc::now();
        let mut input = new_alert(AlertKind::GoodDeal);
        input.departure_date = Some(now.date_naive() - Duration::days(1));
        assert!(input.into_alert(now).is_err());
    }

    #[test]
    fn test_cooldown_window() {
        let now = Utc::now();
        let mut alert = new_alert(AlertKind::GoodDeal).into_alert(now).unwrap();
        let cooldown = Duration::hours(24);
        assert!(!alert.in_cooldown(now, cooldown));

        alert.last_notified_at = Some(now - Duration::hours(1));
        assert!(alert.in_cooldown(now, cooldown));

        alert.last_notified_at = Some(now - Duration::hours(25));
        assert!(!alert.in_cooldown(now, cooldown));
    }

    #[test]
    fn test_serialises_kind_inline() {
        let alert = new_alert(AlertKind::PriceThreshold { max_price: Decimal::from(150) })
            .into_alert(Utc::now())
            .unwrap();
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["alertType"], "price_threshold");
        assert_eq!(json["maxPrice"], "150");
        assert_eq!(json["routeKey"], "BRU-BCN");
    }
}
