use std::sync::Arc;

use chrono::Duration;
use futures_util::future::join_all;
use metrics::counter;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geo;
use crate::clock::{Clock, SharedClock};
use crate::db::{CatalogRepository, SpinRepository};
use crate::errors::{CoreError, CoreResult};
use crate::models::{
    normalize_iata, Airport, BudgetPreference, Destination, Offer, PriceBadge, PriceSource, SearchQuery,
    WheelSpinRecord,
};
use crate::pricing::OfferCache;

#[derive(Debug, Clone)]
pub struct WheelConfig {
    /// Origin used when neither a home airport nor coordinates resolve.
    pub fallback_airport: String,
    /// Destinations drawn per spin.
    pub candidates: usize,
    /// Days from today until the outbound flight.
    pub lead_days: i64,
    pub trip_nights: i64,
    pub offers_per_candidate: usize,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            fallback_airport: "BRU".into(),
            candidates: 3,
            lead_days: 14,
            trip_nights: 3,
            offers_per_candidate: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinRequest {
    #[serde(skip)]
    pub user_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub home_airport_iata: Option<String>,
    #[serde(default)]
    pub preferences: SpinPreferences,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinPreferences {
    pub budget: Option<BudgetPreference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinCandidate {
    pub destination: Destination,
    pub offers: Vec<Offer>,
    pub price_badge: PriceBadge,
    pub percentile: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResult {
    pub spin_id: Uuid,
    pub origin_airport: String,
    pub destinations: Vec<SpinCandidate>,
}

/// Picks random featured destinations and prices a short trip to each.
pub struct WheelSelector {
    catalog: Arc<dyn CatalogRepository>,
    spins: Arc<dyn SpinRepository>,
    cache: Arc<OfferCache>,
    clock: SharedClock,
    config: WheelConfig,
}

impl WheelSelector {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        spins: Arc<dyn SpinRepository>,
        cache: Arc<OfferCache>,
        clock: SharedClock,
        config: WheelConfig,
    ) -> Self {
        Self {
            catalog,
            spins,
            cache,
            clock,
            config,
        }
    }

    pub async fn spin(&self, request: SpinRequest) -> CoreResult<SpinResult> {
        let airports = self
            .catalog
            .active_airports()
            .await
            .map_err(CoreError::Persistence)?;
        let origin = self.resolve_origin(&request, &airports);

        let featured = self
            .catalog
            .featured_destinations()
            .await
            .map_err(CoreError::Persistence)?;
        let picked = self.pick_candidates(featured, &origin, request.preferences.budget);
        tracing::debug!(%origin, picked = picked.len(), "Wheel candidates drawn");

        let priced = join_all(picked.iter().map(|d| self.price_candidate(&origin, d))).await;
        let destinations: Vec<SpinCandidate> = priced.into_iter().filter(|c| !c.offers.is_empty()).collect();

        if destinations.is_empty() {
            tracing::warn!(%origin, "Wheel spin found no priced destinations");
            return Err(CoreError::NoPricedDestinations(origin));
        }

        let record = WheelSpinRecord {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            origin_airport: origin.clone(),
            destination_ids: destinations.iter().map(|c| c.destination.id).collect(),
            offers_shown: destinations.iter().map(|c| c.offers.len() as i32).sum(),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.spins.record_spin(&record).await {
            tracing::warn!(spin_id = %record.id, error = %e, "Failed to record wheel spin");
        }

        counter!("wheel_spins_total").increment(1);
        tracing::info!(
            spin_id = %record.id,
            %origin,
            shown = destinations.len(),
            offers = record.offers_shown,
            "Wheel spin complete"
        );

        Ok(SpinResult {
            spin_id: record.id,
            origin_airport: origin,
            destinations,
        })
    }

    /// Home airport if it is an active airport, else the nearest active
    /// airport to the coordinates, else the fallback.
    pub fn resolve_origin(&self, request: &SpinRequest, airports: &[Airport]) -> String {
        if let Some(home) = request.home_airport_iata.as_deref() {
            match normalize_iata(home) {
                Ok(code) if airports.iter().any(|a| a.iata == code) => return code,
                _ => tracing::debug!(home, "Ignoring unknown home airport"),
            }
        }

        if let (Some(lat), Some(lng)) = (request.lat, request.lng) {
            if geo::valid_coordinates(lat, lng) {
                if let Some(nearest) = geo::nearest_airport(airports, lat, lng) {
                    return nearest.iata.clone();
                }
            }
        }

        self.config.fallback_airport.clone()
    }

    fn pick_candidates(
        &self,
        featured: Vec<Destination>,
        origin: &str,
        budget: Option<BudgetPreference>,
    ) -> Vec<Destination> {
        let range = budget.map(|b| b.range());
        let eligible: Vec<Destination> = featured
            .into_iter()
            .filter(|d| d.primary_airport_iata.as_deref().map_or(false, |iata| iata != origin))
            .filter(|d| match (range, d.typical_budget) {
                (None, _) => true,
                (Some(range), Some(amount)) => range.contains(amount),
                (Some(_), None) => false,
            })
            .collect();

        let mut rng = rand::thread_rng();
        eligible
            .choose_multiple(&mut rng, self.config.candidates)
            .cloned()
            .collect()
    }

    /// Price one destination. Failures leave the candidate with no offers
    /// and a neutral badge.
    async fn price_candidate(&self, origin: &str, destination: &Destination) -> SpinCandidate {
        match self.try_price(origin, destination).await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(
                    destination_id = %destination.id,
                    destination = %destination.name,
                    error = %e,
                    "Failed to price wheel candidate"
                );
                SpinCandidate {
                    destination: destination.clone(),
                    offers: Vec::new(),
                    price_badge: PriceBadge::Fair,
                    percentile: None,
                }
            }
        }
    }

    async fn try_price(&self, origin: &str, destination: &Destination) -> CoreResult<SpinCandidate> {
        let airport = destination
            .primary_airport_iata
            .as_deref()
            .ok_or_else(|| CoreError::validation(format!("destination {} has no airport", destination.id)))?;

        let today = self.clock.now().date_naive();
        let departure = today + Duration::days(self.config.lead_days);
        let return_date = departure + Duration::days(self.config.trip_nights);
        let query = SearchQuery::round_trip(origin, airport, departure, return_date)?;

        let mut offers = self.cache.search(&query, PriceSource::Wheel).await?;
        offers.truncate(self.config.offers_per_candidate);

        let Some(cheapest) = offers.first() else {
            return Ok(SpinCandidate {
                destination: destination.clone(),
                offers,
                price_badge: PriceBadge::Fair,
                percentile: None,
            });
        };

        let route_key = cheapest.route_key()?;
        let stats = self
            .cache
            .history()
            .statistics(&route_key, Some(cheapest.total_amount))
            .await?;
        let (price_badge, percentile) = match stats {
            Some(s) => (PriceBadge::from(s.recommendation), Some(s.percentile)),
            None => (PriceBadge::Fair, None),
        };

        Ok(SpinCandidate {
            destination: destination.clone(),
            offers,
            price_badge,
            percentile,
        })
    }
}
