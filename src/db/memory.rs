//! In-process implementation of every repository trait.
//!
//! Backed by `DashMap`, so concurrent readers and writers only contend on
//! the shard that holds their key (one route, one alert, one offer).
//! Used when no `DATABASE_URL` is configured and by the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    AlertRepository, CatalogRepository, OfferRepository, PriceHistoryRepository, SpinRepository,
    StoreHealth,
};
use crate::models::{Airport, Alert, Destination, Offer, PriceHistoryEntry, RouteKey, WheelSpinRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    offers: DashMap<String, Offer>,
    history: DashMap<RouteKey, Vec<PriceHistoryEntry>>,
    alerts: DashMap<Uuid, Alert>,
    airports: DashMap<String, Airport>,
    destinations: DashMap<Uuid, Destination>,
    spins: DashMap<Uuid, WheelSpinRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_airport(&self, airport: Airport) {
        self.airports.insert(airport.iata.clone(), airport);
    }

    pub fn add_destination(&self, destination: Destination) {
        self.destinations.insert(destination.id, destination);
    }

    pub fn spins(&self) -> Vec<WheelSpinRecord> {
        let mut spins: Vec<WheelSpinRecord> = self.spins.iter().map(|s| s.value().clone()).collect();
        spins.sort_by_key(|s| s.created_at);
        spins
    }

    pub fn history_len(&self, route_key: &RouteKey) -> usize {
        self.history.get(route_key).map(|h| h.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn upsert_offers(&self, offers: &[Offer]) -> anyhow::Result<()> {
        for offer in offers {
            self.offers.insert(offer.id.clone(), offer.clone());
        }
        Ok(())
    }

    async fn get_offer(&self, id: &str) -> anyhow::Result<Option<Offer>> {
        Ok(self.offers.get(id).map(|o| o.value().clone()))
    }

    async fn valid_offers_for_route(
        &self,
        origin: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Offer>> {
        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|o| o.origin == origin && o.destination == destination && o.is_valid_at(now))
            .map(|o| o.value().clone())
            .collect();
        offers.sort_by(|a, b| a.total_amount.cmp(&b.total_amount));
        Ok(offers)
    }

    async fn delete_expired_offers(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let before = self.offers.len();
        self.offers.retain(|_, offer| offer.is_valid_at(now));
        Ok(before.saturating_sub(self.offers.len()) as u64)
    }
}

#[async_trait]
impl PriceHistoryRepository for MemoryStore {
    async fn append(&self, entry: &PriceHistoryEntry) -> anyhow::Result<()> {
        let mut series = self.history.entry(entry.route_key.clone()).or_default();
        // Keep each series ordered by observation time.
        let at = series.partition_point(|e| e.observed_at <= entry.observed_at);
        series.insert(at, entry.clone());
        Ok(())
    }

    async fn entries_since(
        &self,
        route_key: &RouteKey,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PriceHistoryEntry>> {
        let entries = self
            .history
            .get(route_key)
            .map(|series| {
                series
                    .iter()
                    .filter(|e| e.observed_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut removed = 0u64;
        for mut series in self.history.iter_mut() {
            let before = series.len();
            series.retain(|e| e.observed_at >= cutoff);
            removed += (before - series.len()) as u64;
        }
        self.history.retain(|_, series| !series.is_empty());
        Ok(removed)
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.alerts.contains_key(&alert.id),
            "alert {} already exists",
            alert.id
        );
        self.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> anyhow::Result<Option<Alert>> {
        Ok(self.alerts.get(&id).map(|a| a.value().clone()))
    }

    async fn alerts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.value().clone())
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn active_alerts(&self) -> anyhow::Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.is_active)
            .map(|a| a.value().clone())
            .collect();
        alerts.sort_by_key(|a| a.last_checked_at);
        Ok(alerts)
    }

    async fn set_alert_active(&self, id: Uuid, is_active: bool) -> anyhow::Result<bool> {
        Ok(self
            .alerts
            .get_mut(&id)
            .map(|mut a| a.is_active = is_active)
            .is_some())
    }

    async fn delete_alert(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.alerts.remove(&id).is_some())
    }

    async fn mark_checked(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(mut alert) = self.alerts.get_mut(&id) {
            alert.last_checked_at = Some(at);
        }
        Ok(())
    }

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(mut alert) = self.alerts.get_mut(&id) {
            alert.last_notified_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn active_airports(&self) -> anyhow::Result<Vec<Airport>> {
        let mut airports: Vec<Airport> = self
            .airports
            .iter()
            .filter(|a| a.is_active)
            .map(|a| a.value().clone())
            .collect();
        airports.sort_by(|a, b| a.iata.cmp(&b.iata));
        Ok(airports)
    }

    async fn featured_destinations(&self) -> anyhow::Result<Vec<Destination>> {
        let mut destinations: Vec<Destination> = self
            .destinations
            .iter()
            .filter(|d| d.is_published && d.is_featured)
            .map(|d| d.value().clone())
            .collect();
        destinations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(destinations)
    }
}

#[async_trait]
impl SpinRepository for MemoryStore {
    async fn record_spin(&self, spin: &WheelSpinRecord) -> anyhow::Result<()> {
        self.spins.insert(spin.id, spin.clone());
        Ok(())
    }
}
