use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use metrics::counter;

use super::PriceHistory;
use crate::clock::{Clock, SharedClock};
use crate::db::OfferRepository;
use crate::errors::{CoreError, CoreResult};
use crate::models::{normalize_iata, Offer, PriceSource, SearchQuery};
use crate::provider::OfferProvider;

#[derive(Debug, Clone)]
pub struct OfferCacheConfig {
    /// A repeated identical search within this window is answered from cache.
    pub search_ttl: Duration,
    /// Upper bound on a single provider call.
    pub provider_timeout: StdDuration,
}

impl Default for OfferCacheConfig {
    fn default() -> Self {
        Self {
            search_ttl: Duration::minutes(15),
            provider_timeout: StdDuration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
struct SearchEntry {
    offer_ids: Vec<String>,
    fetched_at: DateTime<Utc>,
}

/// Short-lived store of provider offers keyed by offer id.
///
/// Every put also feeds [`PriceHistory`]. Expired offers are never returned,
/// even before [`OfferCache::purge_expired`] removes them. When a persistent
/// tier is configured, puts write through and memory misses fall back to it.
pub struct OfferCache {
    offers: DashMap<String, Offer>,
    searches: DashMap<SearchQuery, SearchEntry>,
    provider: Arc<dyn OfferProvider>,
    persistent: Option<Arc<dyn OfferRepository>>,
    history: PriceHistory,
    clock: SharedClock,
    config: OfferCacheConfig,
}

impl OfferCache {
    pub fn new(
        provider: Arc<dyn OfferProvider>,
        history: PriceHistory,
        clock: SharedClock,
        config: OfferCacheConfig,
    ) -> Self {
        Self {
            offers: DashMap::new(),
            searches: DashMap::new(),
            provider,
            persistent: None,
            history,
            clock,
            config,
        }
    }

    pub fn with_persistence(mut self, repo: Arc<dyn OfferRepository>) -> Self {
        self.persistent = Some(repo);
        self
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// Store offers (last writer wins per id) and record one price
    /// observation per offer.
    pub async fn put(&self, offers: &[Offer], source: PriceSource) {
        if offers.is_empty() {
            return;
        }

        for offer in offers {
            self.offers.insert(offer.id.clone(), offer.clone());
        }
        counter!("offers_cached_total").increment(offers.len() as u64);

        if let Some(repo) = &self.persistent {
            if let Err(e) = repo.upsert_offers(offers).await {
                tracing::warn!(error = %e, count = offers.len(), "Failed to persist offers");
            }
        }

        self.history.record_offers(offers, source).await;
    }

    /// Look up a still-valid offer by id.
    pub async fn get(&self, id: &str) -> Option<Offer> {
        let now = self.clock.now();

        let cached = self.offers.get(id).map(|o| o.value().clone());
        match cached {
            Some(offer) if offer.is_valid_at(now) => return Some(offer),
            Some(_) => {
                self.offers.remove_if(id, |_, o| !o.is_valid_at(now));
                return None;
            }
            None => {}
        }

        let repo = self.persistent.as_ref()?;
        match repo.get_offer(id).await {
            Ok(Some(offer)) if offer.is_valid_at(now) => {
                self.offers.insert(offer.id.clone(), offer.clone());
                Some(offer)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, offer_id = %id, "Persistent offer lookup failed");
                None
            }
        }
    }

    /// All valid offers for a route, cheapest first.
    pub async fn best_for(&self, origin: &str, destination: &str) -> Vec<Offer> {
        let (Ok(origin), Ok(destination)) = (normalize_iata(origin), normalize_iata(destination))
        else {
            return Vec::new();
        };
        let now = self.clock.now();

        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|o| o.origin == origin && o.destination == destination && o.is_valid_at(now))
            .map(|o| o.value().clone())
            .collect();

        if offers.is_empty() {
            if let Some(repo) = &self.persistent {
                match repo.valid_offers_for_route(&origin, &destination, now).await {
                    Ok(found) => offers = found,
                    Err(e) => {
                        tracing::warn!(error = %e, %origin, %destination, "Persistent route lookup failed");
                    }
                }
            }
        }

        sort_cheapest_first(&mut offers);
        offers
    }

    /// Search through the provider, reusing a recent identical search while
    /// any of its offers is still valid. Results are cached and recorded.
    pub async fn search(&self, query: &SearchQuery, source: PriceSource) -> CoreResult<Vec<Offer>> {
        let now = self.clock.now();

        if let Some(reused) = self.reuse_recent(query, now) {
            tracing::debug!(
                origin = %query.origin,
                destination = %query.destination,
                count = reused.len(),
                "Search served from cache"
            );
            return Ok(reused);
        }

        let result = tokio::time::timeout(self.config.provider_timeout, self.provider.search(query)).await;
        let mut offers = match result {
            Ok(Ok(offers)) => offers,
            Ok(Err(e)) => {
                counter!("provider_errors_total").increment(1);
                tracing::warn!(
                    error = %e,
                    origin = %query.origin,
                    destination = %query.destination,
                    "Offer provider search failed"
                );
                return Err(CoreError::ProviderUnavailable(e.to_string()));
            }
            Err(_) => {
                counter!("provider_errors_total").increment(1);
                tracing::warn!(
                    origin = %query.origin,
                    destination = %query.destination,
                    timeout_secs = self.config.provider_timeout.as_secs(),
                    "Offer provider search timed out"
                );
                return Err(CoreError::ProviderUnavailable(format!(
                    "search timed out after {}s",
                    self.config.provider_timeout.as_secs()
                )));
            }
        };

        offers.retain(|o| o.is_valid_at(now));
        self.put(&offers, source).await;
        self.searches.insert(
            query.clone(),
            SearchEntry {
                offer_ids: offers.iter().map(|o| o.id.clone()).collect(),
                fetched_at: now,
            },
        );

        sort_cheapest_first(&mut offers);
        Ok(offers)
    }

    fn reuse_recent(&self, query: &SearchQuery, now: DateTime<Utc>) -> Option<Vec<Offer>> {
        let entry = self.searches.get(query).map(|e| e.value().clone())?;
        if now - entry.fetched_at >= self.config.search_ttl {
            self.searches.remove(query);
            return None;
        }

        let mut offers: Vec<Offer> = entry
            .offer_ids
            .iter()
            .filter_map(|id| self.offers.get(id).map(|o| o.value().clone()))
            .filter(|o| o.is_valid_at(now))
            .collect();
        if offers.is_empty() {
            return None;
        }
        sort_cheapest_first(&mut offers);
        Some(offers)
    }

    /// Drop expired offers from memory and the persistent tier, plus stale
    /// search entries. Returns the number of offers removed.
    pub async fn purge_expired(&self) -> u64 {
        let now = self.clock.now();

        let before = self.offers.len();
        self.offers.retain(|_, o| o.is_valid_at(now));
        let mut removed = before.saturating_sub(self.offers.len()) as u64;

        let ttl = self.config.search_ttl;
        self.searches.retain(|_, e| now - e.fetched_at < ttl);

        if let Some(repo) = &self.persistent {
            match repo.delete_expired_offers(now).await {
                Ok(n) => removed = removed.max(n),
                Err(e) => tracing::warn!(error = %e, "Failed to purge persisted offers"),
            }
        }

        tracing::info!(removed, "Purged expired offers");
        removed
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

fn sort_cheapest_first(offers: &mut [Offer]) {
    offers.sort_by(|a, b| {
        a.total_amount
            .cmp(&b.total_amount)
            .then_with(|| a.id.cmp(&b.id))
    });
}
