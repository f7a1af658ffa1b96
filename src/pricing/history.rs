use std::sync::Arc;

use chrono::Duration;
use metrics::counter;
use rust_decimal::Decimal;

use super::stats;
use crate::clock::{Clock, SharedClock};
use crate::db::PriceHistoryRepository;
use crate::errors::{CoreError, CoreResult};
use crate::models::{DailyPrice, Offer, PriceHistoryEntry, PriceSource, PriceStatistics, RouteKey};

/// Statistics look back this far; the 30-day figures are a subset.
pub const STATS_WINDOW_DAYS: i64 = 90;

/// Append-only record of observed prices per route, plus the queries built on it.
#[derive(Clone)]
pub struct PriceHistory {
    repo: Arc<dyn PriceHistoryRepository>,
    clock: SharedClock,
}

impl PriceHistory {
    pub fn new(repo: Arc<dyn PriceHistoryRepository>, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    /// Append one observation. Failures are logged and swallowed.
    pub async fn record(&self, entry: PriceHistoryEntry) {
        match self.repo.append(&entry).await {
            Ok(()) => {
                counter!("price_points_recorded_total", "source" => entry.source.as_str())
                    .increment(1);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    route = %entry.route_key,
                    source = %entry.source,
                    "Failed to record price observation"
                );
            }
        }
    }

    /// Record every offer's price, stamped with the current clock.
    pub async fn record_offers(&self, offers: &[Offer], source: PriceSource) {
        let now = self.clock.now();
        for offer in offers {
            match PriceHistoryEntry::from_offer(offer, source, now) {
                Ok(entry) => self.record(entry).await,
                Err(e) => {
                    tracing::warn!(error = %e, offer_id = %offer.id, "Offer not recordable as history");
                }
            }
        }
    }

    /// Statistics over the last 90 days, or `None` when the route has no history.
    /// Without `current_price` the latest observation is used.
    pub async fn statistics(
        &self,
        route_key: &RouteKey,
        current_price: Option<Decimal>,
    ) -> CoreResult<Option<PriceStatistics>> {
        let now = self.clock.now();
        let entries = self
            .repo
            .entries_since(route_key, now - Duration::days(STATS_WINDOW_DAYS))
            .await
            .map_err(CoreError::Persistence)?;

        Ok(stats::compute_statistics(route_key, &entries, now, current_price))
    }

    /// Daily price buckets for the last `days` days, oldest first.
    pub async fn trend(&self, route_key: &RouteKey, days: u32) -> CoreResult<Vec<DailyPrice>> {
        if days == 0 {
            return Err(CoreError::validation("days must be at least 1"));
        }
        let since = self.clock.now() - Duration::days(i64::from(days));
        let entries = self
            .repo
            .entries_since(route_key, since)
            .await
            .map_err(CoreError::Persistence)?;

        Ok(stats::daily_aggregates(&entries))
    }

    /// Drop observations older than `retention_days`. Returns how many went.
    pub async fn prune(&self, retention_days: u32) -> CoreResult<u64> {
        let cutoff = self.clock.now() - Duration::days(i64::from(retention_days));
        let removed = self
            .repo
            .delete_older_than(cutoff)
            .await
            .map_err(CoreError::Persistence)?;

        counter!("history_entries_pruned_total").increment(removed);
        tracing::info!(removed, retention_days, "Pruned price history");
        Ok(removed)
    }
}
