use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::scheduler::Job;
use crate::alerts::{AlertEvaluator, SweepSummary};
use crate::pricing::OfferCache;

/// Evaluates every active alert.
pub struct AlertSweepJob {
    evaluator: Arc<AlertEvaluator>,
}

impl AlertSweepJob {
    pub fn new(evaluator: Arc<AlertEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Job for AlertSweepJob {
    type Output = SweepSummary;

    fn name(&self) -> &'static str {
        "alert_sweep"
    }

    async fn run(&self) -> anyhow::Result<SweepSummary> {
        Ok(self.evaluator.sweep().await?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSummary {
    pub history_pruned: u64,
    pub offers_purged: u64,
}

/// Daily housekeeping: prune old price history and drop expired offers.
pub struct MaintenanceJob {
    cache: Arc<OfferCache>,
    retention_days: u32,
}

impl MaintenanceJob {
    pub fn new(cache: Arc<OfferCache>, retention_days: u32) -> Self {
        Self {
            cache,
            retention_days,
        }
    }
}

#[async_trait]
impl Job for MaintenanceJob {
    type Output = MaintenanceSummary;

    fn name(&self) -> &'static str {
        "history_prune"
    }

    async fn run(&self) -> anyhow::Result<MaintenanceSummary> {
        let history_pruned = match self.cache.history().prune(self.retention_days).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "History prune failed");
                0
            }
        };
        let offers_purged = self.cache.purge_expired().await;
        Ok(MaintenanceSummary {
            history_pruned,
            offers_purged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::{MemoryStore, PriceHistoryRepository};
    use crate::models::{Offer, PriceHistoryEntry, PriceSource, RouteKey, SearchQuery};
    use crate::pricing::{OfferCacheConfig, PriceHistory};
    use crate::provider::OfferProvider;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    struct NoProvider;

    #[async_trait]
    impl OfferProvider for NoProvider {
        async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<Offer>> {
            Ok(Vec::new())
        }
    }

    /// History store that cannot delete.
    struct PruneFailingHistory(MemoryStore);

    #[async_trait]
    impl PriceHistoryRepository for PruneFailingHistory {
        async fn append(&self, entry: &PriceHistoryEntry) -> anyhow::Result<()> {
            self.0.append(entry).await
        }

        async fn entries_since(
            &self,
            route_key: &RouteKey,
            since: DateTime<Utc>,
        ) -> anyhow::Result<Vec<PriceHistoryEntry>> {
            self.0.entries_since(route_key, since).await
        }

        async fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
            anyhow::bail!("statement timeout")
        }
    }

    #[tokio::test]
    async fn test_prune_failure_still_purges_offers() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 3, 0, 0).unwrap()));
        let history = PriceHistory::new(Arc::new(PruneFailingHistory(MemoryStore::new())), clock.clone());
        let cache = Arc::new(OfferCache::new(
            Arc::new(NoProvider),
            history,
            clock.clone(),
            OfferCacheConfig::default(),
        ));

        let now = clock.now();
        let offer = Offer {
            id: "off_stale".into(),
            origin: "BRU".into(),
            destination: "BCN".into(),
            departure_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            return_date: None,
            total_amount: Decimal::from(140),
            currency: "EUR".into(),
            cabin_class: Default::default(),
            stops: 0,
            carrier: "SN".into(),
            conditions: Default::default(),
            created_at: now,
            expires_at: now + Duration::minutes(30),
        };
        cache.put(&[offer], PriceSource::Search).await;
        clock.advance(Duration::hours(1));

        let summary = MaintenanceJob::new(cache.clone(), 365).run().await.unwrap();
        assert_eq!(summary.history_pruned, 0);
        assert_eq!(summary.offers_purged, 1);
        assert!(cache.is_empty());
    }
}
