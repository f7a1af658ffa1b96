use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::{Clock, SharedClock};
use crate::db::AlertRepository;
use crate::errors::{CoreError, CoreResult};
use crate::models::{Alert, AlertKind, Offer, PriceSource, SearchQuery};
use crate::pricing::OfferCache;
use crate::services::notifier::{format_alert_notification, AlertReason, Notifier};

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Minimum time between two notifications for one alert.
    pub cooldown: Duration,
    /// Alerts evaluated at once during a sweep.
    pub concurrency: usize,
    /// Departure offset used when an alert has no fixed date.
    pub default_lead_days: i64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(24),
            concurrency: 8,
            default_lead_days: 30,
        }
    }
}

/// Result of checking one alert.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// Notified within the cooldown window; nothing was done.
    Cooldown,
    /// No current offers for the route (or the search failed).
    NoOffers,
    /// Offers exist but the alert's condition does not hold.
    NotTriggered { reference_price: Decimal },
    Notified { reference_price: Decimal, reason: AlertReason },
}

/// Totals of one sweep across all active alerts.
///
/// `checked` counts alerts evaluated past the cooldown gate; `skipped`
/// counts those still in cooldown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub checked: usize,
    pub notified: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct AlertEvaluator {
    alerts: Arc<dyn AlertRepository>,
    cache: Arc<OfferCache>,
    notifier: Arc<dyn Notifier>,
    clock: SharedClock,
    config: EvaluatorConfig,
}

impl AlertEvaluator {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        cache: Arc<OfferCache>,
        notifier: Arc<dyn Notifier>,
        clock: SharedClock,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            alerts,
            cache,
            notifier,
            clock,
            config,
        }
    }

    /// Evaluate every active alert with bounded concurrency. One alert's
    /// failure is logged and counted, never propagated.
    pub async fn sweep(&self) -> CoreResult<SweepSummary> {
        let started = Instant::now();
        let active = self.alerts.active_alerts().await.map_err(CoreError::Persistence)?;
        let total = active.len();

        let results: Vec<(Uuid, CoreResult<AlertOutcome>)> = stream::iter(active)
            .map(|alert| async move {
                let outcome = self.check(&alert).await;
                (alert.id, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut summary = SweepSummary::default();
        for (alert_id, result) in results {
            match result {
                Ok(AlertOutcome::Cooldown) => summary.skipped += 1,
                Ok(AlertOutcome::Notified { .. }) => {
                    summary.checked += 1;
                    summary.notified += 1;
                }
                Ok(_) => summary.checked += 1,
                Err(e) => {
                    summary.checked += 1;
                    summary.failed += 1;
                    tracing::error!(%alert_id, error = %e, "Alert evaluation failed");
                }
            }
        }

        histogram!("alert_sweep_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            active = total,
            checked = summary.checked,
            notified = summary.notified,
            skipped = summary.skipped,
            failed = summary.failed,
            "Alert sweep complete"
        );
        Ok(summary)
    }

    /// Check a single alert: cooldown gate, evaluation, then bookkeeping.
    /// `last_checked_at` is updated whenever the cooldown gate is passed,
    /// including when evaluation fails.
    pub async fn check(&self, alert: &Alert) -> CoreResult<AlertOutcome> {
        let now = self.clock.now();
        if alert.in_cooldown(now, self.config.cooldown) {
            tracing::debug!(alert_id = %alert.id, "Alert in cooldown");
            return Ok(AlertOutcome::Cooldown);
        }

        counter!("alerts_checked_total").increment(1);
        let outcome = self.evaluate(alert, now).await;

        if let Err(e) = self.alerts.mark_checked(alert.id, now).await {
            tracing::warn!(alert_id = %alert.id, error = %e, "Failed to stamp last_checked_at");
        }
        outcome
    }

    async fn evaluate(&self, alert: &Alert, now: DateTime<Utc>) -> CoreResult<AlertOutcome> {
        let offers = self.current_offers(alert, now).await;
        let Some(cheapest) = offers.first() else {
            return Ok(AlertOutcome::NoOffers);
        };
        let reference_price = cheapest.total_amount;

        let history = self.cache.history();
        let (reason, stats) = match &alert.kind {
            AlertKind::PriceThreshold { max_price } => {
                let reason = (reference_price <= *max_price)
                    .then_some(AlertReason::BelowThreshold { max_price: *max_price });
                (reason, None)
            }
            AlertKind::PriceDrop { drop_percent } => {
                let stats = history.statistics(&alert.route_key, None).await?;
                let reason = stats.as_ref().and_then(|s| {
                    if s.average_30d <= Decimal::ZERO {
                        return None;
                    }
                    let drop = (s.average_30d - reference_price) / s.average_30d * Decimal::ONE_HUNDRED;
                    (drop >= *drop_percent).then_some(AlertReason::DroppedBelowAverage {
                        drop_percent: drop,
                        average_30d: s.average_30d,
                    })
                });
                (reason, stats)
            }
            AlertKind::GoodDeal => {
                let stats = history.statistics(&alert.route_key, Some(reference_price)).await?;
                let reason = stats.as_ref().and_then(|s| {
                    s.recommendation.is_deal().then_some(AlertReason::GoodDeal {
                        recommendation: s.recommendation,
                        percentile: s.percentile,
                    })
                });
                (reason, stats)
            }
        };

        let Some(reason) = reason else {
            return Ok(AlertOutcome::NotTriggered { reference_price });
        };

        // No stamp, no notification.
        self.alerts
            .mark_notified(alert.id, now)
            .await
            .map_err(CoreError::Persistence)?;

        let notification = format_alert_notification(alert, cheapest, &reason, stats.as_ref());
        if let Err(e) = self.notifier.send(&notification).await {
            tracing::warn!(alert_id = %alert.id, error = %e, "Alert notification failed");
        }

        counter!("alerts_fired_total", "kind" => alert.kind.as_str()).increment(1);
        tracing::info!(
            alert_id = %alert.id,
            route = %alert.route_key,
            price = %reference_price,
            kind = alert.kind.as_str(),
            "Alert fired"
        );

        Ok(AlertOutcome::Notified {
            reference_price,
            reason,
        })
    }

    /// Cached offers first; a provider search only when the cache has none.
    async fn current_offers(&self, alert: &Alert, now: DateTime<Utc>) -> Vec<Offer> {
        let mut cached = self.cache.best_for(&alert.origin, &alert.destination).await;
        if let Some(date) = alert.departure_date {
            cached.retain(|o| o.departure_date == date);
        }
        if !cached.is_empty() {
            return cached;
        }

        let departure = alert
            .departure_date
            .unwrap_or_else(|| (now + Duration::days(self.config.default_lead_days)).date_naive());
        let query = match SearchQuery::one_way(&alert.origin, &alert.destination, departure) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(alert_id = %alert.id, error = %e, "Alert route not searchable");
                return Vec::new();
            }
        };

        match self.cache.search(&query, PriceSource::Alert).await {
            Ok(offers) => offers,
            Err(e) => {
                tracing::warn!(alert_id = %alert.id, error = %e, "Alert offer search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::MemoryStore;
    use crate::models::{CabinClass, FareConditions, NewAlert};
    use crate::pricing::{OfferCacheConfig, PriceHistory};
    use crate::provider::OfferProvider;
    use crate::services::notifier::Notification;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Mutex;

    struct FixedPriceProvider {
        price: Mutex<Option<Decimal>>,
        clock: Arc<ManualClock>,
    }

    #[async_trait]
    impl OfferProvider for FixedPriceProvider {
        async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<Offer>> {
            let price = *self.price.lock().unwrap();
            let Some(price) = price else {
                anyhow::bail!("provider down");
            };
            let now = self.clock.now();
            Ok(vec![Offer {
                id: format!("off_{}_{}", query.destination, now.timestamp()),
                origin: query.origin.clone(),
                destination: query.destination.clone(),
                departure_date: query.departure_date,
                return_date: None,
                total_amount: price,
                currency: "EUR".into(),
                cabin_class: CabinClass::Economy,
                stops: 0,
                carrier: "SN".into(),
                conditions: FareConditions::default(),
                created_at: now,
                expires_at: now + Duration::minutes(30),
            }])
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Fixture {
        evaluator: AlertEvaluator,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        provider: Arc<FixedPriceProvider>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(price: i64) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 6, 0, 0).unwrap()));
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FixedPriceProvider {
            price: Mutex::new(Some(Decimal::from(price))),
            clock: clock.clone(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let cache = Arc::new(OfferCache::new(
            provider.clone(),
            PriceHistory::new(store.clone(), clock.clone()),
            clock.clone(),
            OfferCacheConfig::default(),
        ));
        let evaluator = AlertEvaluator::new(
            store.clone(),
            cache,
            notifier.clone(),
            clock.clone(),
            EvaluatorConfig::default(),
        );
        Fixture {
            evaluator,
            store,
            clock,
            provider,
            notifier,
        }
    }

    async fn threshold_alert(f: &Fixture, max_price: i64) -> Alert {
        let alert = NewAlert {
            user_id: "user-1".into(),
            origin: "BRU".into(),
            destination: "BCN".into(),
            departure_date: NaiveDate::from_ymd_opt(2026, 11, 1),
            kind: AlertKind::PriceThreshold {
                max_price: Decimal::from(max_price),
            },
        }
        .into_alert(f.clock.now())
        .unwrap();
        f.store.insert_alert(&alert).await.unwrap();
        alert
    }

    #[tokio::test]
    async fn test_threshold_fires_at_140() {
        let f = fixture(140);
        let alert = threshold_alert(&f, 150).await;

        let outcome = f.evaluator.check(&alert).await.unwrap();
        assert!(matches!(outcome, AlertOutcome::Notified { .. }));

        let stored = f.store.get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.last_notified_at, Some(f.clock.now()));
        assert_eq!(stored.last_checked_at, Some(f.clock.now()));

        let sent = f.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, "user-1");
        assert_eq!(sent[0].data["routeKey"], "BRU-BCN");
    }

    #[tokio::test]
    async fn test_threshold_silent_at_160() {
        let f = fixture(160);
        let alert = threshold_alert(&f, 150).await;

        let outcome = f.evaluator.check(&alert).await.unwrap();
        assert_eq!(
            outcome,
            AlertOutcome::NotTriggered {
                reference_price: Decimal::from(160)
            }
        );
        let stored = f.store.get_alert(alert.id).await.unwrap().unwrap();
        assert!(stored.last_notified_at.is_none());
        assert!(stored.last_checked_at.is_some());
        assert!(f.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_blocks_then_expires() {
        let f = fixture(140);
        let mut alert = threshold_alert(&f, 150).await;
        alert.last_notified_at = Some(f.clock.now() - Duration::hours(1));

        assert_eq!(f.evaluator.check(&alert).await.unwrap(), AlertOutcome::Cooldown);
        let stored = f.store.get_alert(alert.id).await.unwrap().unwrap();
        assert!(stored.last_checked_at.is_none());

        alert.last_notified_at = Some(f.clock.now() - Duration::hours(25));
        assert!(matches!(
            f.evaluator.check(&alert).await.unwrap(),
            AlertOutcome::Notified { .. }
        ));
    }

    #[tokio::test]
    async fn test_sweep_never_double_notifies_within_cooldown() {
        let f = fixture(140);
        threshold_alert(&f, 150).await;

        let first = f.evaluator.sweep().await.unwrap();
        assert_eq!(first.notified, 1);

        f.clock.advance(Duration::hours(2));
        let second = f.evaluator.sweep().await.unwrap();
        assert_eq!(second.notified, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(f.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_no_offers() {
        let f = fixture(140);
        *f.provider.price.lock().unwrap() = None;
        let alert = threshold_alert(&f, 150).await;

        assert_eq!(f.evaluator.check(&alert).await.unwrap(), AlertOutcome::NoOffers);
        let summary = f.evaluator.sweep().await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_price_drop_against_thirty_day_average() {
        let f = fixture(200);
        let alert = NewAlert {
            user_id: "user-2".into(),
            origin: "BRU".into(),
            destination: "BCN".into(),
            departure_date: None,
            kind: AlertKind::PriceDrop {
                drop_percent: Decimal::from(20),
            },
        }
        .into_alert(f.clock.now())
        .unwrap();
        f.store.insert_alert(&alert).await.unwrap();

        // Builds a history of 200s.
        for _ in 0..4 {
            let outcome = f.evaluator.check(&alert).await.unwrap();
            assert!(matches!(outcome, AlertOutcome::NotTriggered { .. }));
            f.clock.advance(Duration::hours(1));
        }

        *f.provider.price.lock().unwrap() = Some(Decimal::from(100));
        // Average is now (4 * 200 + 100) / 5 = 180; 100 is 44% below it.
        let outcome = f.evaluator.check(&alert).await.unwrap();
        assert!(matches!(
            outcome,
            AlertOutcome::Notified {
                reason: AlertReason::DroppedBelowAverage { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_good_deal_uses_recommendation() {
        let f = fixture(300);
        let alert = NewAlert {
            user_id: "user-3".into(),
            origin: "BRU".into(),
            destination: "BCN".into(),
            departure_date: None,
            kind: AlertKind::GoodDeal,
        }
        .into_alert(f.clock.now())
        .unwrap();

        for _ in 0..6 {
            f.evaluator.check(&alert).await.unwrap();
            f.clock.advance(Duration::hours(1));
        }
        assert!(f.notifier.sent.lock().unwrap().is_empty());

        *f.provider.price.lock().unwrap() = Some(Decimal::from(120));
        let outcome = f.evaluator.check(&alert).await.unwrap();
        assert!(matches!(
            outcome,
            AlertOutcome::Notified {
                reason: AlertReason::GoodDeal { .. },
                ..
            }
        ));
    }

    /// Alert store whose `mark_notified` always fails.
    struct StampFailingAlerts(Arc<MemoryStore>);

    #[async_trait]
    impl AlertRepository for StampFailingAlerts {
        async fn insert_alert(&self, alert: &Alert) -> anyhow::Result<()> {
            self.0.insert_alert(alert).await
        }

        async fn get_alert(&self, id: Uuid) -> anyhow::Result<Option<Alert>> {
            self.0.get_alert(id).await
        }

        async fn alerts_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Alert>> {
            self.0.alerts_for_user(user_id).await
        }

        async fn active_alerts(&self) -> anyhow::Result<Vec<Alert>> {
            self.0.active_alerts().await
        }

        async fn set_alert_active(&self, id: Uuid, is_active: bool) -> anyhow::Result<bool> {
            self.0.set_alert_active(id, is_active).await
        }

        async fn delete_alert(&self, id: Uuid) -> anyhow::Result<bool> {
            self.0.delete_alert(id).await
        }

        async fn mark_checked(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
            self.0.mark_checked(id, at).await
        }

        async fn mark_notified(&self, _id: Uuid, _at: DateTime<Utc>) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }
    }

    #[tokio::test]
    async fn test_failed_notified_stamp_sends_nothing() {
        let f = fixture(140);
        threshold_alert(&f, 150).await;
        let cache = Arc::new(OfferCache::new(
            f.provider.clone(),
            PriceHistory::new(f.store.clone(), f.clock.clone()),
            f.clock.clone(),
            OfferCacheConfig::default(),
        ));
        let evaluator = AlertEvaluator::new(
            Arc::new(StampFailingAlerts(f.store.clone())),
            cache,
            f.notifier.clone(),
            f.clock.clone(),
            EvaluatorConfig::default(),
        );

        let first = evaluator.sweep().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(first.notified, 0);

        f.clock.advance(Duration::hours(1));
        let second = evaluator.sweep().await.unwrap();
        assert_eq!(second.failed, 1);

        assert!(f.notifier.sent.lock().unwrap().is_empty());
        let stored = f.store.active_alerts().await.unwrap().remove(0);
        assert!(stored.last_notified_at.is_none());
        assert_eq!(stored.last_checked_at, Some(f.clock.now()));
    }
}
