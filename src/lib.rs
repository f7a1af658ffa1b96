pub mod alerts;
pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod provider;
pub mod services;
pub mod wheel;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::alerts::{AlertEvaluator, AlertManager};
use crate::clock::SharedClock;
use crate::config::AppConfig;
use crate::db::{
    AlertRepository, CatalogRepository, OfferRepository, PriceHistoryRepository, SpinRepository,
    StoreHealth,
};
use crate::pricing::{OfferCache, PriceHistory};
use crate::provider::OfferProvider;
use crate::services::jobs::{AlertSweepJob, MaintenanceJob};
use crate::services::notifier::Notifier;
use crate::services::scheduler::{Schedule, Scheduler, TaskHandle};
use crate::wheel::WheelSelector;

/// The pricing core, wired to one store, provider, notifier and clock.
#[derive(Clone)]
pub struct Components {
    pub health: Arc<dyn StoreHealth>,
    pub cache: Arc<OfferCache>,
    pub evaluator: Arc<AlertEvaluator>,
    pub alerts: AlertManager,
    pub wheel: Arc<WheelSelector>,
}

impl Components {
    /// Build every component over `store`. With a `DATABASE_URL` configured
    /// the offer cache also writes through to the store.
    pub fn build<S>(
        store: Arc<S>,
        provider: Arc<dyn OfferProvider>,
        notifier: Arc<dyn Notifier>,
        clock: SharedClock,
        config: &AppConfig,
    ) -> Self
    where
        S: OfferRepository
            + PriceHistoryRepository
            + AlertRepository
            + CatalogRepository
            + SpinRepository
            + StoreHealth
            + 'static,
    {
        let history = PriceHistory::new(store.clone(), clock.clone());
        let mut cache = OfferCache::new(provider, history, clock.clone(), config.cache.clone());
        if config.database_url.is_some() {
            cache = cache.with_persistence(store.clone());
        }
        let cache = Arc::new(cache);

        let evaluator = Arc::new(AlertEvaluator::new(
            store.clone(),
            cache.clone(),
            notifier,
            clock.clone(),
            config.alerts.clone(),
        ));
        let wheel = Arc::new(WheelSelector::new(
            store.clone(),
            store.clone(),
            cache.clone(),
            clock.clone(),
            config.wheel.clone(),
        ));

        Self {
            alerts: AlertManager::new(store.clone(), clock),
            health: store,
            cache,
            evaluator,
            wheel,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub components: Components,
    pub alert_sweep: TaskHandle<AlertSweepJob>,
    pub maintenance: TaskHandle<MaintenanceJob>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Start both scheduled tasks on `scheduler` and assemble the HTTP state.
    pub fn start(
        config: AppConfig,
        components: Components,
        scheduler: &Scheduler,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let alert_sweep = scheduler.spawn(
            Arc::new(AlertSweepJob::new(components.evaluator.clone())),
            Schedule::Every {
                interval: config.schedule.alert_sweep_interval,
                run_at_start: config.schedule.sweep_at_start,
            },
        );
        let maintenance = scheduler.spawn(
            Arc::new(MaintenanceJob::new(
                components.cache.clone(),
                config.schedule.retention_days,
            )),
            Schedule::DailyAt {
                hour: config.schedule.prune_hour,
                minute: config.schedule.prune_minute,
            },
        );

        Self {
            config,
            components,
            alert_sweep,
            maintenance,
            metrics_handle,
        }
    }
}
