use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use farewheel::api::create_router;
use farewheel::clock::{Clock, ManualClock};
use farewheel::config::AppConfig;
use farewheel::db::MemoryStore;
use farewheel::models::{Airport, Destination, Offer, SearchQuery};
use farewheel::provider::OfferProvider;
use farewheel::services::notifier::{Notification, Notifier};
use farewheel::services::scheduler::Scheduler;
use farewheel::{AppState, Components};

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// 2026-10-01 08:00 UTC, the frozen "now" of every test app.
#[allow(dead_code)]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
}

/// Offer provider returning four fares per destination airport, starting at
/// the scripted price in steps of 25. Unscripted destinations fail.
pub struct ScriptedProvider {
    prices: Mutex<HashMap<String, i64>>,
    clock: Arc<ManualClock>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(clock: Arc<ManualClock>, prices: &[(&str, i64)]) -> Self {
        Self {
            prices: Mutex::new(prices.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
            clock,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_price(&self, destination: &str, price: i64) {
        self.prices.lock().unwrap().insert(destination.to_string(), price);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfferProvider for ScriptedProvider {
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<Offer>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let price = self
            .prices
            .lock()
            .unwrap()
            .get(&query.destination)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no fares to {}", query.destination))?;

        let now = self.clock.now();
        Ok((0..4)
            .map(|i| Offer {
                id: format!("off_{}_{}_{}_{i}", query.origin, query.destination, query.departure_date),
                origin: query.origin.clone(),
                destination: query.destination.clone(),
                departure_date: query.departure_date,
                return_date: query.return_date,
                total_amount: Decimal::from(price + i * 25),
                currency: "EUR".into(),
                cabin_class: Default::default(),
                stops: 0,
                carrier: "SN".into(),
                conditions: Default::default(),
                created_at: now,
                expires_at: now + Duration::minutes(30),
            })
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[allow(dead_code)]
pub fn airport(iata: &str, lat: f64, lng: f64) -> Airport {
    Airport {
        iata: iata.into(),
        name: format!("{iata} International"),
        city: String::new(),
        country: String::new(),
        latitude: lat,
        longitude: lng,
        is_active: true,
    }
}

#[allow(dead_code)]
pub fn destination(name: &str, iata: Option<&str>, budget: i64) -> Destination {
    Destination {
        id: Uuid::new_v4(),
        name: name.into(),
        country: "XX".into(),
        slug: name.to_lowercase(),
        primary_airport_iata: iata.map(String::from),
        typical_budget: Some(Decimal::from(budget)),
        is_published: true,
        is_featured: true,
    }
}

/// Store with BRU and AMS active and three featured destinations.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_airport(airport("BRU", 50.9014, 4.4844));
    store.add_airport(airport("AMS", 52.3105, 4.7683));
    store.add_destination(destination("Barcelona", Some("BCN"), 300));
    store.add_destination(destination("Lisbon", Some("LIS"), 400));
    store.add_destination(destination("Rome", Some("FCO"), 350));
    store
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.admin_token = Some(ADMIN_TOKEN.into());
    config.port = 0;
    config.schedule.sweep_at_start = false;
    config
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub scheduler: Scheduler,
}

/// Full application over the in-memory store with scripted fares.
pub fn build_app(prices: &[(&str, i64)]) -> TestApp {
    build_app_with(test_config(), seeded_store(), prices)
}

#[allow(dead_code)]
pub fn build_app_with(config: AppConfig, store: Arc<MemoryStore>, prices: &[(&str, i64)]) -> TestApp {
    let clock = Arc::new(ManualClock::new(start_time()));
    let provider = Arc::new(ScriptedProvider::new(clock.clone(), prices));
    let notifier = Arc::new(RecordingNotifier::default());
    let metrics_handle = farewheel::metrics::init_metrics().expect("metrics recorder");

    let components = Components::build(
        store.clone(),
        provider.clone(),
        notifier.clone(),
        clock.clone(),
        &config,
    );
    let scheduler = Scheduler::new(clock.clone());
    let state = AppState::start(config, components, &scheduler, metrics_handle);

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        provider,
        notifier,
        clock,
        scheduler,
    }
}

#[allow(dead_code)]
pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}
