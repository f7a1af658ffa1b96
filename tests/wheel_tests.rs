mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use farewheel::db::MemoryStore;
use farewheel::errors::CoreError;
use farewheel::models::{BudgetPreference, PriceBadge};
use farewheel::wheel::{SpinPreferences, SpinRequest};

use common::{airport, build_app, build_app_with, destination, test_config};

const ALL_FARES: &[(&str, i64)] = &[("BCN", 120), ("LIS", 180), ("FCO", 150), ("JFK", 650)];

#[tokio::test]
async fn test_spin_from_coordinates_uses_nearest_airport() {
    let app = build_app(ALL_FARES);

    // Central Amsterdam
    let request = SpinRequest {
        lat: Some(52.37),
        lng: Some(4.90),
        ..SpinRequest::default()
    };
    let result = app.state.components.wheel.spin(request).await.unwrap();

    assert_eq!(result.origin_airport, "AMS");
    for candidate in &result.destinations {
        assert!(candidate.offers.iter().all(|o| o.origin == "AMS"));
    }
}

#[tokio::test]
async fn test_unknown_home_airport_falls_back() {
    let app = build_app(ALL_FARES);

    let request = SpinRequest {
        home_airport_iata: Some("XXX".into()),
        ..SpinRequest::default()
    };
    let result = app.state.components.wheel.spin(request).await.unwrap();
    assert_eq!(result.origin_airport, "BRU");
}

#[tokio::test]
async fn test_unroutable_destinations_never_drawn() {
    let store = Arc::new(MemoryStore::new());
    store.add_airport(airport("BRU", 50.9014, 4.4844));
    store.add_destination(destination("Brussels", Some("BRU"), 100));
    store.add_destination(destination("Atlantis", None, 100));
    store.add_destination(destination("Barcelona", Some("BCN"), 300));
    let app = build_app_with(test_config(), store, ALL_FARES);

    for _ in 0..5 {
        let result = app.state.components.wheel.spin(SpinRequest::default()).await.unwrap();
        assert_eq!(result.destinations.len(), 1);
        assert_eq!(result.destinations[0].destination.name, "Barcelona");
    }
}

#[tokio::test]
async fn test_budget_preference_filters_destinations() {
    let store = common::seeded_store();
    store.add_destination(destination("New York", Some("JFK"), 900));
    let app = build_app_with(test_config(), store, ALL_FARES);

    let request = SpinRequest {
        preferences: SpinPreferences {
            budget: Some(BudgetPreference::Medium),
        },
        ..SpinRequest::default()
    };
    let result = app.state.components.wheel.spin(request).await.unwrap();

    assert_eq!(result.destinations.len(), 1);
    assert_eq!(result.destinations[0].destination.name, "New York");
    assert_eq!(result.destinations[0].offers[0].total_amount, Decimal::from(650));
}

#[tokio::test]
async fn test_repeat_spin_reuses_recent_searches() {
    let app = build_app(ALL_FARES);
    let wheel = &app.state.components.wheel;

    wheel.spin(SpinRequest::default()).await.unwrap();
    let calls = app.provider.call_count();
    assert_eq!(calls, 3);

    wheel.spin(SpinRequest::default()).await.unwrap();
    assert_eq!(app.provider.call_count(), calls);
    assert_eq!(app.store.spins().len(), 2);
}

#[tokio::test]
async fn test_badge_reflects_route_history() {
    let app = build_app(ALL_FARES);
    let wheel = &app.state.components.wheel;

    // First spin: the fresh fares are the whole sample, cheapest sits at the bottom.
    let result = wheel.spin(SpinRequest::default()).await.unwrap();
    for candidate in &result.destinations {
        assert_eq!(candidate.price_badge, PriceBadge::Good);
        assert!(candidate.percentile.is_some());
    }
}

#[tokio::test]
async fn test_all_candidates_failing_is_an_error() {
    let app = build_app(&[]);

    let err = app
        .state
        .components
        .wheel
        .spin(SpinRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoPricedDestinations(ref origin) if origin == "BRU"));
    assert!(app.store.spins().is_empty());
}
