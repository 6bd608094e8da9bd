//! Scheduling tests for the staggered loader and the session load phases.
//!
//! All tests run on paused tokio time, so latencies and delays are exact.

use std::sync::Arc;
use std::time::Duration;

use layer_engine::{
    HeadlessMap, InfoPanelState, LoaderConfig, MapSession, SessionConfig, StaggeredLoader,
};
use map_common::LayerKind;
use test_utils::fixtures::sample_locations;
use test_utils::FakeGateway;

fn chain_calls(gw: &FakeGateway) -> Vec<test_utils::GatewayCall> {
    let mut calls: Vec<_> = gw
        .calls()
        .into_iter()
        .filter(|c| matches!(c.endpoint, "points" | "forecast" | "forecast_hourly"))
        .collect();
    calls.sort_by_key(|c| c.started);
    calls
}

// ============================================================================
// Batch concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_batch_size() {
    let gw = Arc::new(
        FakeGateway::new(Duration::from_millis(100))
            // uneven latencies so batch members settle out of order
            .with_latency_for(47.6062, -122.3321, Duration::from_millis(400))
            .with_latency_for(25.7617, -80.1918, Duration::from_millis(250)),
    );
    let loader = StaggeredLoader::new(gw.clone(), LoaderConfig::default());

    let mut order = Vec::new();
    let summary = loader
        .load_forecasts(&sample_locations(7), |loaded| order.push(loaded.location.name))
        .await;

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.loaded, 7);
    assert!(gw.max_in_flight() <= 3, "max in flight {}", gw.max_in_flight());
    // Seattle is slow, so it settles last in its batch
    assert_eq!(order[2], "Seattle");
    assert_eq!(order.len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_next_batch_starts_after_previous_settles_plus_delay() {
    let gw = Arc::new(
        FakeGateway::new(Duration::from_millis(100))
            .with_latency_for(44.9778, -93.2650, Duration::from_millis(700)),
    );
    let config = LoaderConfig::default();
    let loader = StaggeredLoader::new(gw.clone(), config.clone());
    let locations = sample_locations(6);

    loader.load_forecasts(&locations, |_| {}).await;

    let calls = chain_calls(&gw);
    let key = |i: usize| format!("{:.4},{:.4}", locations[i].latitude, locations[i].longitude);

    let batch_end = calls
        .iter()
        .filter(|c| (0..3).any(|i| c.key == key(i)))
        .map(|c| c.finished)
        .max()
        .unwrap();
    let next_start = calls
        .iter()
        .filter(|c| (3..6).any(|i| c.key == key(i)))
        .map(|c| c.started)
        .min()
        .unwrap();

    assert!(next_start >= batch_end + config.batch_delay());
    // Minneapolis' three slow calls dominate the first batch
    assert_eq!(next_start - calls[0].started, Duration::from_millis(2100 + 1000));
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_grid_point_is_omitted_from_batch() {
    let gw = Arc::new(FakeGateway::new(Duration::from_millis(50)));
    let locations = sample_locations(3);
    gw.fail_grid_point(locations[1].latitude, locations[1].longitude);

    let session = MapSession::new(
        gw.clone(),
        HeadlessMap::new(),
        Arc::new(InfoPanelState::new()),
        SessionConfig {
            locations: locations.clone(),
            ..Default::default()
        },
    );
    let summary = session.load_forecast_layers().await;

    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.skipped, 1);
    session.with_registry(|r| {
        assert_eq!(r.forecast_count(), 2);
        assert!(!r.has_forecast(&locations[1].name));
        assert_eq!(r.backend().overlay_count(), 2);
    });
    // no forecast was requested for the failed location
    assert_eq!(gw.calls_to("forecast").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_retries_missing_forecasts() {
    let gw = Arc::new(FakeGateway::new(Duration::from_millis(50)));
    let locations = sample_locations(3);
    gw.fail_forecast(locations[2].latitude, locations[2].longitude);

    let session = MapSession::new(
        gw.clone(),
        HeadlessMap::new(),
        Arc::new(InfoPanelState::new()),
        SessionConfig {
            locations: locations.clone(),
            retry_missing: true,
            ..Default::default()
        },
    );
    session.load_forecast_layers().await;
    assert_eq!(session.with_registry(|r| r.forecast_count()), 2);

    gw.heal();
    let summary = session.refresh().await;
    assert_eq!(summary.forecasts.loaded, 1);
    assert_eq!(summary.radars_added, 2);
    assert_eq!(session.with_registry(|r| r.forecast_count()), 3);
}

// ============================================================================
// Phase staggering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_phases_start_in_configured_order() {
    let gw = Arc::new(FakeGateway::new(Duration::from_millis(10)));
    let session = MapSession::new(
        gw.clone(),
        HeadlessMap::new(),
        Arc::new(InfoPanelState::new()),
        SessionConfig {
            locations: sample_locations(1),
            ..Default::default()
        },
    );
    session.load_layers().await;

    let first_start = |endpoint: &str| gw.calls_to(endpoint).first().map(|c| c.started).unwrap();
    let points = first_start("points");
    let alerts = first_start("alerts");
    let radar = first_start("radar_index");
    assert!(points < alerts && alerts < radar);
    assert_eq!(alerts - points, Duration::from_millis(500));
    assert_eq!(radar - points, Duration::from_millis(1500));

    assert_eq!(session.store().get_visible(LayerKind::Radar).len(), 1);
}
