//! In-memory [`GeoDataGateway`] for pipeline tests.
//!
//! Every call sleeps for the configured latency (use `tokio::time::pause` to
//! make that deterministic), tracks how many calls are in flight, and records
//! its start and finish instants.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use nws_client::{
    AlertBatch, Forecast, GeoDataGateway, GridPoint, RadarEndpoints, RainViewerIndex,
};

use crate::fixtures;

/// One completed gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCall {
    pub endpoint: &'static str,
    /// Location key (`"lat,lon"`) or empty for global endpoints.
    pub key: String,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct Failures {
    grid_points: HashSet<String>,
    forecasts: HashSet<String>,
    hourly: HashSet<String>,
}

pub struct FakeGateway {
    latency: Duration,
    latency_overrides: Mutex<HashMap<String, Duration>>,
    failures: Mutex<Failures>,
    grid_cells: Mutex<HashMap<String, (f64, f64)>>,
    alerts: Mutex<Option<AlertBatch>>,
    radar: Mutex<Option<RainViewerIndex>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<GatewayCall>>,
}

fn key(latitude: f64, longitude: f64) -> String {
    format!("{:.4},{:.4}", latitude, longitude)
}

impl FakeGateway {
    /// A gateway answering every call successfully after `latency`, with an
    /// empty alert feed and a valid radar index.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            latency_overrides: Mutex::new(HashMap::new()),
            failures: Mutex::new(Failures::default()),
            grid_cells: Mutex::new(HashMap::new()),
            alerts: Mutex::new(Some(fixtures::alert_batch(Vec::new()))),
            radar: Mutex::new(Some(fixtures::radar_index())),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Slow down every call made for one location.
    pub fn with_latency_for(self, latitude: f64, longitude: f64, latency: Duration) -> Self {
        self.latency_overrides
            .lock()
            .unwrap()
            .insert(key(latitude, longitude), latency);
        self
    }

    pub fn fail_grid_point(&self, latitude: f64, longitude: f64) {
        self.failures.lock().unwrap().grid_points.insert(key(latitude, longitude));
    }

    pub fn fail_forecast(&self, latitude: f64, longitude: f64) {
        self.failures.lock().unwrap().forecasts.insert(key(latitude, longitude));
    }

    pub fn fail_hourly(&self, latitude: f64, longitude: f64) {
        self.failures.lock().unwrap().hourly.insert(key(latitude, longitude));
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        *self.failures.lock().unwrap() = Failures::default();
    }

    /// Replace the alert feed; `None` makes the alerts call fail.
    pub fn set_alerts(&self, alerts: Option<AlertBatch>) {
        *self.alerts.lock().unwrap() = alerts;
    }

    /// Replace the radar index; `None` makes the index call fail.
    pub fn set_radar_index(&self, index: Option<RainViewerIndex>) {
        *self.radar.lock().unwrap() = index;
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }

    async fn call<T>(&self, endpoint: &'static str, key: String, result: impl FnOnce() -> Option<T>) -> Option<T> {
        let started = Instant::now();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self
            .latency_overrides
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or(self.latency);
        tokio::time::sleep(latency).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(GatewayCall {
            endpoint,
            key,
            started,
            finished: Instant::now(),
        });
        result()
    }

    fn cell_key(&self, point: &GridPoint) -> Option<(String, (f64, f64))> {
        let cells = self.grid_cells.lock().unwrap();
        let (lat, lon) = *cells.get(&point.grid_id)?;
        Some((key(lat, lon), (lat, lon)))
    }
}

#[async_trait]
impl GeoDataGateway for FakeGateway {
    async fn grid_point(&self, latitude: f64, longitude: f64) -> Option<GridPoint> {
        let k = key(latitude, longitude);
        let failed = self.failures.lock().unwrap().grid_points.contains(&k);
        self.call("points", k.clone(), || {
            if failed {
                return None;
            }
            let grid_id = format!("G{}", k);
            self.grid_cells
                .lock()
                .unwrap()
                .insert(grid_id.clone(), (latitude, longitude));
            Some(fixtures::grid_point(&grid_id, 10, 20))
        })
        .await
    }

    async fn forecast(&self, point: &GridPoint) -> Option<Forecast> {
        let (k, (lat, lon)) = self.cell_key(point)?;
        let failed = self.failures.lock().unwrap().forecasts.contains(&k);
        self.call("forecast", k, || {
            (!failed).then(|| fixtures::forecast_at(lon, lat))
        })
        .await
    }

    async fn hourly_forecast(&self, point: &GridPoint) -> Option<Forecast> {
        let (k, _) = self.cell_key(point)?;
        let failed = self.failures.lock().unwrap().hourly.contains(&k);
        self.call("forecast_hourly", k, || {
            (!failed).then(|| fixtures::hourly_forecast(12))
        })
        .await
    }

    async fn active_alerts(&self) -> Option<AlertBatch> {
        let alerts = self.alerts.lock().unwrap().clone();
        self.call("alerts", String::new(), || alerts).await
    }

    async fn radar_index(&self) -> Option<RainViewerIndex> {
        let index = self.radar.lock().unwrap().clone();
        self.call("radar_index", String::new(), || index).await
    }

    fn radar_endpoints(&self) -> RadarEndpoints {
        RadarEndpoints::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_chain_and_failure_injection() {
        let gw = FakeGateway::new(Duration::from_millis(100));
        gw.fail_forecast(1.0, 2.0);

        let point = gw.grid_point(1.0, 2.0).await.unwrap();
        assert!(gw.forecast(&point).await.is_none());
        assert!(gw.hourly_forecast(&point).await.is_some());

        gw.heal();
        assert!(gw.forecast(&point).await.is_some());
        assert_eq!(gw.calls().len(), 4);
        assert_eq!(gw.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_tracking() {
        let gw = FakeGateway::new(Duration::from_millis(50));
        let (a, b) = tokio::join!(gw.grid_point(1.0, 1.0), gw.grid_point(2.0, 2.0));
        assert!(a.is_some() && b.is_some());
        assert_eq!(gw.max_in_flight(), 2);
    }
}
