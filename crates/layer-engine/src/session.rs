//! A map session: one visibility store, one registry, one info panel, wired
//! to a gateway.
//!
//! Lock order: the visibility store may call into the registry (via its
//! subscriptions), so store mutations are never made while the registry lock
//! is held. Store reads are fine under the registry lock, since the store
//! releases its descriptor lock before publishing. Handles are created with
//! the visibility read under that lock, so a toggle either lands before the
//! read or is applied to the new handle by its subscriber afterwards.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, instrument, warn};

use map_common::{from_lon_lat, ForecastLocation, LayerKind, MapResult, RadarSource};
use nws_client::GeoDataGateway;

use crate::backend::MapBackend;
use crate::impact::{ImpactPolicy, LocationRecord};
use crate::info_panel::InfoPanel;
use crate::interaction::{ClickOutcome, InteractionController};
use crate::loader::{LoadPhase, LoadSummary, LoadedForecast, LoaderConfig, StaggeredLoader};
use crate::lock;
use crate::registry::{HitTarget, OverlayRegistry};
use crate::visibility::{LayerVisibilityStore, SubscriptionHandle};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub locations: Vec<ForecastLocation>,
    pub loader: LoaderConfig,
    pub impact: ImpactPolicy,
    /// Retry locations and radar sources without a layer on refresh.
    pub retry_missing: bool,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Event layers after the refresh, or `None` if the alert fetch failed.
    pub event_layers: Option<usize>,
    pub newly_impacted: usize,
    pub forecasts: LoadSummary,
    pub radars_added: usize,
}

struct SessionCore<G: GeoDataGateway + ?Sized, B: MapBackend, P: InfoPanel + ?Sized> {
    loader: StaggeredLoader<G>,
    store: Arc<LayerVisibilityStore>,
    registry: Mutex<OverlayRegistry<B>>,
    interaction: InteractionController<P>,
    panel: Arc<P>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    active: AtomicBool,
    config: SessionConfig,
}

pub struct MapSession<G: GeoDataGateway + ?Sized, B: MapBackend, P: InfoPanel + ?Sized> {
    core: Arc<SessionCore<G, B, P>>,
}

impl<G, B, P> Clone for MapSession<G, B, P>
where
    G: GeoDataGateway + ?Sized,
    B: MapBackend,
    P: InfoPanel + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<G, B, P> MapSession<G, B, P>
where
    G: GeoDataGateway + ?Sized + 'static,
    B: MapBackend + 'static,
    P: InfoPanel + ?Sized + 'static,
{
    /// Build a session and subscribe the registry to the visibility store.
    pub fn new(gateway: Arc<G>, backend: B, panel: Arc<P>, config: SessionConfig) -> Self {
        let store = Arc::new(LayerVisibilityStore::with_forecast_locations(&config.locations));
        let core = Arc::new(SessionCore {
            loader: StaggeredLoader::new(gateway, config.loader.clone()),
            store,
            registry: Mutex::new(OverlayRegistry::new(backend, config.impact)),
            interaction: InteractionController::new(panel.clone()),
            panel,
            subscriptions: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
            config,
        });

        let handles: Vec<SubscriptionHandle> = LayerKind::ALL
            .iter()
            .map(|&kind| {
                let weak: Weak<SessionCore<G, B, P>> = Arc::downgrade(&core);
                core.store.subscribe(kind, move |kind, descriptors| {
                    let Some(core) = weak.upgrade() else {
                        return;
                    };
                    if core.is_active() {
                        lock(&core.registry).apply_visibility(kind, descriptors);
                    }
                })
            })
            .collect();
        *lock(&core.subscriptions) = handles;

        Self { core }
    }

    pub fn store(&self) -> &Arc<LayerVisibilityStore> {
        &self.core.store
    }

    pub fn panel(&self) -> &Arc<P> {
        &self.core.panel
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Run `f` against the registry.
    pub fn with_registry<T>(&self, f: impl FnOnce(&OverlayRegistry<B>) -> T) -> T {
        f(&lock(&self.core.registry))
    }

    /// Snapshot of every location record.
    pub fn location_records(&self) -> Vec<LocationRecord> {
        self.with_registry(|r| r.all_records().cloned().collect())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load everything: forecasts immediately, then events and each radar
    /// source after their configured delays. Completes when all phases have.
    #[instrument(skip(self))]
    pub async fn load_layers(&self) {
        let delay = |phase| self.core.config.loader.phase_delay(phase);
        let forecasts = self.load_forecast_layers();
        let events = async {
            tokio::time::sleep(delay(LoadPhase::Events)).await;
            self.load_event_layers().await
        };
        let noaa = async {
            tokio::time::sleep(delay(LoadPhase::Radar(RadarSource::Noaa))).await;
            self.load_radar(RadarSource::Noaa).await
        };
        let rainviewer = async {
            tokio::time::sleep(delay(LoadPhase::Radar(RadarSource::RainViewer))).await;
            self.load_radar(RadarSource::RainViewer).await
        };
        tokio::join!(forecasts, events, noaa, rainviewer);
    }

    /// Load every visible forecast location that has no layer yet.
    pub async fn load_forecast_layers(&self) -> LoadSummary {
        let pending: Vec<ForecastLocation> = {
            let registry = lock(&self.core.registry);
            self.core
                .store
                .get_visible(LayerKind::Forecast)
                .into_iter()
                .filter(|d| !registry.has_forecast(&d.name))
                .filter_map(|d| {
                    let (latitude, longitude) = d.position()?;
                    Some(ForecastLocation {
                        name: d.name,
                        latitude,
                        longitude,
                        visible: d.visible,
                    })
                })
                .collect()
        };
        if pending.is_empty() {
            return LoadSummary::default();
        }

        let core = &self.core;
        core.loader
            .load_forecasts(&pending, |loaded| core.accept_forecast(loaded))
            .await
    }

    /// Fetch active alerts and rebuild every event layer.
    ///
    /// Returns the number of event layers and of newly impacted locations,
    /// or `None` if the fetch failed or the session was torn down meanwhile.
    #[instrument(skip(self))]
    pub async fn load_event_layers(&self) -> Option<(usize, usize)> {
        let batch = self.core.loader.load_alerts().await?;
        if !self.is_active() {
            debug!("Session inactive, discarding alerts");
            return None;
        }

        let names = batch.event_types();
        self.core.store.merge_event_types(&names);
        let descriptors = self.core.store.descriptors(LayerKind::Event);

        let mut registry = lock(&self.core.registry);
        let removed = registry.retain_event_layers(&names);
        for name in &names {
            let features = batch.of_event(name).cloned().collect();
            registry.rebuild_event_layer(name, features);
        }
        registry.apply_visibility(LayerKind::Event, &descriptors);
        let newly_impacted = registry.run_impact_pass();

        info!(
            alerts = batch.features.len(),
            skipped = batch.skipped,
            event_layers = names.len(),
            removed = removed.len(),
            newly_impacted,
            "Event layers rebuilt"
        );
        Some((names.len(), newly_impacted))
    }

    /// Create one radar source's tile layer. Returns true if it was created.
    #[instrument(skip(self))]
    pub async fn load_radar(&self, source: RadarSource) -> bool {
        let exists = lock(&self.core.registry).has_radar(source);
        if exists {
            return false;
        }
        let Some(tiles) = self.core.loader.radar_source(source).await else {
            return false;
        };
        if !self.is_active() {
            return false;
        }
        self.core.store.register_radar(source);
        let mut registry = lock(&self.core.registry);
        let visible = self
            .core
            .store
            .is_visible(LayerKind::Radar, source.as_str())
            .unwrap_or(false);
        registry.set_radar_layer(source, tiles, visible)
    }

    /// Re-fetch alerts and, when configured, retry whatever failed to load.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        if let Some((layers, newly)) = self.load_event_layers().await {
            summary.event_layers = Some(layers);
            summary.newly_impacted = newly;
        }

        if self.core.config.retry_missing && self.is_active() {
            summary.forecasts = self.load_forecast_layers().await;
            for source in RadarSource::ALL {
                if self.load_radar(source).await {
                    summary.radars_added += 1;
                }
            }
        }
        summary
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn toggle(&self, kind: LayerKind, name: &str) -> MapResult<bool> {
        self.core.store.toggle(kind, name)
    }

    pub fn activate_radar(&self, name: &str) -> MapResult<()> {
        self.core.store.set_exclusive(LayerKind::Radar, name)
    }

    /// Pointer moved to a WGS84 position.
    pub fn pointer_move(&self, longitude: f64, latitude: f64) -> Option<HitTarget> {
        let point = from_lon_lat(longitude, latitude);
        let mut registry = lock(&self.core.registry);
        self.core.interaction.pointer_move(&mut registry, point)
    }

    /// Click at a WGS84 position.
    pub fn click(&self, longitude: f64, latitude: f64) -> ClickOutcome {
        let point = from_lon_lat(longitude, latitude);
        let mut registry = lock(&self.core.registry);
        self.core.interaction.click(&mut registry, point)
    }

    /// Stop reacting: drop store subscriptions and discard late results.
    /// In-flight fetches are left to finish.
    pub fn teardown(&self) {
        self.core.active.store(false, Ordering::SeqCst);
        let handles = std::mem::take(&mut *lock(&self.core.subscriptions));
        for handle in handles {
            self.core.store.unsubscribe(handle);
        }
        info!("Session torn down");
    }
}

impl<G, B, P> SessionCore<G, B, P>
where
    G: GeoDataGateway + ?Sized,
    B: MapBackend,
    P: InfoPanel + ?Sized,
{
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn accept_forecast(&self, loaded: LoadedForecast) {
        if !self.is_active() {
            debug!(location = %loaded.location.name, "Session inactive, discarding forecast");
            return;
        }
        let name = loaded.location.name;
        let mut registry = lock(&self.registry);
        let visible = self
            .store
            .is_visible(LayerKind::Forecast, &name)
            .unwrap_or(loaded.location.visible);
        let result = registry.upsert_forecast_layer(&name, loaded.forecast, loaded.hourly, visible);
        if let Err(e) = result {
            warn!(location = %name, error = %e, "Forecast layer rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessMap;
    use crate::info_panel::InfoPanelState;
    use std::time::Duration;
    use test_utils::fixtures::sample_locations;
    use test_utils::FakeGateway;

    type TestSession = MapSession<FakeGateway, HeadlessMap, InfoPanelState>;

    fn session(gw: Arc<FakeGateway>, n: usize) -> TestSession {
        MapSession::new(
            gw,
            HeadlessMap::new(),
            Arc::new(InfoPanelState::new()),
            SessionConfig {
                locations: sample_locations(n),
                retry_missing: true,
                ..Default::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_toggle_reaches_registry() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(20)));
        let s = session(gw, 2);
        s.load_forecast_layers().await;

        assert!(!s.toggle(LayerKind::Forecast, "Seattle").unwrap());
        assert_eq!(
            s.with_registry(|r| r.is_visible(LayerKind::Forecast, "Seattle")),
            Some(false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_locations_are_not_loaded() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(20)));
        let s = session(gw.clone(), 3);
        s.toggle(LayerKind::Forecast, "Minneapolis").unwrap();

        let summary = s.load_forecast_layers().await;
        assert_eq!(summary.loaded, 2);
        assert!(!s.with_registry(|r| r.has_forecast("Minneapolis")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_discards_late_results() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(200)));
        let s = session(gw, 1);
        let loading = {
            let s = s.clone();
            tokio::spawn(async move { s.load_forecast_layers().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        s.teardown();

        let summary = loading.await.unwrap();
        // the fetch itself completed, but nothing reached the map
        assert_eq!(summary.loaded, 1);
        assert_eq!(s.with_registry(|r| r.forecast_count()), 0);
        assert_eq!(s.store().subscriber_count(), 0);
        assert!(!s.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_radar_first_writer_then_activation() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(20)));
        let s = session(gw, 0);
        s.load_layers().await;

        let noaa = s.with_registry(|r| r.is_visible(LayerKind::Radar, "NOAA"));
        let rv = s.with_registry(|r| r.is_visible(LayerKind::Radar, "RainViewer"));
        assert_eq!((noaa, rv), (Some(true), Some(false)));

        s.activate_radar("RainViewer").unwrap();
        let noaa = s.with_registry(|r| r.is_visible(LayerKind::Radar, "NOAA"));
        let rv = s.with_registry(|r| r.is_visible(LayerKind::Radar, "RainViewer"));
        assert_eq!((noaa, rv), (Some(false), Some(true)));
    }

    fn radar_state(s: &TestSession) -> (Vec<(String, bool)>, Vec<Option<bool>>) {
        let store: Vec<(String, bool)> = s
            .store()
            .descriptors(LayerKind::Radar)
            .into_iter()
            .map(|d| (d.name, d.visible))
            .collect();
        let registry = store
            .iter()
            .map(|(name, _)| s.with_registry(|r| r.is_visible(LayerKind::Radar, name)))
            .collect();
        (store, registry)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_radar_handles_match_store_under_racing_activation() {
        for _ in 0..50 {
            let gw = Arc::new(FakeGateway::new(Duration::ZERO));
            let s = session(gw, 0);

            let toggler = {
                let s = s.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let name = if i % 2 == 0 { "RainViewer" } else { "NOAA" };
                        // fails until the source is registered
                        let _ = s.activate_radar(name);
                    }
                })
            };
            let loads: Vec<_> = (0..2)
                .flat_map(|_| RadarSource::ALL)
                .map(|source| {
                    let s = s.clone();
                    tokio::spawn(async move { s.load_radar(source).await })
                })
                .collect();
            for load in loads {
                load.await.unwrap();
            }
            toggler.join().unwrap();

            let (store, registry) = radar_state(&s);
            assert_eq!(store.len(), 2);
            assert_eq!(store.iter().filter(|(_, v)| *v).count(), 1);
            let expected: Vec<Option<bool>> = store.iter().map(|(_, v)| Some(*v)).collect();
            assert_eq!(registry, expected);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_forecast_handles_match_store_under_racing_toggles() {
        for _ in 0..20 {
            let gw = Arc::new(FakeGateway::new(Duration::ZERO));
            let s = session(gw, 3);
            let names: Vec<String> = s.config().locations.iter().map(|l| l.name.clone()).collect();

            let toggler = {
                let s = s.clone();
                let names = names.clone();
                std::thread::spawn(move || {
                    for i in 0..101 {
                        s.toggle(LayerKind::Forecast, &names[i % names.len()]).unwrap();
                    }
                })
            };
            s.load_forecast_layers().await;
            toggler.join().unwrap();

            for name in &names {
                let in_registry = s.with_registry(|r| r.is_visible(LayerKind::Forecast, name));
                if in_registry.is_some() {
                    assert_eq!(in_registry, s.store().is_visible(LayerKind::Forecast, name));
                }
            }
        }
    }
}
