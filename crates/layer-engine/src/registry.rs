//! Overlay registry: the single source of truth for what exists on the map.
//!
//! One entry per forecast location, per alert event type and per radar
//! source, each owning the backend handles it created. The registry also
//! owns the [`LocationRecord`]s derived from forecast geometry and runs the
//! [`ImpactEngine`] over them.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use map_common::geometry::union_extent;
use map_common::{
    Coordinate, LayerDescriptor, LayerKind, MapError, MapResult, RadarSource, StyleResolver,
    TileLayerSpec, TileSource,
};
use nws_client::{AlertFeature, AlertProperties, Forecast};

use crate::backend::{FeatureTag, Hit, LayerId, MapBackend, OverlayId, VectorFeature};
use crate::content::ForecastInfo;
use crate::impact::{ImpactEngine, ImpactPolicy, LocationRecord};

pub const FORECAST_Z_INDEX: i32 = 0;
pub const EVENT_Z_INDEX: i32 = 2;
pub const NOAA_Z_INDEX: i32 = 1;
pub const RAINVIEWER_Z_INDEX: i32 = 0;
pub const RADAR_OPACITY: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// What a map coordinate resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    /// A forecast grid cell or its anchor icon.
    Forecast { name: String },
    /// One alert polygon of an event layer.
    Event {
        name: String,
        index: usize,
        alert: Arc<AlertProperties>,
    },
}

struct ForecastEntry {
    layer: LayerId,
    overlay: OverlayId,
    visible: bool,
    centroid: Coordinate,
    forecast: Forecast,
    hourly: Forecast,
}

struct EventEntry {
    layer: LayerId,
    visible: bool,
    features: Vec<AlertFeature>,
}

struct RadarEntry {
    layer: LayerId,
    visible: bool,
}

pub struct OverlayRegistry<B: MapBackend> {
    backend: B,
    forecasts: BTreeMap<String, ForecastEntry>,
    events: BTreeMap<String, EventEntry>,
    radars: BTreeMap<RadarSource, RadarEntry>,
    records: BTreeMap<String, Vec<LocationRecord>>,
    impact: ImpactEngine,
    highlighted: Option<(String, usize)>,
}

impl<B: MapBackend> OverlayRegistry<B> {
    pub fn new(backend: B, policy: ImpactPolicy) -> Self {
        Self {
            backend,
            forecasts: BTreeMap::new(),
            events: BTreeMap::new(),
            radars: BTreeMap::new(),
            records: BTreeMap::new(),
            impact: ImpactEngine::new(policy),
            highlighted: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================================================================
    // Forecast layers
    // ========================================================================

    /// Create the forecast layer `name`, or only update its visibility if it
    /// already exists.
    ///
    /// On creation the layer's anchor icon goes to the center of the unioned
    /// feature extent, one [`LocationRecord`] is registered per feature, and
    /// the new records are tested against the alerts already on the map.
    pub fn upsert_forecast_layer(
        &mut self,
        name: &str,
        forecast: Forecast,
        hourly: Forecast,
        visible: bool,
    ) -> MapResult<UpsertOutcome> {
        if let Some(entry) = self.forecasts.get_mut(name) {
            entry.visible = visible;
            self.backend.set_layer_visible(entry.layer, visible);
            self.backend.set_overlay_visible(entry.overlay, visible);
            return Ok(UpsertOutcome::Updated);
        }

        let centroid = union_extent(&forecast.features).center().ok_or_else(|| {
            MapError::InvalidGeometry(format!("forecast layer {} has no geometry", name))
        })?;

        let mut records: Vec<LocationRecord> = forecast
            .features
            .iter()
            .map(|g| LocationRecord::new(name, g.centroid().unwrap_or(centroid)))
            .collect();

        let features = forecast
            .features
            .iter()
            .map(|geometry| VectorFeature {
                geometry: geometry.clone(),
                style: StyleResolver::forecast_style(),
                tag: FeatureTag::Forecast(name.to_string()),
            })
            .collect();
        let layer = self.backend.add_vector_layer(features, FORECAST_Z_INDEX, visible);
        let overlay = self.backend.add_icon_overlay(centroid, visible);

        let mut backfilled = 0;
        for entry in self.events.values() {
            for alert in &entry.features {
                backfilled += self.impact.apply(records.iter_mut(), alert);
            }
        }

        info!(
            layer = %name,
            features = records.len(),
            visible,
            backfilled,
            "Created forecast layer"
        );
        metrics::counter!("forecast_layers_loaded_total").increment(1);

        self.records.insert(name.to_string(), records);
        self.forecasts.insert(
            name.to_string(),
            ForecastEntry {
                layer,
                overlay,
                visible,
                centroid,
                forecast,
                hourly,
            },
        );
        self.update_impact_gauge();
        Ok(UpsertOutcome::Created)
    }

    pub fn has_forecast(&self, name: &str) -> bool {
        self.forecasts.contains_key(name)
    }

    pub fn forecast_names(&self) -> Vec<String> {
        self.forecasts.keys().cloned().collect()
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.len()
    }

    pub fn forecast_layer(&self, name: &str) -> Option<LayerId> {
        self.forecasts.get(name).map(|e| e.layer)
    }

    pub fn forecast_overlay(&self, name: &str) -> Option<OverlayId> {
        self.forecasts.get(name).map(|e| e.overlay)
    }

    /// Anchor point of a forecast layer, in map coordinates.
    pub fn forecast_centroid(&self, name: &str) -> Option<Coordinate> {
        self.forecasts.get(name).map(|e| e.centroid)
    }

    pub fn forecast_info(&self, name: &str, today: NaiveDate) -> Option<ForecastInfo> {
        let entry = self.forecasts.get(name)?;
        Some(ForecastInfo::build(
            name,
            &entry.forecast,
            &entry.hourly,
            self.records(name),
            today,
        ))
    }

    // ========================================================================
    // Event layers
    // ========================================================================

    /// Replace the layer of one event type wholesale.
    ///
    /// Visibility carries over from the previous layer of the same name and
    /// defaults to visible.
    pub fn rebuild_event_layer(&mut self, name: &str, features: Vec<AlertFeature>) -> LayerId {
        let visible = match self.events.remove(name) {
            Some(old) => {
                self.backend.remove_layer(old.layer);
                old.visible
            }
            None => true,
        };
        if matches!(&self.highlighted, Some((n, _)) if n == name) {
            self.highlighted = None;
        }

        let vector = features
            .iter()
            .map(|alert| VectorFeature {
                geometry: alert.geometry.clone(),
                style: StyleResolver::resolve(alert.severity()),
                tag: FeatureTag::Alert(alert.properties.clone()),
            })
            .collect();
        let layer = self.backend.add_vector_layer(vector, EVENT_Z_INDEX, visible);

        debug!(layer = %name, features = features.len(), visible, "Rebuilt event layer");
        metrics::counter!("event_layers_rebuilt_total").increment(1);

        self.events.insert(
            name.to_string(),
            EventEntry {
                layer,
                visible,
                features,
            },
        );
        layer
    }

    /// Drop event layers whose type is not in `names`. Returns the dropped names.
    pub fn retain_event_layers(&mut self, names: &[String]) -> Vec<String> {
        let stale: Vec<String> = self
            .events
            .keys()
            .filter(|k| !names.contains(k))
            .cloned()
            .collect();
        for name in &stale {
            if let Some(entry) = self.events.remove(name) {
                self.backend.remove_layer(entry.layer);
            }
            if matches!(&self.highlighted, Some((n, _)) if n == name) {
                self.highlighted = None;
            }
        }
        stale
    }

    /// Test every registered alert against every location record.
    ///
    /// Returns the number of records newly marked impacted.
    pub fn run_impact_pass(&mut self) -> usize {
        self.impact.start_pass(self.records.values_mut().flatten());
        let mut newly = 0;
        for entry in self.events.values() {
            for alert in &entry.features {
                newly += self.impact.apply(self.records.values_mut().flatten(), alert);
            }
        }
        self.update_impact_gauge();
        newly
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.keys().cloned().collect()
    }

    pub fn event_layer(&self, name: &str) -> Option<LayerId> {
        self.events.get(name).map(|e| e.layer)
    }

    pub fn event_feature_count(&self, name: &str) -> Option<usize> {
        self.events.get(name).map(|e| e.features.len())
    }

    pub fn event_features(&self, name: &str) -> Option<&[AlertFeature]> {
        self.events.get(name).map(|e| e.features.as_slice())
    }

    // ========================================================================
    // Radar layers
    // ========================================================================

    /// Create the tile layer for a radar source once. Returns false if it
    /// already existed; later visibility changes arrive via [`Self::apply_visibility`].
    pub fn set_radar_layer(&mut self, source: RadarSource, tiles: TileSource, visible: bool) -> bool {
        if self.radars.contains_key(&source) {
            return false;
        }
        let z_index = match source {
            RadarSource::Noaa => NOAA_Z_INDEX,
            RadarSource::RainViewer => RAINVIEWER_Z_INDEX,
        };
        let layer = self.backend.add_tile_layer(TileLayerSpec {
            source: tiles,
            opacity: RADAR_OPACITY,
            z_index,
            visible,
        });
        info!(radar = %source, visible, "Created radar layer");
        self.radars.insert(source, RadarEntry { layer, visible });
        true
    }

    pub fn has_radar(&self, source: RadarSource) -> bool {
        self.radars.contains_key(&source)
    }

    pub fn radar_layer(&self, source: RadarSource) -> Option<LayerId> {
        self.radars.get(&source).map(|e| e.layer)
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Push descriptor visibility onto existing handles. Descriptors without
    /// a handle are skipped.
    pub fn apply_visibility(&mut self, kind: LayerKind, descriptors: &[LayerDescriptor]) {
        for d in descriptors {
            match kind {
                LayerKind::Forecast => {
                    if let Some(e) = self.forecasts.get_mut(&d.name) {
                        e.visible = d.visible;
                        self.backend.set_layer_visible(e.layer, d.visible);
                        self.backend.set_overlay_visible(e.overlay, d.visible);
                    }
                }
                LayerKind::Event => {
                    if let Some(e) = self.events.get_mut(&d.name) {
                        e.visible = d.visible;
                        self.backend.set_layer_visible(e.layer, d.visible);
                    }
                }
                LayerKind::Radar => {
                    let entry = d.radar_source().and_then(|s| self.radars.get_mut(&s));
                    if let Some(e) = entry {
                        e.visible = d.visible;
                        self.backend.set_layer_visible(e.layer, d.visible);
                    }
                }
            }
        }
    }

    /// Visibility of an existing handle.
    pub fn is_visible(&self, kind: LayerKind, name: &str) -> Option<bool> {
        match kind {
            LayerKind::Forecast => self.forecasts.get(name).map(|e| e.visible),
            LayerKind::Event => self.events.get(name).map(|e| e.visible),
            LayerKind::Radar => {
                let source: RadarSource = name.parse().ok()?;
                self.radars.get(&source).map(|e| e.visible)
            }
        }
    }

    // ========================================================================
    // Interaction
    // ========================================================================

    pub fn hit_test(&self, point: Coordinate) -> Option<HitTarget> {
        match self.backend.hit_test(point)? {
            Hit::Overlay(overlay) => self
                .forecasts
                .iter()
                .find(|(_, e)| e.overlay == overlay)
                .map(|(name, _)| HitTarget::Forecast { name: name.clone() }),
            Hit::Feature {
                tag: FeatureTag::Forecast(name),
                ..
            } => Some(HitTarget::Forecast { name }),
            Hit::Feature {
                layer,
                index,
                tag: FeatureTag::Alert(alert),
            } => self
                .events
                .iter()
                .find(|(_, e)| e.layer == layer)
                .map(|(name, _)| HitTarget::Event {
                    name: name.clone(),
                    index,
                    alert,
                }),
        }
    }

    /// Highlight one alert feature; every other feature of its layer, and a
    /// previously highlighted feature elsewhere, gets its base style back.
    pub fn highlight_event_feature(&mut self, name: &str, index: usize) {
        if let Some((prev_name, prev_index)) = self.highlighted.take() {
            if prev_name != name {
                self.restyle(&prev_name, Some(prev_index), None);
            }
        }
        if !self.events.contains_key(name) {
            return;
        }
        self.restyle(name, None, Some(index));
        self.highlighted = Some((name.to_string(), index));
    }

    /// Base style on every feature of every event layer.
    pub fn reset_event_styles(&mut self) {
        let names = self.event_names();
        for name in names {
            self.restyle(&name, None, None);
        }
        self.highlighted = None;
    }

    pub fn highlighted(&self) -> Option<(&str, usize)> {
        self.highlighted.as_ref().map(|(n, i)| (n.as_str(), *i))
    }

    /// Restyle features of `name` (all, or only `only`), highlighting `target`.
    fn restyle(&mut self, name: &str, only: Option<usize>, target: Option<usize>) {
        let Some(entry) = self.events.get(name) else {
            return;
        };
        for (i, alert) in entry.features.iter().enumerate() {
            if only.is_some_and(|o| o != i) {
                continue;
            }
            let base = StyleResolver::resolve(alert.severity());
            let styles = if target == Some(i) {
                StyleResolver::resolve_highlight(&base)
            } else {
                vec![base]
            };
            self.backend.set_feature_style(entry.layer, i, styles);
        }
    }

    // ========================================================================
    // Location records
    // ========================================================================

    pub fn records(&self, name: &str) -> &[LocationRecord] {
        self.records.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_records(&self) -> impl Iterator<Item = &LocationRecord> {
        self.records.values().flatten()
    }

    pub fn impacted_count(&self) -> usize {
        self.all_records().filter(|r| r.impacted).count()
    }

    fn update_impact_gauge(&self) {
        metrics::gauge!("locations_impacted").set(self.impacted_count() as f64);
    }
}
