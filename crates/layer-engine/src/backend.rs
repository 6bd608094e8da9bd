//! Map rendering collaborator.
//!
//! The engine never draws anything itself. It drives a [`MapBackend`], which
//! owns vector layers, tile layers and icon overlays and answers hit tests.
//! [`HeadlessMap`] keeps all of that in memory and hit-tests geometrically.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use map_common::{Coordinate, FeatureStyle, Geometry, TileLayerSpec};
use nws_client::AlertProperties;

/// Identifies a layer created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LayerId(pub u64);

/// Identifies an icon overlay created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OverlayId(pub u64);

/// What a vector feature represents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FeatureTag {
    /// Grid cell of the named forecast layer.
    Forecast(String),
    /// An alert polygon.
    Alert(Arc<AlertProperties>),
}

/// A feature handed to [`MapBackend::add_vector_layer`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub geometry: Geometry,
    pub style: FeatureStyle,
    pub tag: FeatureTag,
}

/// Result of a hit test.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    /// Index of the feature within its layer, as passed at creation.
    Feature { layer: LayerId, index: usize, tag: FeatureTag },
    Overlay(OverlayId),
}

pub trait MapBackend: Send {
    fn add_vector_layer(&mut self, features: Vec<VectorFeature>, z_index: i32, visible: bool) -> LayerId;

    fn add_tile_layer(&mut self, spec: TileLayerSpec) -> LayerId;

    fn remove_layer(&mut self, layer: LayerId);

    fn set_layer_visible(&mut self, layer: LayerId, visible: bool);

    /// Replace the style passes of one feature. An empty list restores the
    /// feature's creation style.
    fn set_feature_style(&mut self, layer: LayerId, index: usize, styles: Vec<FeatureStyle>);

    fn add_icon_overlay(&mut self, position: Coordinate, visible: bool) -> OverlayId;

    fn set_overlay_visible(&mut self, overlay: OverlayId, visible: bool);

    /// Topmost visible feature or overlay at a map coordinate.
    fn hit_test(&self, point: Coordinate) -> Option<Hit>;
}

// ============================================================================
// Headless backend
// ============================================================================

#[derive(Debug, Clone)]
struct StyledFeature {
    feature: VectorFeature,
    styles: Vec<FeatureStyle>,
}

impl StyledFeature {
    fn top_z(&self) -> i32 {
        self.styles
            .iter()
            .map(|s| s.z_index)
            .max()
            .unwrap_or(self.feature.style.z_index)
    }
}

#[derive(Debug, Clone)]
enum LayerContent {
    Vector(Vec<StyledFeature>),
    Tile(TileLayerSpec),
}

#[derive(Debug, Clone)]
struct LayerState {
    content: LayerContent,
    z_index: i32,
    visible: bool,
}

#[derive(Debug, Clone, Copy)]
struct OverlayState {
    position: Coordinate,
    visible: bool,
}

/// In-memory backend.
///
/// Icon overlays are hit within `icon_radius` map units of their position
/// and sit above every layer. Among vector features, the higher layer
/// z-index wins, then the higher feature style z-index, then the later one.
#[derive(Debug, Clone)]
pub struct HeadlessMap {
    layers: BTreeMap<LayerId, LayerState>,
    overlays: BTreeMap<OverlayId, OverlayState>,
    next_id: u64,
    icon_radius: f64,
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMap {
    /// Roughly a 32px icon at zoom 6.
    pub const DEFAULT_ICON_RADIUS: f64 = 20_000.0;

    pub fn new() -> Self {
        Self::with_icon_radius(Self::DEFAULT_ICON_RADIUS)
    }

    pub fn with_icon_radius(icon_radius: f64) -> Self {
        Self {
            layers: BTreeMap::new(),
            overlays: BTreeMap::new(),
            next_id: 1,
            icon_radius,
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn has_layer(&self, layer: LayerId) -> bool {
        self.layers.contains_key(&layer)
    }

    pub fn is_layer_visible(&self, layer: LayerId) -> Option<bool> {
        self.layers.get(&layer).map(|l| l.visible)
    }

    pub fn is_overlay_visible(&self, overlay: OverlayId) -> Option<bool> {
        self.overlays.get(&overlay).map(|o| o.visible)
    }

    pub fn overlay_position(&self, overlay: OverlayId) -> Option<Coordinate> {
        self.overlays.get(&overlay).map(|o| o.position)
    }

    pub fn layer_z_index(&self, layer: LayerId) -> Option<i32> {
        self.layers.get(&layer).map(|l| l.z_index)
    }

    pub fn feature_count(&self, layer: LayerId) -> usize {
        match self.layers.get(&layer).map(|l| &l.content) {
            Some(LayerContent::Vector(features)) => features.len(),
            _ => 0,
        }
    }

    /// Current style passes of a feature.
    pub fn feature_styles(&self, layer: LayerId, index: usize) -> Option<Vec<FeatureStyle>> {
        match &self.layers.get(&layer)?.content {
            LayerContent::Vector(features) => features.get(index).map(|f| f.styles.clone()),
            LayerContent::Tile(_) => None,
        }
    }

    pub fn tile_spec(&self, layer: LayerId) -> Option<&TileLayerSpec> {
        match &self.layers.get(&layer)?.content {
            LayerContent::Tile(spec) => Some(spec),
            LayerContent::Vector(_) => None,
        }
    }
}

impl MapBackend for HeadlessMap {
    fn add_vector_layer(&mut self, features: Vec<VectorFeature>, z_index: i32, visible: bool) -> LayerId {
        let id = LayerId(self.next());
        let features = features
            .into_iter()
            .map(|feature| StyledFeature {
                styles: vec![feature.style],
                feature,
            })
            .collect();
        self.layers.insert(
            id,
            LayerState {
                content: LayerContent::Vector(features),
                z_index,
                visible,
            },
        );
        id
    }

    fn add_tile_layer(&mut self, spec: TileLayerSpec) -> LayerId {
        let id = LayerId(self.next());
        let (z_index, visible) = (spec.z_index, spec.visible);
        self.layers.insert(
            id,
            LayerState {
                content: LayerContent::Tile(spec),
                z_index,
                visible,
            },
        );
        id
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.layers.remove(&layer);
    }

    fn set_layer_visible(&mut self, layer: LayerId, visible: bool) {
        if let Some(state) = self.layers.get_mut(&layer) {
            state.visible = visible;
            if let LayerContent::Tile(spec) = &mut state.content {
                spec.visible = visible;
            }
        }
    }

    fn set_feature_style(&mut self, layer: LayerId, index: usize, styles: Vec<FeatureStyle>) {
        let Some(LayerState {
            content: LayerContent::Vector(features),
            ..
        }) = self.layers.get_mut(&layer)
        else {
            return;
        };
        if let Some(f) = features.get_mut(index) {
            f.styles = if styles.is_empty() {
                vec![f.feature.style]
            } else {
                styles
            };
        }
    }

    fn add_icon_overlay(&mut self, position: Coordinate, visible: bool) -> OverlayId {
        let id = OverlayId(self.next());
        self.overlays.insert(id, OverlayState { position, visible });
        id
    }

    fn set_overlay_visible(&mut self, overlay: OverlayId, visible: bool) {
        if let Some(state) = self.overlays.get_mut(&overlay) {
            state.visible = visible;
        }
    }

    fn hit_test(&self, point: Coordinate) -> Option<Hit> {
        let icon_hit = self
            .overlays
            .iter()
            .filter(|(_, o)| o.visible)
            .map(|(id, o)| (id, (o.position.x - point.x).hypot(o.position.y - point.y)))
            .filter(|(_, d)| *d <= self.icon_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((id, _)) = icon_hit {
            return Some(Hit::Overlay(*id));
        }

        let mut best: Option<((i32, i32, LayerId, usize), Hit)> = None;
        for (layer_id, layer) in &self.layers {
            let LayerContent::Vector(features) = &layer.content else {
                continue;
            };
            if !layer.visible {
                continue;
            }
            for (index, f) in features.iter().enumerate() {
                if !f.feature.geometry.contains_point(point) {
                    continue;
                }
                let rank = (layer.z_index, f.top_z(), *layer_id, index);
                if best.as_ref().map_or(true, |(r, _)| rank > *r) {
                    best = Some((
                        rank,
                        Hit::Feature {
                            layer: *layer_id,
                            index,
                            tag: f.feature.tag.clone(),
                        },
                    ));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }
}
