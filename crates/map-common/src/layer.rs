//! Layer kinds and visibility descriptors.
//!
//! A descriptor is the identity and visibility record of a toggleable layer,
//! independent of whatever rendering handle currently backs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MapError;

/// The three independently managed families of layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Per-location forecast grid cells with an anchor icon.
    Forecast,
    /// One vector layer per alert event type.
    Event,
    /// Radar tile overlays; at most one visible.
    Radar,
}

impl LayerKind {
    pub const ALL: [LayerKind; 3] = [LayerKind::Forecast, LayerKind::Event, LayerKind::Radar];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Forecast => "forecast",
            LayerKind::Event => "event",
            LayerKind::Radar => "radar",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forecast" => Ok(LayerKind::Forecast),
            "event" | "events" => Ok(LayerKind::Event),
            "radar" => Ok(LayerKind::Radar),
            _ => Err(MapError::UnknownLayerKind(s.to_string())),
        }
    }
}

/// Radar tile providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RadarSource {
    #[serde(rename = "NOAA")]
    Noaa,
    #[serde(rename = "RainViewer")]
    RainViewer,
}

impl RadarSource {
    pub const ALL: [RadarSource; 2] = [RadarSource::Noaa, RadarSource::RainViewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            RadarSource::Noaa => "NOAA",
            RadarSource::RainViewer => "RainViewer",
        }
    }
}

impl fmt::Display for RadarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RadarSource {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("noaa") {
            Ok(RadarSource::Noaa)
        } else if s.eq_ignore_ascii_case("rainviewer") {
            Ok(RadarSource::RainViewer)
        } else {
            Err(MapError::UnknownRadarSource(s.to_string()))
        }
    }
}

/// A seeded forecast location (WGS84 degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl ForecastLocation {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            visible: true,
        }
    }
}

/// Identity and visibility of a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub kind: LayerKind,
    /// Unique within its kind.
    pub name: String,
    pub visible: bool,
    /// Latitude of a forecast location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude of a forecast location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl LayerDescriptor {
    pub fn forecast(location: &ForecastLocation) -> Self {
        Self {
            kind: LayerKind::Forecast,
            name: location.name.clone(),
            visible: location.visible,
            latitude: Some(location.latitude),
            longitude: Some(location.longitude),
        }
    }

    /// A freshly observed alert event type. Visible by default.
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            kind: LayerKind::Event,
            name: name.into(),
            visible: true,
            latitude: None,
            longitude: None,
        }
    }

    pub fn radar(source: RadarSource, visible: bool) -> Self {
        Self {
            kind: LayerKind::Radar,
            name: source.to_string(),
            visible,
            latitude: None,
            longitude: None,
        }
    }

    /// Lat/lon of a forecast descriptor.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn radar_source(&self) -> Option<RadarSource> {
        match self.kind {
            LayerKind::Radar => self.name.parse().ok(),
            _ => None,
        }
    }
}
