//! Response schemas for each remote endpoint.
//!
//! The `*Response` types mirror the wire format and only carry the fields the
//! map depends on. They are converted into the validated domain types
//! ([`GridPoint`], [`Forecast`], [`AlertBatch`]) before leaving the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use map_common::{Geometry, MapError, MapResult};

use crate::geojson::parse_geometry;

// ============================================================================
// Grid points
// ============================================================================

/// `GET /points/{lat},{lon}`
#[derive(Debug, Clone, Deserialize)]
pub struct GridPointResponse {
    pub properties: GridPointProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPointProperties {
    pub grid_id: String,
    pub grid_x: u32,
    pub grid_y: u32,
    #[serde(default)]
    pub forecast: Option<String>,
    #[serde(default)]
    pub forecast_hourly: Option<String>,
}

/// A resolved NWS forecast grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub grid_id: String,
    pub grid_x: u32,
    pub grid_y: u32,
}

impl From<GridPointResponse> for GridPoint {
    fn from(resp: GridPointResponse) -> Self {
        let p = resp.properties;
        Self {
            grid_id: p.grid_id,
            grid_x: p.grid_x,
            grid_y: p.grid_y,
        }
    }
}

// ============================================================================
// Forecasts
// ============================================================================

/// `GET /gridpoints/{id}/{x},{y}/forecast[/hourly]`, a GeoJSON Feature.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub geometry: Option<Value>,
    pub properties: ForecastProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastProperties {
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub periods: Vec<Period>,
}

/// A value with a WMO unit code, e.g. `{"unitCode": "wmoUnit:percent", "value": 20}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitativeValue {
    #[serde(default)]
    pub unit_code: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// One forecast period (a half day, or one hour for hourly forecasts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub number: u32,
    #[serde(default)]
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_daytime: bool,
    pub temperature: f64,
    #[serde(default)]
    pub temperature_unit: String,
    #[serde(default)]
    pub probability_of_precipitation: Option<QuantitativeValue>,
    #[serde(default)]
    pub wind_speed: String,
    #[serde(default)]
    pub wind_direction: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub short_forecast: String,
    #[serde(default)]
    pub detailed_forecast: String,
}

impl Period {
    /// Chance of precipitation in percent, if reported.
    pub fn precipitation_chance(&self) -> Option<f64> {
        self.probability_of_precipitation.as_ref()?.value
    }
}

/// A validated forecast: its grid-cell geometry (map coordinates) and periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub features: Vec<Geometry>,
    pub periods: Vec<Period>,
    pub updated: Option<DateTime<Utc>>,
}

impl Forecast {
    /// Convert a wire response. A missing or malformed geometry leaves
    /// `features` empty; callers decide whether that is acceptable.
    pub fn from_response(resp: ForecastResponse) -> Self {
        let features = match resp.geometry.as_ref().map(parse_geometry) {
            Some(Ok(geometry)) => vec![geometry],
            Some(Err(e)) => {
                debug!(error = %e, "Discarding forecast geometry");
                Vec::new()
            }
            None => Vec::new(),
        };
        Self {
            features,
            periods: resp.properties.periods,
            updated: resp.properties.updated,
        }
    }

    pub fn empty() -> Self {
        Self {
            features: Vec::new(),
            periods: Vec::new(),
            updated: None,
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// `GET /alerts/active`, a GeoJSON FeatureCollection.
///
/// Features stay raw here and are decoded one by one in
/// [`AlertBatch::from_response`], so one bad alert cannot reject the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertCollectionResponse {
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertFeatureResponse {
    pub id: String,
    /// Zone-based alerts carry no geometry.
    #[serde(default)]
    pub geometry: Option<Value>,
    pub properties: AlertProperties,
}

/// Property bag of a single alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertProperties {
    pub id: String,
    pub event: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub certainty: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub area_desc: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective: Option<DateTime<Utc>>,
    #[serde(default)]
    pub onset: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends: Option<DateTime<Utc>>,
}

/// An ingested alert with a valid geometry in map coordinates.
///
/// Properties are shared so impacted locations can reference the same
/// alert object without copying it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertFeature {
    pub id: String,
    pub geometry: Geometry,
    pub properties: Arc<AlertProperties>,
}

impl AlertFeature {
    pub fn event(&self) -> &str {
        &self.properties.event
    }

    pub fn severity(&self) -> Option<&str> {
        self.properties.severity.as_deref()
    }
}

/// Result of one active-alerts fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertBatch {
    pub features: Vec<AlertFeature>,
    /// Features dropped for malformed properties or unusable geometry.
    pub skipped: usize,
    pub updated: Option<DateTime<Utc>>,
}

impl AlertBatch {
    /// Validate a wire collection, dropping features that fail to decode or
    /// carry no usable geometry.
    pub fn from_response(resp: AlertCollectionResponse) -> Self {
        let mut features = Vec::with_capacity(resp.features.len());
        let mut skipped = 0;
        for value in resp.features {
            let raw: AlertFeatureResponse = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed alert");
                    skipped += 1;
                    continue;
                }
            };
            let Some(value) = raw.geometry.as_ref() else {
                skipped += 1;
                continue;
            };
            match parse_geometry(value) {
                Ok(geometry) => features.push(AlertFeature {
                    id: raw.id,
                    geometry,
                    properties: Arc::new(raw.properties),
                }),
                Err(e) => {
                    debug!(alert = %raw.id, error = %e, "Skipping alert with bad geometry");
                    skipped += 1;
                }
            }
        }
        Self {
            features,
            skipped,
            updated: resp.updated,
        }
    }

    /// Distinct event types, in first-seen order.
    pub fn event_types(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for f in &self.features {
            if !seen.iter().any(|e| e == f.event()) {
                seen.push(f.event().to_string());
            }
        }
        seen
    }

    /// Features of one event type.
    pub fn of_event<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a AlertFeature> + 'a {
        self.features.iter().filter(move |f| f.event() == event)
    }
}

// ============================================================================
// RainViewer
// ============================================================================

/// `GET weather-maps.json`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RainViewerIndex {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub generated: i64,
    #[serde(default)]
    pub host: Option<String>,
    pub radar: RadarFrames,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadarFrames {
    #[serde(default)]
    pub past: Vec<RadarFrame>,
    #[serde(default)]
    pub nowcast: Vec<RadarFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarFrame {
    /// Unix seconds.
    pub time: i64,
    pub path: String,
}

impl RainViewerIndex {
    /// First nowcast frame, else the latest past frame.
    pub fn current_frame(&self) -> MapResult<&RadarFrame> {
        self.radar
            .nowcast
            .first()
            .or_else(|| self.radar.past.iter().max_by_key(|f| f.time))
            .ok_or(MapError::NoRadarFrames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_frame_prefers_nowcast() {
        let index: RainViewerIndex = serde_json::from_str(
            r#"{"generated": 1700000000, "radar": {
                "past": [{"time": 1, "path": "/v2/radar/1"}, {"time": 2, "path": "/v2/radar/2"}],
                "nowcast": [{"time": 3, "path": "/v2/radar/nowcast_3"}]}}"#,
        )
        .unwrap();
        assert_eq!(index.current_frame().unwrap().path, "/v2/radar/nowcast_3");
    }

    #[test]
    fn test_current_frame_falls_back_to_latest_past() {
        let index: RainViewerIndex = serde_json::from_str(
            r#"{"radar": {"past": [{"time": 5, "path": "/b"}, {"time": 2, "path": "/a"}]}}"#,
        )
        .unwrap();
        assert_eq!(index.current_frame().unwrap().path, "/b");
    }

    #[test]
    fn test_no_frames() {
        let index: RainViewerIndex = serde_json::from_str(r#"{"radar": {}}"#).unwrap();
        assert!(matches!(index.current_frame(), Err(MapError::NoRadarFrames)));
    }

    #[test]
    fn test_grid_point_conversion() {
        let resp: GridPointResponse = serde_json::from_str(
            r#"{"properties": {"gridId": "LOX", "gridX": 155, "gridY": 45,
                "forecast": "https://api.weather.gov/gridpoints/LOX/155,45/forecast"}}"#,
        )
        .unwrap();
        let point = GridPoint::from(resp);
        assert_eq!(point.grid_id, "LOX");
        assert_eq!((point.grid_x, point.grid_y), (155, 45));
    }

    #[test]
    fn test_precipitation_chance() {
        let period: Period = serde_json::from_str(
            r#"{"number": 1, "name": "Tonight", "startTime": "2024-03-01T18:00:00-08:00",
                "endTime": "2024-03-02T06:00:00-08:00", "isDaytime": false,
                "temperature": 48, "temperatureUnit": "F",
                "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": 20},
                "windSpeed": "5 mph", "windDirection": "W",
                "shortForecast": "Mostly Clear"}"#,
        )
        .unwrap();
        assert_eq!(period.precipitation_chance(), Some(20.0));
        assert_eq!(period.start_time.to_rfc3339(), "2024-03-02T02:00:00+00:00");
    }
}
