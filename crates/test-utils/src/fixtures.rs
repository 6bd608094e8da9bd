//! Common test fixtures for weather-map tests.
//!
//! Builders return both wire-format JSON (for client and server tests) and
//! already-validated domain values (for engine tests).

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use map_common::{from_lon_lat, ForecastLocation, Geometry, Polygon};
use nws_client::schema::{QuantitativeValue, RadarFrames};
use nws_client::{
    AlertBatch, AlertFeature, AlertProperties, Forecast, GridPoint, Period, RadarFrame,
    RainViewerIndex,
};

/// Well-known forecast locations (WGS84).
pub mod locations {
    pub const LOS_ANGELES: (&str, f64, f64) = ("Los Angeles", 34.0522, -118.2437);
    pub const SEATTLE: (&str, f64, f64) = ("Seattle", 47.6062, -122.3321);
    pub const MINNEAPOLIS: (&str, f64, f64) = ("Minneapolis", 44.9778, -93.2650);
    pub const KANSAS_CITY: (&str, f64, f64) = ("Kansas City", 39.0997, -94.5786);
    pub const MIAMI: (&str, f64, f64) = ("Miami", 25.7617, -80.1918);
    pub const NEW_ORLEANS: (&str, f64, f64) = ("New Orleans", 29.9511, -90.0715);
    pub const PHOENIX: (&str, f64, f64) = ("Phoenix", 33.4484, -112.0740);
}

/// Fixed reference instant used by time-dependent fixtures.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap()
}

pub fn location(spec: (&str, f64, f64)) -> ForecastLocation {
    ForecastLocation::new(spec.0, spec.1, spec.2)
}

/// `n` locations taken from [`locations`], in a stable order.
pub fn sample_locations(n: usize) -> Vec<ForecastLocation> {
    [
        locations::LOS_ANGELES,
        locations::SEATTLE,
        locations::MINNEAPOLIS,
        locations::KANSAS_CITY,
        locations::MIAMI,
        locations::NEW_ORLEANS,
        locations::PHOENIX,
    ]
    .into_iter()
    .take(n)
    .map(location)
    .collect()
}

// ============================================================================
// Geometry
// ============================================================================

/// GeoJSON polygon: a lon/lat square of half-width `half` degrees.
pub fn square_json(lon: f64, lat: f64, half: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lon - half, lat - half],
            [lon + half, lat - half],
            [lon + half, lat + half],
            [lon - half, lat + half],
            [lon - half, lat - half]
        ]]
    })
}

/// The same square, projected into map coordinates.
pub fn square_geometry(lon: f64, lat: f64, half: f64) -> Geometry {
    let ring = vec![
        from_lon_lat(lon - half, lat - half),
        from_lon_lat(lon + half, lat - half),
        from_lon_lat(lon + half, lat + half),
        from_lon_lat(lon - half, lat + half),
    ];
    Geometry::Polygon(Polygon::new(vec![ring]).unwrap())
}

// ============================================================================
// Alerts
// ============================================================================

pub fn alert_properties(id: &str, event: &str, severity: Option<&str>) -> AlertProperties {
    let sent = reference_time();
    AlertProperties {
        id: id.to_string(),
        event: event.to_string(),
        severity: severity.map(str::to_string),
        certainty: Some("Likely".to_string()),
        urgency: Some("Expected".to_string()),
        status: Some("Actual".to_string()),
        headline: Some(format!("{} issued May 1 at 10:00AM", event)),
        description: Some(format!("{} in effect for the area.", event)),
        instruction: None,
        area_desc: Some("Test County".to_string()),
        sender_name: Some("NWS Test Office".to_string()),
        sent: Some(sent),
        effective: Some(sent),
        onset: Some(sent),
        expires: Some(sent + Duration::hours(6)),
        ends: None,
    }
}

pub fn alert_feature(id: &str, event: &str, severity: Option<&str>, geometry: Geometry) -> AlertFeature {
    AlertFeature {
        id: format!("https://api.weather.gov/alerts/{}", id),
        geometry,
        properties: Arc::new(alert_properties(id, event, severity)),
    }
}

/// Alert whose polygon is a square centered on a lon/lat.
pub fn alert_around(id: &str, event: &str, severity: &str, lon: f64, lat: f64, half: f64) -> AlertFeature {
    alert_feature(id, event, Some(severity), square_geometry(lon, lat, half))
}

pub fn alert_batch(features: Vec<AlertFeature>) -> AlertBatch {
    AlertBatch {
        features,
        skipped: 0,
        updated: Some(reference_time()),
    }
}

/// Wire-format alert feature.
pub fn alert_json(id: &str, event: &str, severity: &str, geometry: Value) -> Value {
    let props = alert_properties(id, event, Some(severity));
    json!({
        "id": format!("https://api.weather.gov/alerts/{}", id),
        "type": "Feature",
        "geometry": geometry,
        "properties": props_json(&props)
    })
}

fn props_json(props: &AlertProperties) -> Value {
    let mut value = serde_json::to_value(props).unwrap();
    value["@type"] = json!("wx:Alert");
    value
}

/// Wire-format active-alerts collection.
pub fn alerts_collection_json(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "title": "Current watches, warnings, and advisories",
        "updated": reference_time().to_rfc3339(),
        "features": features
    })
}

// ============================================================================
// Forecasts
// ============================================================================

pub fn grid_point(grid_id: &str, x: u32, y: u32) -> GridPoint {
    GridPoint {
        grid_id: grid_id.to_string(),
        grid_x: x,
        grid_y: y,
    }
}

/// Wire-format grid point response.
pub fn grid_point_json(grid_id: &str, x: u32, y: u32) -> Value {
    json!({
        "properties": {
            "gridId": grid_id,
            "gridX": x,
            "gridY": y,
            "forecast": format!("https://api.weather.gov/gridpoints/{}/{},{}/forecast", grid_id, x, y),
            "forecastHourly": format!("https://api.weather.gov/gridpoints/{}/{},{}/forecast/hourly", grid_id, x, y)
        }
    })
}

/// A forecast period starting `hours_from_ref` after [`reference_time`].
pub fn period(number: u32, name: &str, hours_from_ref: i64, length_hours: i64, temperature: f64) -> Period {
    let start = reference_time() + Duration::hours(hours_from_ref);
    Period {
        number,
        name: name.to_string(),
        start_time: start,
        end_time: start + Duration::hours(length_hours),
        is_daytime: true,
        temperature,
        temperature_unit: "F".to_string(),
        probability_of_precipitation: Some(QuantitativeValue {
            unit_code: Some("wmoUnit:percent".to_string()),
            value: Some(10.0),
        }),
        wind_speed: "10 mph".to_string(),
        wind_direction: "SW".to_string(),
        icon: "https://api.weather.gov/icons/land/day/few?size=medium".to_string(),
        short_forecast: "Sunny".to_string(),
        detailed_forecast: "Sunny, with a light southwest wind.".to_string(),
    }
}

/// Twice-daily forecast whose grid cell is a small square around the point.
pub fn forecast_at(lon: f64, lat: f64) -> Forecast {
    Forecast {
        features: vec![square_geometry(lon, lat, 0.02)],
        periods: vec![
            period(1, "This Afternoon", 0, 3, 75.0),
            period(2, "Tonight", 3, 12, 58.0),
            period(3, "Thursday", 15, 12, 77.0),
        ],
        updated: Some(reference_time()),
    }
}

/// Hourly forecast with `hours` one-hour periods.
pub fn hourly_forecast(hours: usize) -> Forecast {
    Forecast {
        features: Vec::new(),
        periods: (0..hours)
            .map(|h| period(h as u32 + 1, "", h as i64, 1, 70.0 + h as f64))
            .collect(),
        updated: Some(reference_time()),
    }
}

// ============================================================================
// Radar
// ============================================================================

pub fn radar_index() -> RainViewerIndex {
    RainViewerIndex {
        version: Some("2.0".to_string()),
        generated: reference_time().timestamp(),
        host: Some("https://tilecache.rainviewer.com".to_string()),
        radar: RadarFrames {
            past: vec![RadarFrame {
                time: reference_time().timestamp() - 600,
                path: "/v2/radar/past_1".to_string(),
            }],
            nowcast: vec![RadarFrame {
                time: reference_time().timestamp() + 600,
                path: "/v2/radar/nowcast_1".to_string(),
            }],
        },
    }
}
