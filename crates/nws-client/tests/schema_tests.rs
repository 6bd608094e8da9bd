//! Tests for payload validation at the ingestion boundary.

use map_common::{from_lon_lat, Geometry};
use nws_client::schema::{AlertCollectionResponse, ForecastResponse};
use nws_client::{AlertBatch, Forecast};
use serde_json::json;

fn alert(id: &str, event: &str, severity: &str, geometry: serde_json::Value) -> serde_json::Value {
    json!({
        "id": format!("https://api.weather.gov/alerts/{}", id),
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "@id": format!("https://api.weather.gov/alerts/{}", id),
            "@type": "wx:Alert",
            "id": id,
            "areaDesc": "Orleans, LA",
            "sent": "2024-05-01T10:00:00-05:00",
            "effective": "2024-05-01T10:00:00-05:00",
            "expires": "2024-05-01T16:30:00-05:00",
            "status": "Actual",
            "severity": severity,
            "certainty": "Likely",
            "urgency": "Expected",
            "event": event,
            "senderName": "NWS New Orleans LA",
            "headline": format!("{} issued May 1", event),
            "description": "Heavy rain.",
            "instruction": null
        }
    })
}

fn square(lon: f64, lat: f64, half: f64) -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lon - half, lat - half], [lon + half, lat - half],
            [lon + half, lat + half], [lon - half, lat + half],
            [lon - half, lat - half]
        ]]
    })
}

// ============================================================================
// Alerts
// ============================================================================

#[test]
fn test_alert_collection_skips_missing_and_bad_geometry() {
    let payload = json!({
        "type": "FeatureCollection",
        "updated": "2024-05-01T15:05:00+00:00",
        "features": [
            alert("a1", "Flood Warning", "Severe", square(-90.0, 30.0, 0.5)),
            alert("a2", "Winter Storm Watch", "Moderate", serde_json::Value::Null),
            alert("a3", "Flood Warning", "Severe", json!({"type": "Polygon", "coordinates": [[[0, 0]]]})),
            alert("a4", "Heat Advisory", "Minor", json!({"type": "GeometryCollection", "geometries": []})),
            alert("a5", "Heat Advisory", "Minor", square(-112.0, 33.4, 0.3)),
        ]
    });

    let resp: AlertCollectionResponse = serde_json::from_value(payload).unwrap();
    let batch = AlertBatch::from_response(resp);

    assert_eq!(batch.features.len(), 2);
    assert_eq!(batch.skipped, 3);
    assert_eq!(batch.event_types(), vec!["Flood Warning", "Heat Advisory"]);
    assert_eq!(batch.of_event("Flood Warning").count(), 1);

    let flood = &batch.features[0];
    assert_eq!(flood.properties.id, "a1");
    assert_eq!(flood.severity(), Some("Severe"));
    assert_eq!(
        flood.properties.expires.unwrap().to_rfc3339(),
        "2024-05-01T21:30:00+00:00"
    );
    assert!(flood.geometry.contains_point(from_lon_lat(-90.07, 29.95)));
}

#[test]
fn test_malformed_alert_does_not_reject_the_feed() {
    let mut bad_expiry = alert("c2", "Heat Advisory", "Moderate", square(-112.0, 33.4, 0.3));
    bad_expiry["properties"]["expires"] = json!("tomorrow-ish");
    let mut no_event = alert("c3", "Wind Advisory", "Minor", square(-100.0, 40.0, 0.3));
    no_event["properties"].as_object_mut().unwrap().remove("event");

    let payload = json!({
        "features": [
            alert("c1", "Flood Warning", "Severe", square(-90.0, 30.0, 0.5)),
            bad_expiry,
            no_event,
            json!("not a feature"),
        ]
    });

    let resp: AlertCollectionResponse = serde_json::from_value(payload).unwrap();
    let batch = AlertBatch::from_response(resp);

    assert_eq!(batch.features.len(), 1);
    assert_eq!(batch.skipped, 3);
    assert_eq!(batch.features[0].properties.id, "c1");
    assert_eq!(batch.event_types(), vec!["Flood Warning"]);
}

#[test]
fn test_alert_missing_severity_defaults_to_none() {
    let mut raw = alert("b1", "Special Weather Statement", "Minor", square(0.0, 0.0, 1.0));
    raw["properties"]
        .as_object_mut()
        .unwrap()
        .remove("severity");
    let resp: AlertCollectionResponse =
        serde_json::from_value(json!({"features": [raw]})).unwrap();
    let batch = AlertBatch::from_response(resp);
    assert_eq!(batch.features[0].severity(), None);
}

// ============================================================================
// Forecasts
// ============================================================================

#[test]
fn test_forecast_feature() {
    let payload = json!({
        "type": "Feature",
        "geometry": square(-118.24, 34.05, 0.02),
        "properties": {
            "updated": "2024-05-01T14:00:00+00:00",
            "units": "us",
            "periods": [{
                "number": 1,
                "name": "Today",
                "startTime": "2024-05-01T07:00:00-07:00",
                "endTime": "2024-05-01T18:00:00-07:00",
                "isDaytime": true,
                "temperature": 72,
                "temperatureUnit": "F",
                "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": null},
                "windSpeed": "5 to 10 mph",
                "windDirection": "SW",
                "icon": "https://api.weather.gov/icons/land/day/few?size=medium",
                "shortForecast": "Sunny",
                "detailedForecast": "Sunny, with a high near 72."
            }]
        }
    });

    let resp: ForecastResponse = serde_json::from_value(payload).unwrap();
    let forecast = Forecast::from_response(resp);
    assert_eq!(forecast.features.len(), 1);
    assert!(matches!(forecast.features[0], Geometry::Polygon(_)));
    assert_eq!(forecast.periods.len(), 1);
    assert_eq!(forecast.periods[0].temperature, 72.0);
    assert_eq!(forecast.periods[0].precipitation_chance(), None);
}

#[test]
fn test_forecast_without_geometry_has_no_features() {
    let resp: ForecastResponse =
        serde_json::from_value(json!({"geometry": null, "properties": {"periods": []}})).unwrap();
    assert!(Forecast::from_response(resp).features.is_empty());
}
