//! GeoJSON geometry parsing.
//!
//! Remote payloads are WGS84 lon/lat. Geometries are projected into
//! EPSG:3857 as they are converted, so everything downstream works in map
//! units.

use serde::Deserialize;
use serde_json::Value;

use map_common::{from_lon_lat, Coordinate, Geometry, MapError, MapResult, Polygon};

type Position = Vec<f64>;

/// The subset of GeoJSON geometries the weather feeds produce.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum GeoJsonGeometry {
    Point(Position),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl GeoJsonGeometry {
    /// Project into map coordinates and validate rings.
    pub fn to_map_geometry(&self) -> MapResult<Geometry> {
        match self {
            GeoJsonGeometry::Point(p) => Ok(Geometry::Point(project(p)?)),
            GeoJsonGeometry::Polygon(rings) => Ok(Geometry::Polygon(polygon(rings)?)),
            GeoJsonGeometry::MultiPolygon(parts) => {
                let polygons = parts.iter().map(|p| polygon(p)).collect::<MapResult<Vec<_>>>()?;
                if polygons.is_empty() {
                    return Err(MapError::InvalidGeometry(
                        "MultiPolygon has no parts".to_string(),
                    ));
                }
                Ok(Geometry::MultiPolygon(polygons))
            }
        }
    }
}

/// Parse a GeoJSON geometry object into a map geometry.
pub fn parse_geometry(value: &Value) -> MapResult<Geometry> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| MapError::InvalidGeometry("geometry has no type".to_string()))?;

    if !matches!(kind, "Point" | "Polygon" | "MultiPolygon") {
        return Err(MapError::UnsupportedGeometry(kind.to_string()));
    }

    let geometry = GeoJsonGeometry::deserialize(value)
        .map_err(|e| MapError::InvalidGeometry(format!("{}: {}", kind, e)))?;
    geometry.to_map_geometry()
}

fn project(position: &[f64]) -> MapResult<Coordinate> {
    match position {
        [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Ok(from_lon_lat(*lon, *lat)),
        _ => Err(MapError::InvalidCoordinate(format!("{:?}", position))),
    }
}

fn polygon(rings: &[Vec<Position>]) -> MapResult<Polygon> {
    let rings = rings
        .iter()
        .map(|ring| ring.iter().map(|p| project(p)).collect::<MapResult<Vec<_>>>())
        .collect::<MapResult<Vec<_>>>()?;
    Polygon::new(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_common::to_lon_lat;
    use serde_json::json;

    #[test]
    fn test_point_projected() {
        let geom = parse_geometry(&json!({"type": "Point", "coordinates": [0.0, 0.0]})).unwrap();
        match geom {
            Geometry::Point(c) => assert!(c.x.abs() < 1e-6 && c.y.abs() < 1e-6),
            other => panic!("expected point, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_polygon_round_trips_through_projection() {
        let geom = parse_geometry(&json!({
            "type": "Polygon",
            "coordinates": [[[-90.5, 29.5], [-89.5, 29.5], [-89.5, 30.5], [-90.5, 30.5], [-90.5, 29.5]]]
        }))
        .unwrap();
        let center = geom.centroid().unwrap();
        let (lon, lat) = to_lon_lat(center);
        assert!((lon + 90.0).abs() < 1e-9);
        // extent center in mercator is not the geographic midpoint
        assert!((lat - 30.0).abs() < 0.01);
        assert!(geom.contains_point(from_lon_lat(-90.07, 29.95)));
    }

    #[test]
    fn test_unsupported_type() {
        let err = parse_geometry(&json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}))
            .unwrap_err();
        assert!(matches!(err, MapError::UnsupportedGeometry(ref t) if t == "LineString"));
    }

    #[test]
    fn test_malformed_coordinates() {
        assert!(matches!(
            parse_geometry(&json!({"type": "Polygon", "coordinates": "nope"})),
            Err(MapError::InvalidGeometry(_))
        ));
        assert!(matches!(
            parse_geometry(&json!({"type": "Point", "coordinates": [1.0]})),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(parse_geometry(&json!({"coordinates": [1.0, 2.0]})).is_err());
    }

    #[test]
    fn test_empty_multipolygon_rejected() {
        assert!(parse_geometry(&json!({"type": "MultiPolygon", "coordinates": []})).is_err());
    }
}
