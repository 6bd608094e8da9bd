//! Coordinate reference systems used by the map.
//!
//! Remote feeds deliver longitude/latitude (EPSG:4326); everything placed on
//! the map, including the centroids tested for alert impact, lives in
//! Web Mercator (EPSG:3857).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Coordinate;

/// Spherical Mercator earth radius in meters.
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the Web Mercator world in meters.
pub const MERCATOR_MAX_EXTENT: f64 = 20_037_508.342_789_244;

/// Latitude limit of Web Mercator.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_6;

/// Well-known CRS codes understood by the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
}

impl CrsCode {
    /// Parse a CRS string like "EPSG:3857" (case-insensitive, CRS:84 accepted).
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        match s.to_uppercase().as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }

    /// Project a lon/lat coordinate into this CRS.
    pub fn project(&self, lon: f64, lat: f64) -> Coordinate {
        match self {
            CrsCode::Epsg4326 => Coordinate::new(lon, lat),
            CrsCode::Epsg3857 => from_lon_lat(lon, lat),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
        };
        write!(f, "{}", code)
    }
}

/// Convert WGS84 longitude/latitude to Web Mercator meters.
///
/// Latitudes beyond the Mercator limit are clamped.
pub fn from_lon_lat(lon: f64, lat: f64) -> Coordinate {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Coordinate::new(x, y)
}

/// Convert Web Mercator meters back to WGS84 (longitude, latitude).
pub fn to_lon_lat(c: Coordinate) -> (f64, f64) {
    let lon = (c.x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (c.y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
