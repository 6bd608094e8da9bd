//! Common types and utilities shared across the weather-map crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod style;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::{from_lon_lat, to_lon_lat, CrsCode};
pub use error::{MapError, MapResult};
pub use geometry::{Coordinate, Geometry, Polygon};
pub use layer::{ForecastLocation, LayerDescriptor, LayerKind, RadarSource};
pub use style::{FeatureStyle, Rgb, Rgba, Severity, Stroke, StyleResolver};
pub use tile::{TileCoord, TileLayerSpec, TileSource};
