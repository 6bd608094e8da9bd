//! Internal geometry model and point-in-polygon testing.
//!
//! Geometries are stored in map coordinates (EPSG:3857 for everything the
//! session ingests). Only the shapes that the weather feeds actually deliver
//! are modelled: points, polygons with holes, and multipolygons.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{MapError, MapResult};

/// A 2D coordinate in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(c: [f64; 2]) -> Self {
        Self::new(c[0], c[1])
    }
}

/// A polygon: one exterior ring plus zero or more holes.
///
/// Rings are always closed (first coordinate == last coordinate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<Coordinate>,
    holes: Vec<Vec<Coordinate>>,
}

impl Polygon {
    /// Build a polygon from rings, the first of which is the exterior.
    ///
    /// Unclosed rings are closed; rings with fewer than three distinct
    /// vertices or non-finite coordinates are rejected.
    pub fn new(rings: Vec<Vec<Coordinate>>) -> MapResult<Self> {
        let mut rings = rings.into_iter();
        let exterior = rings
            .next()
            .ok_or_else(|| MapError::InvalidGeometry("polygon has no rings".to_string()))?;
        let exterior = close_ring(exterior)?;
        let holes = rings.map(close_ring).collect::<MapResult<Vec<_>>>()?;
        Ok(Self { exterior, holes })
    }

    pub fn exterior(&self) -> &[Coordinate] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<Coordinate>] {
        &self.holes
    }

    pub fn extent(&self) -> BoundingBox {
        BoundingBox::from_coordinates(&self.exterior)
    }

    /// Even-odd containment: inside the exterior and outside every hole.
    pub fn contains(&self, p: Coordinate) -> bool {
        if !self.extent().contains_point(p.x, p.y) {
            return false;
        }
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }
}

fn close_ring(mut ring: Vec<Coordinate>) -> MapResult<Vec<Coordinate>> {
    if ring.iter().any(|c| !c.is_finite()) {
        return Err(MapError::InvalidCoordinate(
            "ring contains a non-finite coordinate".to_string(),
        ));
    }
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    // closed ring needs at least 3 distinct vertices + the closing one
    if ring.len() < 4 {
        return Err(MapError::InvalidGeometry(format!(
            "ring has {} coordinates, need at least 4",
            ring.len()
        )));
    }
    Ok(ring)
}

/// Ray casting against a closed ring.
fn ring_contains(ring: &[Coordinate], p: Coordinate) -> bool {
    let mut inside = false;
    for edge in ring.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Geometry of a feature on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "geometry")]
pub enum Geometry {
    Point(Coordinate),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Name of the geometry type, matching the GeoJSON spelling.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn extent(&self) -> BoundingBox {
        match self {
            Geometry::Point(c) => BoundingBox::from_coordinates(std::iter::once(c)),
            Geometry::Polygon(p) => p.extent(),
            Geometry::MultiPolygon(parts) => {
                let mut bbox = BoundingBox::empty();
                for p in parts {
                    bbox.extend(&p.extent());
                }
                bbox
            }
        }
    }

    /// Bounding-box center, the point used as a feature's centroid.
    pub fn centroid(&self) -> Option<Coordinate> {
        self.extent().center()
    }

    /// Test whether an areal geometry contains the point. Points contain nothing.
    pub fn contains_point(&self, p: Coordinate) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::Polygon(poly) => poly.contains(p),
            Geometry::MultiPolygon(parts) => parts.iter().any(|poly| poly.contains(p)),
        }
    }
}

/// Extent of several geometries unioned together.
pub fn union_extent<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> BoundingBox {
    let mut bbox = BoundingBox::empty();
    for g in geometries {
        bbox.extend(&g.extent());
    }
    bbox
}
