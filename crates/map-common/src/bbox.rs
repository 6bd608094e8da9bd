//! Bounding box (extent) types and operations.

use serde::{Deserialize, Serialize};

use crate::geometry::Coordinate;

/// A projected or geographic extent.
///
/// Extents are accumulated from geometry coordinates, so an "empty" extent
/// (no coordinates seen yet) is represented with inverted infinite bounds
/// and reports `is_empty() == true`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An extent containing nothing. Extending it with a point yields that point.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Compute the extent of a set of coordinates.
    pub fn from_coordinates<'a>(coords: impl IntoIterator<Item = &'a Coordinate>) -> Self {
        let mut bbox = Self::empty();
        for c in coords {
            bbox.extend_point(*c);
        }
        bbox
    }

    /// True if no coordinate has been added to this extent.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Grow the extent to include a point.
    pub fn extend_point(&mut self, c: Coordinate) {
        self.min_x = self.min_x.min(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_x = self.max_x.max(c.x);
        self.max_y = self.max_y.max(c.y);
    }

    /// Grow the extent to include another extent (union).
    pub fn extend(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Center of the extent, or `None` for an empty extent.
    pub fn center(&self) -> Option<Coordinate> {
        if self.is_empty() {
            return None;
        }
        Some(Coordinate::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        ))
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_extent() {
        let bbox = BoundingBox::empty();
        assert!(bbox.is_empty());
        assert_eq!(bbox.center(), None);
    }

    #[test]
    fn test_extend_and_center() {
        let coords = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(10.0, 4.0),
            Coordinate::new(2.0, -6.0),
        ];
        let bbox = BoundingBox::from_coordinates(&coords);
        assert_eq!(bbox, BoundingBox::new(0.0, -6.0, 10.0, 4.0));
        assert_eq!(bbox.center(), Some(Coordinate::new(5.0, -1.0)));
    }

    #[test]
    fn test_union_ignores_empty() {
        let mut a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        a.extend(&BoundingBox::empty());
        assert_eq!(a, BoundingBox::new(0.0, 0.0, 1.0, 1.0));

        a.extend(&BoundingBox::new(5.0, 5.0, 6.0, 8.0));
        assert_eq!(a, BoundingBox::new(0.0, 0.0, 6.0, 8.0));
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
