//! Raster tile sources for radar overlays.
//!
//! Two flavors are supported: an OGC WMS endpoint requested tile-by-tile
//! (GetMap with a Web Mercator BBOX per tile), and an XYZ template URL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bbox::BoundingBox;
use crate::crs::MERCATOR_MAX_EXTENT;

/// Default tile edge in pixels.
pub const TILE_SIZE: u32 = 256;

/// A tile coordinate (z/x/y, XYZ row order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Bounds of this tile in Web Mercator meters.
    pub fn mercator_bbox(&self) -> BoundingBox {
        let n = 2u32.pow(self.z) as f64;
        let span = 2.0 * MERCATOR_MAX_EXTENT / n;
        let min_x = -MERCATOR_MAX_EXTENT + self.x as f64 * span;
        let max_y = MERCATOR_MAX_EXTENT - self.y as f64 * span;
        BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
    }
}

/// Where a tile layer gets its imagery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileSource {
    /// Tiled WMS GetMap requests.
    Wms {
        url: String,
        params: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_type: Option<String>,
    },
    /// `{z}/{x}/{y}` URL template.
    Xyz { url_template: String, tile_size: u32 },
}

impl TileSource {
    /// Build the request URL for one tile.
    pub fn tile_url(&self, coord: TileCoord) -> String {
        match self {
            TileSource::Xyz { url_template, .. } => url_template
                .replace("{z}", &coord.z.to_string())
                .replace("{x}", &coord.x.to_string())
                .replace("{y}", &coord.y.to_string()),
            TileSource::Wms { url, params, .. } => {
                let bbox = coord.mercator_bbox();
                let mut query = vec![
                    "SERVICE=WMS".to_string(),
                    "VERSION=1.1.1".to_string(),
                    "REQUEST=GetMap".to_string(),
                ];
                query.extend(params.iter().map(|(k, v)| format!("{}={}", k, v)));
                query.push(format!("WIDTH={}", TILE_SIZE));
                query.push(format!("HEIGHT={}", TILE_SIZE));
                query.push(format!(
                    "BBOX={},{},{},{}",
                    bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
                ));
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}{}", url, sep, query.join("&"))
            }
        }
    }
}

/// Everything needed to put a tile layer on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayerSpec {
    pub source: TileSource,
    pub opacity: f32,
    pub z_index: i32,
    pub visible: bool,
}
