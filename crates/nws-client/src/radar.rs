//! Radar tile-source construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use map_common::{MapResult, TileSource};

use crate::schema::RainViewerIndex;

/// Tile size requested from RainViewer.
pub const RAINVIEWER_TILE_SIZE: u32 = 256;

/// Where radar imagery is served from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarEndpoints {
    pub noaa_wms_url: String,
    pub rainviewer_tile_url: String,
}

impl Default for RadarEndpoints {
    fn default() -> Self {
        crate::config::GatewayConfig::default().radar_endpoints()
    }
}

/// NOAA base reflectivity (CONUS) as a tiled WMS source.
pub fn noaa_tile_source(wms_url: &str) -> TileSource {
    let params: BTreeMap<String, String> = [
        ("LAYERS", "conus_bref_qcd"),
        ("TILED", "true"),
        ("FORMAT", "image/png"),
        ("STYLES", "radar_reflectivity"),
        ("SRS", "EPSG:3857"),
        ("TRANSPARENT", "true"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    TileSource::Wms {
        url: wms_url.to_string(),
        params,
        server_type: Some("geoserver".to_string()),
    }
}

/// XYZ source for the current RainViewer frame.
pub fn rainviewer_tile_source(index: &RainViewerIndex, tile_url: &str) -> MapResult<TileSource> {
    let frame = index.current_frame()?;
    Ok(TileSource::Xyz {
        url_template: format!(
            "{}{}/{}/{{z}}/{{x}}/{{y}}/1/0_0.png",
            tile_url.trim_end_matches('/'),
            frame.path,
            RAINVIEWER_TILE_SIZE
        ),
        tile_size: RAINVIEWER_TILE_SIZE,
    })
}
