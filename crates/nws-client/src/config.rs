//! Gateway endpoint configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::radar::RadarEndpoints;

/// Base URLs and HTTP settings for every remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// NWS API root.
    pub weather_api_url: String,
    /// NOAA GeoServer WMS endpoint for base reflectivity.
    pub noaa_wms_url: String,
    /// RainViewer frame index.
    pub rainviewer_url: String,
    /// Host serving RainViewer tiles.
    pub rainviewer_tile_url: String,
    /// NWS rejects requests without a User-Agent.
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            weather_api_url: "https://api.weather.gov".to_string(),
            noaa_wms_url: "https://opengeo.ncep.noaa.gov/geoserver/conus/conus_bref_qcd/ows"
                .to_string(),
            rainviewer_url: "https://api.rainviewer.com/public/weather-maps.json".to_string(),
            rainviewer_tile_url: "https://tilecache.rainviewer.com".to_string(),
            user_agent: format!("weather-map/{} (ops@example.com)", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn radar_endpoints(&self) -> RadarEndpoints {
        RadarEndpoints {
            noaa_wms_url: self.noaa_wms_url.clone(),
            rainviewer_tile_url: self.rainviewer_tile_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"weather_api_url": "http://localhost:9000"}"#).unwrap();
        assert_eq!(config.weather_api_url, "http://localhost:9000");
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.noaa_wms_url.ends_with("/ows"));
    }
}
