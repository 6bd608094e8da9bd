//! Service configuration.
//!
//! Loaded from a single YAML file. Every section is optional and falls back
//! to its defaults; a missing file means all defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use layer_engine::{ImpactPolicy, LoaderConfig, SessionConfig};
use map_common::ForecastLocation;
use nws_client::GatewayConfig;

/// Root of `weather-map.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub locations: Vec<ForecastLocation>,
    pub gateway: GatewayConfig,
    pub loader: LoaderConfig,
    pub refresh: RefreshConfig,
    pub impact: ImpactConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            gateway: GatewayConfig::default(),
            loader: LoaderConfig::default(),
            refresh: RefreshConfig::default(),
            impact: ImpactConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub retry_missing_forecasts: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            retry_missing_forecasts: true,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    pub policy: ImpactPolicy,
}

/// The forecast locations seeded when the config names none.
pub fn default_locations() -> Vec<ForecastLocation> {
    [
        ("Los Angeles", 34.0522, -118.2437),
        ("Seattle", 47.6062, -122.3321),
        ("Minneapolis", 44.9778, -93.2650),
        ("Kansas City", 39.0997, -94.5786),
        ("Miami", 25.7617, -80.1918),
        ("New York City", 40.7128, -74.0060),
        ("Salt Lake City", 40.7608, -111.8910),
        ("Dallas", 32.7831, -96.8067),
        ("Chicago", 41.8781, -87.6298),
        ("Phoenix", 33.4484, -112.0740),
        ("New Orleans", 29.9511, -90.0715),
    ]
    .into_iter()
    .map(|(name, lat, lon)| ForecastLocation::new(name, lat, lon))
    .collect()
}

impl AppConfig {
    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(
            path = %path.display(),
            locations = config.locations.len(),
            policy = ?config.impact.policy,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            locations: self.locations.clone(),
            loader: self.loader.clone(),
            impact: self.impact.policy,
            retry_missing: self.refresh.retry_missing_forecasts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.locations.len(), 11);
        assert_eq!(config.locations[10].name, "New Orleans");
    }

    #[test]
    fn test_partial_file_keeps_other_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
locations:
  - name: Boulder
    latitude: 40.015
    longitude: -105.2705
  - name: Duluth
    latitude: 46.7867
    longitude: -92.1005
    visible: false
loader:
  batch_size: 2
impact:
  policy: recompute
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.locations.len(), 2);
        assert!(config.locations[0].visible);
        assert!(!config.locations[1].visible);
        assert_eq!(config.loader.batch_size, 2);
        assert_eq!(config.loader.batch_delay_ms, 1000);
        assert_eq!(config.impact.policy, ImpactPolicy::Recompute);
        assert_eq!(config.refresh, RefreshConfig::default());
        assert_eq!(config.gateway.weather_api_url, "https://api.weather.gov");

        let session = config.session_config();
        assert_eq!(session.impact, ImpactPolicy::Recompute);
        assert!(session.retry_missing);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "loader: [not, a, map]").unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
