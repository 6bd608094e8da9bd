//! Staggered, batched loading of forecast locations.
//!
//! Locations are split into fixed-size batches. Every fetch chain in a batch
//! (grid point, then forecast, then hourly forecast) runs concurrently;
//! results are delivered as each chain settles, and the next batch starts a
//! fixed delay after the whole batch has settled. Event and radar loading
//! are offset from forecast loading by their own fixed delays.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use map_common::{ForecastLocation, MapResult, RadarSource, TileSource};
use nws_client::{noaa_tile_source, rainviewer_tile_source, AlertBatch, Forecast, GeoDataGateway};

/// Loader tuning, in the units the config file uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub event_delay_ms: u64,
    pub noaa_radar_delay_ms: u64,
    pub rainviewer_delay_ms: u64,
    /// Hourly periods kept per location.
    pub hourly_periods: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay_ms: 1000,
            event_delay_ms: 500,
            noaa_radar_delay_ms: 1000,
            rainviewer_delay_ms: 1500,
            hourly_periods: 6,
        }
    }
}

/// Independently scheduled parts of a full load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Forecast,
    Events,
    Radar(RadarSource),
}

impl LoaderConfig {
    /// Delay of a phase relative to the start of the load.
    pub fn phase_delay(&self, phase: LoadPhase) -> Duration {
        let ms = match phase {
            LoadPhase::Forecast => 0,
            LoadPhase::Events => self.event_delay_ms,
            LoadPhase::Radar(RadarSource::Noaa) => self.noaa_radar_delay_ms,
            LoadPhase::Radar(RadarSource::RainViewer) => self.rainviewer_delay_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// A location whose fetch chain succeeded.
#[derive(Debug, Clone)]
pub struct LoadedForecast {
    pub location: ForecastLocation,
    pub forecast: Forecast,
    pub hourly: Forecast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub batches: usize,
    pub loaded: usize,
    pub skipped: usize,
}

pub struct StaggeredLoader<G: GeoDataGateway + ?Sized> {
    gateway: Arc<G>,
    config: LoaderConfig,
}

impl<G: GeoDataGateway + ?Sized> StaggeredLoader<G> {
    pub fn new(gateway: Arc<G>, config: LoaderConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Run one location's fetch chain. `None` if the grid point or forecast
    /// fetch failed; a failed hourly fetch yields an empty hourly forecast.
    pub async fn load_location(&self, location: ForecastLocation) -> Option<LoadedForecast> {
        let point = self
            .gateway
            .grid_point(location.latitude, location.longitude)
            .await?;
        let forecast = self.gateway.forecast(&point).await?;
        let mut hourly = match self.gateway.hourly_forecast(&point).await {
            Some(h) => h,
            None => {
                debug!(location = %location.name, "No hourly forecast, continuing without");
                Forecast::empty()
            }
        };
        hourly.periods.truncate(self.config.hourly_periods);

        Some(LoadedForecast {
            location,
            forecast,
            hourly,
        })
    }

    /// Load every location in batches, calling `on_loaded` as each chain
    /// succeeds. Failed locations are counted and skipped.
    #[instrument(skip(self, locations, on_loaded), fields(count = locations.len()))]
    pub async fn load_forecasts<F>(&self, locations: &[ForecastLocation], mut on_loaded: F) -> LoadSummary
    where
        F: FnMut(LoadedForecast),
    {
        let mut summary = LoadSummary::default();
        let batch_size = self.config.batch_size.max(1);

        for (i, batch) in locations.chunks(batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
            summary.batches += 1;

            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|location| {
                    let name = location.name.clone();
                    let fut = self.load_location(location.clone());
                    async move { (name, fut.await) }
                })
                .collect();

            while let Some((name, result)) = pending.next().await {
                match result {
                    Some(loaded) => {
                        summary.loaded += 1;
                        on_loaded(loaded);
                    }
                    None => {
                        warn!(location = %name, batch = i, "Skipping forecast location");
                        metrics::counter!("forecast_layers_skipped_total").increment(1);
                        summary.skipped += 1;
                    }
                }
            }
            debug!(batch = i, size = batch.len(), "Batch settled");
        }

        info!(
            batches = summary.batches,
            loaded = summary.loaded,
            skipped = summary.skipped,
            "Forecast load complete"
        );
        summary
    }

    pub async fn load_alerts(&self) -> Option<AlertBatch> {
        self.gateway.active_alerts().await
    }

    /// Tile source for a radar provider. Only RainViewer needs a fetch.
    pub async fn radar_source(&self, source: RadarSource) -> Option<TileSource> {
        let endpoints = self.gateway.radar_endpoints();
        match source {
            RadarSource::Noaa => Some(noaa_tile_source(&endpoints.noaa_wms_url)),
            RadarSource::RainViewer => {
                let index = self.gateway.radar_index().await?;
                let tiles: MapResult<TileSource> =
                    rainviewer_tile_source(&index, &endpoints.rainviewer_tile_url);
                match tiles {
                    Ok(tiles) => Some(tiles),
                    Err(e) => {
                        warn!(error = %e, "RainViewer index unusable");
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::sample_locations;
    use test_utils::FakeGateway;

    #[test]
    fn test_phase_delays_order_forecast_first_radar_last() {
        let config = LoaderConfig::default();
        let forecast = config.phase_delay(LoadPhase::Forecast);
        let events = config.phase_delay(LoadPhase::Events);
        let noaa = config.phase_delay(LoadPhase::Radar(RadarSource::Noaa));
        let rainviewer = config.phase_delay(LoadPhase::Radar(RadarSource::RainViewer));
        assert!(forecast < events && events < noaa && noaa < rainviewer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_failure_is_tolerated_and_truncated() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(10)));
        let locations = sample_locations(2);
        gw.fail_hourly(locations[0].latitude, locations[0].longitude);

        let loader = StaggeredLoader::new(gw.clone(), LoaderConfig::default());
        let first = loader.load_location(locations[0].clone()).await.unwrap();
        assert!(first.hourly.periods.is_empty());

        let second = loader.load_location(locations[1].clone()).await.unwrap();
        assert_eq!(second.hourly.periods.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_batch_size_treated_as_one() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(10)));
        let config = LoaderConfig {
            batch_size: 0,
            ..Default::default()
        };
        let loader = StaggeredLoader::new(gw.clone(), config);
        let summary = loader.load_forecasts(&sample_locations(2), |_| {}).await;
        assert_eq!(summary.batches, 2);
        assert_eq!(gw.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_radar_sources() {
        let gw = Arc::new(FakeGateway::new(Duration::from_millis(10)));
        let loader = StaggeredLoader::new(gw.clone(), LoaderConfig::default());
        assert!(matches!(
            loader.radar_source(RadarSource::Noaa).await,
            Some(TileSource::Wms { .. })
        ));
        assert!(matches!(
            loader.radar_source(RadarSource::RainViewer).await,
            Some(TileSource::Xyz { .. })
        ));

        gw.set_radar_index(Some(Default::default()));
        assert!(loader.radar_source(RadarSource::RainViewer).await.is_none());
        gw.set_radar_index(None);
        assert!(loader.radar_source(RadarSource::RainViewer).await.is_none());
    }
}
