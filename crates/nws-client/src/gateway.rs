//! The gateway abstraction consumed by the loading pipeline.

use async_trait::async_trait;

use crate::radar::RadarEndpoints;
use crate::schema::{AlertBatch, Forecast, GridPoint, RainViewerIndex};

/// Remote geodata operations.
///
/// Every fetch returns `None` on failure. Implementations log the cause; they
/// never retry and never surface the error to the caller.
#[async_trait]
pub trait GeoDataGateway: Send + Sync {
    /// Resolve a lat/lon to its forecast grid cell.
    async fn grid_point(&self, latitude: f64, longitude: f64) -> Option<GridPoint>;

    /// Twice-daily forecast for a grid cell. Always carries geometry.
    async fn forecast(&self, point: &GridPoint) -> Option<Forecast>;

    /// Hourly forecast for a grid cell.
    async fn hourly_forecast(&self, point: &GridPoint) -> Option<Forecast>;

    /// Currently active alerts with usable geometry.
    async fn active_alerts(&self) -> Option<AlertBatch>;

    /// RainViewer frame index.
    async fn radar_index(&self) -> Option<RainViewerIndex>;

    /// Static radar tile endpoints.
    fn radar_endpoints(&self) -> RadarEndpoints;
}
