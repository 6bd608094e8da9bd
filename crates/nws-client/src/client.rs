//! HTTP implementation of [`GeoDataGateway`] backed by `reqwest`.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use map_common::{MapError, MapResult};

use crate::config::GatewayConfig;
use crate::gateway::GeoDataGateway;
use crate::radar::RadarEndpoints;
use crate::schema::{
    AlertBatch, AlertCollectionResponse, Forecast, ForecastResponse, GridPoint,
    GridPointResponse, RainViewerIndex,
};

/// Content type served by the NWS API.
const GEO_JSON: &str = "application/geo+json";

/// Client for api.weather.gov plus the RainViewer index.
pub struct NwsClient {
    client: Client,
    config: GatewayConfig,
}

impl NwsClient {
    pub fn new(config: GatewayConfig) -> MapResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(GEO_JSON));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| MapError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, url: &str) -> MapResult<T> {
        debug!(endpoint, url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MapError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MapError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| MapError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| MapError::MalformedPayload {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn try_grid_point(&self, latitude: f64, longitude: f64) -> MapResult<GridPoint> {
        let url = points_url(&self.config.weather_api_url, latitude, longitude);
        let resp: GridPointResponse = self.get_json("points", &url).await?;
        Ok(resp.into())
    }

    #[instrument(skip(self), fields(grid = %point.grid_id, x = point.grid_x, y = point.grid_y))]
    pub async fn try_forecast(&self, point: &GridPoint) -> MapResult<Forecast> {
        let url = forecast_url(&self.config.weather_api_url, point, false);
        let resp: ForecastResponse = self.get_json("forecast", &url).await?;
        let forecast = Forecast::from_response(resp);
        if forecast.features.is_empty() {
            return Err(MapError::MalformedPayload {
                endpoint: "forecast".to_string(),
                message: "forecast has no usable geometry".to_string(),
            });
        }
        Ok(forecast)
    }

    #[instrument(skip(self), fields(grid = %point.grid_id, x = point.grid_x, y = point.grid_y))]
    pub async fn try_hourly_forecast(&self, point: &GridPoint) -> MapResult<Forecast> {
        let url = forecast_url(&self.config.weather_api_url, point, true);
        let resp: ForecastResponse = self.get_json("forecast_hourly", &url).await?;
        Ok(Forecast::from_response(resp))
    }

    #[instrument(skip(self))]
    pub async fn try_active_alerts(&self) -> MapResult<AlertBatch> {
        let url = format!("{}/alerts/active", self.config.weather_api_url.trim_end_matches('/'));
        let resp: AlertCollectionResponse = self.get_json("alerts", &url).await?;
        let batch = AlertBatch::from_response(resp);
        if batch.skipped > 0 {
            metrics::counter!("gateway_malformed_features_total").increment(batch.skipped as u64);
        }
        Ok(batch)
    }

    #[instrument(skip(self))]
    pub async fn try_radar_index(&self) -> MapResult<RainViewerIndex> {
        self.get_json("radar_index", &self.config.rainviewer_url).await
    }
}

/// `/points/{lat},{lon}` with the 4-decimal precision NWS accepts.
pub fn points_url(base: &str, latitude: f64, longitude: f64) -> String {
    format!(
        "{}/points/{:.4},{:.4}",
        base.trim_end_matches('/'),
        latitude,
        longitude
    )
}

pub fn forecast_url(base: &str, point: &GridPoint, hourly: bool) -> String {
    format!(
        "{}/gridpoints/{}/{},{}/forecast{}",
        base.trim_end_matches('/'),
        point.grid_id,
        point.grid_x,
        point.grid_y,
        if hourly { "/hourly" } else { "" }
    )
}

/// Record the outcome of a fetch and collapse failures to `None`.
fn settle<T>(endpoint: &'static str, result: MapResult<T>) -> Option<T> {
    match result {
        Ok(value) => {
            metrics::counter!("gateway_requests_total", "endpoint" => endpoint, "outcome" => "success")
                .increment(1);
            Some(value)
        }
        Err(e) => {
            warn!(endpoint, error = %e, "Remote fetch failed");
            metrics::counter!("gateway_requests_total", "endpoint" => endpoint, "outcome" => "failure")
                .increment(1);
            None
        }
    }
}

#[async_trait]
impl GeoDataGateway for NwsClient {
    async fn grid_point(&self, latitude: f64, longitude: f64) -> Option<GridPoint> {
        settle("points", self.try_grid_point(latitude, longitude).await)
    }

    async fn forecast(&self, point: &GridPoint) -> Option<Forecast> {
        settle("forecast", self.try_forecast(point).await)
    }

    async fn hourly_forecast(&self, point: &GridPoint) -> Option<Forecast> {
        settle("forecast_hourly", self.try_hourly_forecast(point).await)
    }

    async fn active_alerts(&self) -> Option<AlertBatch> {
        settle("alerts", self.try_active_alerts().await)
    }

    async fn radar_index(&self) -> Option<RainViewerIndex> {
        settle("radar_index", self.try_radar_index().await)
    }

    fn radar_endpoints(&self) -> RadarEndpoints {
        self.config.radar_endpoints()
    }
}
