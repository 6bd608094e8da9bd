//! Remote geodata gateway for the weather map.
//!
//! Fetches grid points, forecasts, active alerts and the RainViewer radar
//! index, validating each payload against an explicit schema at the boundary.
//! Public gateway operations never fail hard: a failed call yields `None`.

pub mod client;
pub mod config;
pub mod gateway;
pub mod geojson;
pub mod radar;
pub mod schema;

pub use client::NwsClient;
pub use config::GatewayConfig;
pub use gateway::GeoDataGateway;
pub use geojson::{parse_geometry, GeoJsonGeometry};
pub use radar::{noaa_tile_source, rainviewer_tile_source, RadarEndpoints};
pub use schema::{
    AlertBatch, AlertFeature, AlertProperties, Forecast, GridPoint, Period, RadarFrame,
    RainViewerIndex,
};
