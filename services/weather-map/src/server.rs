//! HTTP control surface for the map session.
//!
//! Stands in for the sidebar and info panel of an interactive client:
//! - Layer listing and visibility commands
//! - Pointer and click events, hit-tested against the headless map
//! - Info-panel contents
//! - Manual refresh, health and Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use layer_engine::{
    ClickOutcome, HeadlessMap, HitTarget, InfoPanelState, LocationRecord, MapSession,
    RefreshSummary,
};
use map_common::{LayerDescriptor, LayerKind, MapError};
use nws_client::GeoDataGateway;

/// The session type the service runs.
pub type Session = MapSession<dyn GeoDataGateway, HeadlessMap, InfoPanelState>;

// ============================================================================
// Shared State
// ============================================================================

pub struct AppState {
    pub session: Session,
    /// Absent when no recorder was installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// A WGS84 map position.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MapPoint {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayersResponse {
    pub forecast: Vec<LayerDescriptor>,
    pub event: Vec<LayerDescriptor>,
    pub radar: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityResponse {
    pub kind: LayerKind,
    pub name: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HitResponse {
    Forecast {
        name: String,
    },
    Event {
        name: String,
        index: usize,
        alert_id: String,
        severity: Option<String>,
    },
}

impl From<HitTarget> for HitResponse {
    fn from(target: HitTarget) -> Self {
        match target {
            HitTarget::Forecast { name } => HitResponse::Forecast { name },
            HitTarget::Event { name, index, alert } => HitResponse::Event {
                name,
                index,
                alert_id: alert.id.clone(),
                severity: alert.severity.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PointerResponse {
    pub hit: Option<HitResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickResponse {
    pub selected: Option<HitResponse>,
    pub panel_visible: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// A [`MapError`] rendered as a JSON error body with its HTTP status.
pub struct ApiError(MapError);

impl From<MapError> for ApiError {
    fn from(e: MapError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the control surface router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/layers", get(layers_handler))
        .route("/layers/:kind", get(layer_kind_handler))
        .route("/layers/:kind/:name/:action", post(layer_command_handler))
        .route("/locations", get(locations_handler))
        .route("/map/pointer", post(pointer_handler))
        .route("/map/click", post(click_handler))
        .route("/info-panel", get(info_panel_handler))
        .route("/refresh", post(refresh_handler))
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "weather-map"
    }))
}

/// GET /metrics - Prometheus text exposition
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// GET /layers - descriptors of every kind
async fn layers_handler(Extension(state): Extension<Arc<AppState>>) -> Json<LayersResponse> {
    let store = state.session.store();
    Json(LayersResponse {
        forecast: store.descriptors(LayerKind::Forecast),
        event: store.descriptors(LayerKind::Event),
        radar: store.descriptors(LayerKind::Radar),
    })
}

/// GET /layers/:kind
async fn layer_kind_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<LayerDescriptor>>, ApiError> {
    let kind: LayerKind = kind.parse()?;
    Ok(Json(state.session.store().descriptors(kind)))
}

/// POST /layers/:kind/:name/toggle and POST /layers/radar/:name/activate
async fn layer_command_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((kind, name, action)): Path<(String, String, String)>,
) -> Result<Json<VisibilityResponse>, ApiError> {
    let kind: LayerKind = kind.parse()?;
    let visible = match action.as_str() {
        "toggle" => state.session.toggle(kind, &name)?,
        "activate" if kind == LayerKind::Radar => {
            state.session.activate_radar(&name)?;
            true
        }
        _ => {
            return Err(MapError::InvalidOperation {
                kind: kind.to_string(),
                operation: action.clone(),
            }
            .into())
        }
    };
    info!(kind = %kind, layer = %name, visible, "Layer command applied");
    metrics::counter!("layer_commands_total", "kind" => kind.as_str(), "action" => action).increment(1);
    Ok(Json(VisibilityResponse {
        kind,
        name,
        visible,
    }))
}

/// GET /locations - impact state of every forecast location record
async fn locations_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<LocationRecord>> {
    Json(state.session.location_records())
}

/// POST /map/pointer
async fn pointer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(point): Json<MapPoint>,
) -> Json<PointerResponse> {
    let hit = state.session.pointer_move(point.lon, point.lat);
    debug!(lon = point.lon, lat = point.lat, hit = hit.is_some(), "Pointer moved");
    Json(PointerResponse {
        hit: hit.map(HitResponse::from),
    })
}

/// POST /map/click
async fn click_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(point): Json<MapPoint>,
) -> Json<ClickResponse> {
    let selected = match state.session.click(point.lon, point.lat) {
        ClickOutcome::Selected(target) => Some(HitResponse::from(target)),
        ClickOutcome::Dismissed => None,
    };
    Json(ClickResponse {
        panel_visible: selected.is_some(),
        selected,
    })
}

/// GET /info-panel
async fn info_panel_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.session.panel().snapshot())
}

/// POST /refresh - one refresh cycle, out of schedule
async fn refresh_handler(Extension(state): Extension<Arc<AppState>>) -> Json<RefreshSummary> {
    Json(state.session.refresh().await)
}

// ============================================================================
// Server
// ============================================================================

pub async fn run_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting control server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
