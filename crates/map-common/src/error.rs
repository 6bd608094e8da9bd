//! Error types for the weather-map crates.

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// Primary error type for layer, geometry and gateway operations.
#[derive(Debug, Error)]
pub enum MapError {
    // === Layer Errors ===
    #[error("Unknown layer kind: {0}")]
    UnknownLayerKind(String),

    #[error("Layer not found: {kind}/{name}")]
    LayerNotFound { kind: String, name: String },

    #[error("Unknown radar source: {0}")]
    UnknownRadarSource(String),

    #[error("Operation not supported for {kind} layers: {operation}")]
    InvalidOperation { kind: String, operation: String },

    // === Geometry Errors ===
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    // === Remote Data Errors ===
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed {endpoint} payload: {message}")]
    MalformedPayload { endpoint: String, message: String },

    #[error("Radar index has no usable frames")]
    NoRadarFrames,

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MapError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            MapError::UnknownLayerKind(_)
            | MapError::UnknownRadarSource(_)
            | MapError::InvalidOperation { .. }
            | MapError::InvalidGeometry(_)
            | MapError::UnsupportedGeometry(_)
            | MapError::InvalidCoordinate(_) => 400,

            MapError::LayerNotFound { .. } => 404,

            MapError::Transport { .. }
            | MapError::HttpStatus { .. }
            | MapError::MalformedPayload { .. }
            | MapError::NoRadarFrames => 502,

            _ => 500,
        }
    }

    /// Whether this error came from talking to a remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MapError::Transport { .. }
                | MapError::HttpStatus { .. }
                | MapError::MalformedPayload { .. }
                | MapError::NoRadarFrames
        )
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MapError::UnknownLayerKind("x".into()).http_status_code(), 400);
        assert_eq!(
            MapError::LayerNotFound {
                kind: "event".into(),
                name: "Flood Warning".into()
            }
            .http_status_code(),
            404
        );
        assert_eq!(
            MapError::HttpStatus {
                url: "https://api.weather.gov/alerts/active".into(),
                status: 503
            }
            .http_status_code(),
            502
        );
        assert_eq!(MapError::ConfigError("bad".into()).http_status_code(), 500);
    }

    #[test]
    fn test_remote_classification() {
        assert!(MapError::NoRadarFrames.is_remote());
        assert!(!MapError::InvalidGeometry("ring".into()).is_remote());
    }
}
