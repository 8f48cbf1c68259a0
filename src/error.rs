//! Error types for route guidance.

use thiserror::Error;

/// Route guidance error type.
#[derive(Error, Debug)]
pub enum NavError {
    /// The route cannot be navigated (no legs, no steps, bad totals).
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// A polyline with no coordinates, e.g. the geometry of the current step.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The routing provider failed or found no route.
    #[error("route recalculation failed: {0}")]
    RecalculationFailed(String),

    #[error("no navigation session has been started")]
    SessionNotActive,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("route decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("GPX parse error: {0}")]
    Gpx(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad arguments passed across the JNI boundary.
    #[error("bridge error: {0}")]
    Bridge(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
