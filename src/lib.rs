//! # mapraster
//!
//! Rendering core of a slippy map widget: Web Mercator tile math, a pan/zoom
//! viewport, async tile loading with caching and cancellation, and a vector
//! overlay blended over the tile raster.
//!
//! A [`MapView`] owns one map instance. Each call to [`MapView::render`]
//! computes the visible tiles, loads them, composes the base raster, draws the
//! current [`FeatureCollection`] on the same anchor and blends the two.

pub mod core;
pub mod data;
pub mod prelude;
pub mod rendering;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{EngineConfig, OverlayStyle, RingWinding, TileLoadingConfig, ViewConfig},
    controller::{MapCommand, PanDirection, PanZoomController},
    geo::{GeoPoint, ProjectedPoint, TileIndex},
    map::{MapView, RenderedFrame},
    viewport::{ViewState, Viewport},
};

pub use data::features::{Feature, FeatureCollection, Geometry, Polygon, Ring};

pub use rendering::{BaseCompositor, FrameCompositor, OverlayRenderer, ScreenProjection};

pub use tiles::{
    FetchCause, HttpTileSource, TileCache, TileFetchError, TileImage, TileLoader, TileSource,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    TileFetch(#[from] TileFetchError),

    #[error("Unsupported geometry kind: {0}")]
    UnsupportedGeometryKind(String),

    #[error("Malformed feature {index}: {reason}")]
    MalformedFeature { index: usize, reason: String },

    #[error("Render pass {requested} superseded by {current}")]
    Superseded { requested: u64, current: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Error type alias for convenience
pub type Error = MapError;

/// Initializes `env_logger` once; later calls are ignored
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
