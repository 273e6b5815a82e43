//! Prelude module for common mapraster types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapraster::prelude::*;`

pub use crate::core::{
    config::{EngineConfig, OverlayStyle, RingWinding, TileLoadingConfig, ViewConfig},
    controller::{MapCommand, PanDirection, PanZoomController},
    geo::{GeoPoint, ProjectedPoint, TileIndex},
    map::{MapView, RenderedFrame},
    viewport::{ViewState, Viewport},
};

pub use crate::data::features::{Feature, FeatureCollection, Geometry, Polygon, Ring};

pub use crate::tiles::{
    cache::{TileCache, TileKey},
    loader::{Generation, TileBatch, TileLoader},
    source::{FetchCause, HttpTileSource, TileFetchError, TileImage, TileSource},
};

pub use crate::rendering::{BaseCompositor, FrameCompositor, OverlayRenderer, ScreenProjection};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
