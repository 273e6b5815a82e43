//! Configuration for tile loading, view limits and overlay styling
//!
//! Every section has defaults for an OpenStreetMap-backed 800x600 view,
//! so a host only needs to override what it cares about. Configurations can be
//! read from JSON; missing fields fall back to their defaults.

use crate::core::constants::{
    DEFAULT_BACKGROUND_COLOR, DEFAULT_FILL_COLOR, DEFAULT_INITIAL_OFFSET, DEFAULT_INITIAL_ZOOM,
    DEFAULT_STROKE_COLOR, DEFAULT_ZOOM_MAX, DEFAULT_ZOOM_MIN, MAX_SUPPORTED_ZOOM, OSM_ATTRIBUTION,
    OSM_TILE_URL, OVERLAY_ALPHA_FACTOR, USER_AGENT,
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tiles: TileLoadingConfig,
    pub view: ViewConfig,
    pub overlay: OverlayStyle,
}

impl EngineConfig {
    /// Parses a JSON document and validates it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tiles.validate()?;
        self.view.validate()?;
        self.overlay.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoadingConfig {
    /// Template with `{z}`, `{x}`, `{y}` (and optionally `{s}`) placeholders,
    /// or the positional `%d/%d/%d` form in zoom, x, y order
    pub url_template: String,
    /// Substituted for `{s}`, picked by `(x + y) % len`
    pub subdomains: Vec<String>,
    pub user_agent: String,
    pub attribution_label: String,
    pub attribution_url: String,
    /// Decoded tiles kept in memory
    pub cache_size: usize,
    /// Maximum concurrent tile downloads
    pub max_concurrent: usize,
    /// Per-request timeout of the HTTP client
    pub request_timeout_ms: u64,
    /// Deadline for all tiles of one render pass
    pub render_deadline_ms: u64,
}

impl TileLoadingConfig {
    pub fn low_resource() -> Self {
        Self {
            cache_size: 64,
            max_concurrent: 2,
            ..Self::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            cache_size: 16,
            max_concurrent: 4,
            request_timeout_ms: 1_000,
            render_deadline_ms: 500,
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn render_deadline(&self) -> Duration {
        Duration::from_millis(self.render_deadline_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url_template.trim().is_empty() {
            return Err(MapError::Config("tile url template is empty".to_string()));
        }
        if self.url_template.contains("{s}") && self.subdomains.is_empty() {
            return Err(MapError::Config(
                "tile url template uses {s} but no subdomains are configured".to_string(),
            ));
        }
        if self.cache_size == 0 || self.max_concurrent == 0 {
            return Err(MapError::Config(
                "cache_size and max_concurrent must be positive".to_string(),
            ));
        }
        if self.render_deadline_ms == 0 {
            return Err(MapError::Config("render_deadline_ms must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for TileLoadingConfig {
    fn default() -> Self {
        Self {
            url_template: OSM_TILE_URL.to_string(),
            subdomains: Vec::new(),
            user_agent: USER_AGENT.to_string(),
            attribution_label: OSM_ATTRIBUTION.0.to_string(),
            attribution_url: OSM_ATTRIBUTION.1.to_string(),
            cache_size: 256,
            max_concurrent: 8,
            request_timeout_ms: 10_000,
            render_deadline_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub initial_zoom: u8,
    pub initial_offset: (i64, i64),
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub display_scale: f64,
}

impl ViewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.zoom_min > self.zoom_max || self.zoom_max > MAX_SUPPORTED_ZOOM {
            return Err(MapError::Config(format!(
                "invalid zoom range {}..={}",
                self.zoom_min, self.zoom_max
            )));
        }
        if !(self.display_scale.is_finite() && self.display_scale > 0.0) {
            return Err(MapError::Config(format!(
                "display scale must be positive, got {}",
                self.display_scale
            )));
        }
        Ok(())
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_min: DEFAULT_ZOOM_MIN,
            zoom_max: DEFAULT_ZOOM_MAX,
            initial_zoom: DEFAULT_INITIAL_ZOOM,
            initial_offset: DEFAULT_INITIAL_OFFSET,
            pixel_width: 800,
            pixel_height: 600,
            display_scale: 1.0,
        }
    }
}

/// How adjacent polygon rings are brought into alternating orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingWinding {
    /// Compare endpoints of neighbouring rings and reverse on a match
    #[default]
    Endpoints,
    /// Use the signed area of each ring
    SignedArea,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub stroke_color: [u8; 4],
    pub fill_color: [u8; 4],
    pub background_color: [u8; 4],
    /// Multiplier applied to the overlay's alpha before blending
    pub alpha_factor: f64,
    pub winding: RingWinding,
}

impl OverlayStyle {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha_factor) {
            return Err(MapError::Config(format!(
                "alpha_factor must be within 0..=1, got {}",
                self.alpha_factor
            )));
        }
        Ok(())
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_color: DEFAULT_STROKE_COLOR,
            fill_color: DEFAULT_FILL_COLOR,
            background_color: DEFAULT_BACKGROUND_COLOR,
            alpha_factor: OVERLAY_ALPHA_FACTOR,
            winding: RingWinding::Endpoints,
        }
    }
}
