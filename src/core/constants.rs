//! Core constants for the tiling scheme, default view and overlay styling.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Square tile size in unscaled pixels.
pub const TILE_SIZE: u32 = 256;

/// Lowest zoom level a map instance may step to by default.
pub const DEFAULT_ZOOM_MIN: u8 = 10;

/// Highest zoom level a map instance may step to by default.
pub const DEFAULT_ZOOM_MAX: u8 = 19;

/// Deepest zoom the tile math supports (`2^30` tiles per axis still fits `u32`).
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Zoom level a new map instance starts at.
pub const DEFAULT_INITIAL_ZOOM: u8 = 10;

/// Tile offset a new map instance starts at (relative to the grid centre).
pub const DEFAULT_INITIAL_OFFSET: (i64, i64) = (38, -176);

/// Tiles of margin fetched beyond the visible area on each side.
pub const VISIBLE_TILE_MARGIN: i64 = 1;

/// Opacity multiplier applied to the whole overlay when blending it over the tiles.
pub const OVERLAY_ALPHA_FACTOR: f64 = 0.5;

/// RGBA colour of line strokes and ring outlines.
pub const DEFAULT_STROKE_COLOR: [u8; 4] = [255, 0, 0, 255];

/// RGBA colour of polygon fills.
pub const DEFAULT_FILL_COLOR: [u8; 4] = [83, 118, 245, 255];

/// Colour left behind where no tile could be drawn.
pub const DEFAULT_BACKGROUND_COLOR: [u8; 4] = [0, 0, 0, 0];

/// Default tile server.
pub const OSM_TILE_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Attribution label and link required by the default tile server.
pub const OSM_ATTRIBUTION: (&str, &str) = ("OpenStreetMap", "https://openstreetmap.org");

/// User agent sent with tile requests; public tile servers reject anonymous clients.
pub const USER_AGENT: &str = concat!("mapraster/", env!("CARGO_PKG_VERSION"));
