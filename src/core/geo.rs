use crate::core::constants::{MAX_SUPPORTED_ZOOM, TILE_SIZE};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Represents a geographical coordinate (WGS84) in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// Creates a new point from `[longitude, latitude]` order, as GeoJSON does
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both components are finite and the latitude can be projected
    pub fn is_projectable(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite() && self.lat.abs() < 90.0
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(coords: [f64; 2]) -> Self {
        Self::new(coords[0], coords[1])
    }
}

impl From<geo_types::Coord<f64>> for GeoPoint {
    fn from(coord: geo_types::Coord<f64>) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl From<GeoPoint> for geo_types::Coord<f64> {
    fn from(point: GeoPoint) -> Self {
        geo_types::Coord {
            x: point.lon,
            y: point.lat,
        }
    }
}

/// A point in Web Mercator space on the unit sphere (x = λ, y = ln tan(π/4 + φ/2))
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A tile address in the slippy map tiling scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileIndex {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Builds an index from signed candidate coordinates, rejecting anything
    /// outside `[0, 2^zoom)` on either axis and zooms deeper than
    /// `MAX_SUPPORTED_ZOOM`
    pub fn checked(x: i64, y: i64, zoom: u8) -> Option<Self> {
        if zoom > MAX_SUPPORTED_ZOOM {
            return None;
        }
        let count = tile_count(zoom) as i64;
        if x < 0 || y < 0 || x >= count || y >= count {
            return None;
        }
        Some(Self::new(x as u32, y as u32, zoom))
    }

    /// Checks if the tile exists at its zoom level
    pub fn is_valid(&self) -> bool {
        if self.zoom > MAX_SUPPORTED_ZOOM {
            return false;
        }
        let count = tile_count(self.zoom);
        (self.x as u64) < count && (self.y as u64) < count
    }

    /// Geographic position of the tile's north-west corner
    pub fn north_west(&self) -> GeoPoint {
        tile_to_geo(self.x as f64, self.y as f64, self.zoom)
    }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom`, saturating at `u64::MAX` past zoom 63
pub fn tile_count(zoom: u8) -> u64 {
    1u64.checked_shl(zoom as u32).unwrap_or(u64::MAX)
}

/// Tile-space position of the viewport centre for a pan offset.
///
/// The result is fractional at zoom 0 (the centre of the single tile) and a
/// tile corner at every other zoom.
pub fn tile_center_index(offset_x: i64, offset_y: i64, zoom: u8) -> (f64, f64) {
    let half = tile_count(zoom) as f64 / 2.0;
    (offset_x as f64 + half, offset_y as f64 + half)
}

/// Inverse Web Mercator tile formula; exact at tile corners
pub fn tile_to_geo(tile_x: f64, tile_y: f64, zoom: u8) -> GeoPoint {
    let n = tile_count(zoom) as f64;
    let x = tile_x / n;
    let y = tile_y / n;

    let lon = (2.0 * x - 1.0) * 180.0;
    let lat = (2.0 * (-(2.0 * y - 1.0) * PI).exp().atan() - FRAC_PI_2).to_degrees();

    GeoPoint::new(lon, lat)
}

/// Fractional tile coordinates of a geographic point
pub fn geo_to_tile(point: GeoPoint, zoom: u8) -> (f64, f64) {
    let n = tile_count(zoom) as f64;
    let projected = geo_to_mercator(point);
    let x = (projected.x / PI + 1.0) / 2.0 * n;
    let y = (1.0 - projected.y / PI) / 2.0 * n;
    (x, y)
}

/// Forward WGS84 -> Web Mercator projection
pub fn geo_to_mercator(point: GeoPoint) -> ProjectedPoint {
    let x = point.lon.to_radians();
    let y = (FRAC_PI_4 + point.lat.to_radians() / 2.0).tan().ln();
    ProjectedPoint::new(x, y)
}

/// Inverse Web Mercator -> WGS84 projection
pub fn mercator_to_geo(point: ProjectedPoint) -> GeoPoint {
    let lon = point.x.to_degrees();
    let lat = (2.0 * point.y.exp().atan() - FRAC_PI_2).to_degrees();
    GeoPoint::new(lon, lat)
}

/// Closed-form projected position of a tile-space point
pub fn tile_to_mercator(tile_x: f64, tile_y: f64, zoom: u8) -> ProjectedPoint {
    let n = tile_count(zoom) as f64;
    ProjectedPoint::new((2.0 * tile_x / n - 1.0) * PI, (1.0 - 2.0 * tile_y / n) * PI)
}

/// Projected units covered by one unscaled pixel of the tile at `(tile_x, tile_y)`,
/// along x and y.
///
/// Measured from the tile's top-left corner to the corner one tile to the right
/// and one tile down, so no isotropy is assumed.
pub fn mercator_tile_size(tile_x: f64, tile_y: f64, zoom: u8) -> (f64, f64) {
    let top_left = geo_to_mercator(tile_to_geo(tile_x, tile_y, zoom));
    let top_right = geo_to_mercator(tile_to_geo(tile_x + 1.0, tile_y, zoom));
    let bottom_left = geo_to_mercator(tile_to_geo(tile_x, tile_y + 1.0, zoom));

    let width = top_right.x - top_left.x;
    let height = top_left.y - bottom_left.y;

    (width / TILE_SIZE as f64, height / TILE_SIZE as f64)
}
