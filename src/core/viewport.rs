use crate::core::constants::{MAX_SUPPORTED_ZOOM, TILE_SIZE, VISIBLE_TILE_MARGIN};
use crate::core::geo::{self, TileIndex};
use serde::{Deserialize, Serialize};

/// Manages the current view of the map: pan offset, zoom and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width of the pixel buffer in device pixels
    pub pixel_width: u32,
    /// Height of the pixel buffer in device pixels
    pub pixel_height: u32,
    /// Device pixel density multiplier (2.0 on a high density screen)
    pub display_scale: f64,
    /// The current zoom level
    pub zoom: u8,
    /// Pan position in tiles, relative to the tile grid centre
    pub tile_offset_x: i64,
    pub tile_offset_y: i64,
}

/// The part of the view state a host displays or persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub x: i64,
    pub y: i64,
    pub zoom: u8,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(pixel_width: u32, pixel_height: u32, display_scale: f64, zoom: u8) -> Self {
        Self {
            pixel_width,
            pixel_height,
            display_scale,
            zoom,
            tile_offset_x: 0,
            tile_offset_y: 0,
        }
    }

    /// Sets the pan offset
    pub fn with_offset(mut self, tile_offset_x: i64, tile_offset_y: i64) -> Self {
        self.tile_offset_x = tile_offset_x;
        self.tile_offset_y = tile_offset_y;
        self
    }

    /// Sets the viewport size and display scale
    pub fn set_size(&mut self, pixel_width: u32, pixel_height: u32, display_scale: f64) {
        self.pixel_width = pixel_width;
        self.pixel_height = pixel_height;
        self.display_scale = display_scale;
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            x: self.tile_offset_x,
            y: self.tile_offset_y,
            zoom: self.zoom,
        }
    }

    /// Display scale as used for tile sizing; densities below 1 render at 1
    pub fn effective_scale(&self) -> f64 {
        if self.display_scale.is_finite() && self.display_scale > 1.0 {
            self.display_scale
        } else {
            1.0
        }
    }

    /// Edge length of one tile in device pixels
    pub fn device_tile_size(&self) -> u32 {
        ((TILE_SIZE as f64) * self.effective_scale()).round() as u32
    }

    /// Integer index of the tile whose top-left corner sits at the screen anchor
    pub fn center_tile(&self) -> (i64, i64) {
        let half = (geo::tile_count(self.zoom) / 2) as i64;
        (
            self.tile_offset_x.saturating_add(half),
            self.tile_offset_y.saturating_add(half),
        )
    }

    /// Fractional tile-space position of the viewport centre
    pub fn tile_center(&self) -> (f64, f64) {
        geo::tile_center_index(self.tile_offset_x, self.tile_offset_y, self.zoom)
    }

    /// Pixel the viewport centre maps to
    pub fn center_pixel(&self) -> (i64, i64) {
        (
            (self.pixel_width / 2) as i64,
            (self.pixel_height / 2) as i64,
        )
    }

    /// Screen position of the centre tile's top-left corner.
    ///
    /// At zoom 0 the centre lies in the middle of the only tile, so the tile is
    /// shifted back by half its size. Every other zoom puts a tile corner on
    /// the centre pixel.
    pub fn screen_anchor(&self) -> (i64, i64) {
        let (mut x, mut y) = self.center_pixel();
        if self.zoom == 0 {
            let half_tile = (self.device_tile_size() / 2) as i64;
            x -= half_tile;
            y -= half_tile;
        }
        (x, y)
    }

    /// Screen position of the top-left corner of `index`
    pub fn tile_screen_origin(&self, index: &TileIndex) -> (i64, i64) {
        let tile_size = self.device_tile_size() as i64;
        let (anchor_x, anchor_y) = self.screen_anchor();
        let (center_x, center_y) = self.center_tile();
        (
            anchor_x + (index.x as i64 - center_x) * tile_size,
            anchor_y + (index.y as i64 - center_y) * tile_size,
        )
    }

    /// Tiles needed to cover the viewport plus one tile of margin per side.
    ///
    /// Indices outside the tile grid are dropped. The result is ordered by
    /// distance from the centre tile so that central tiles are requested first.
    pub fn visible_tiles(&self) -> Vec<TileIndex> {
        if self.pixel_width == 0 || self.pixel_height == 0 || self.zoom > MAX_SUPPORTED_ZOOM {
            return Vec::new();
        }

        let tile_size = self.device_tile_size() as f64;
        let (center_x, center_y) = self.tile_center();
        let (anchor_x, anchor_y) = self.center_pixel();
        let last_in_grid = geo::tile_count(self.zoom) as i64 - 1;

        // Candidate range clamped to the grid; an empty range when the view is off it
        let span = |center: f64, anchor: i64, extent: u32| -> (i64, i64) {
            let before = anchor as f64 / tile_size;
            let after = (extent as i64 - anchor) as f64 / tile_size;
            let first = ((center - before).floor() as i64).saturating_sub(VISIBLE_TILE_MARGIN);
            let last = ((center + after).ceil() as i64)
                .saturating_sub(1)
                .saturating_add(VISIBLE_TILE_MARGIN);
            (first.max(0), last.min(last_in_grid))
        };

        let (first_x, last_x) = span(center_x, anchor_x, self.pixel_width);
        let (first_y, last_y) = span(center_y, anchor_y, self.pixel_height);
        if first_x > last_x || first_y > last_y {
            return Vec::new();
        }

        let width = (last_x - first_x + 1) as usize;
        let height = (last_y - first_y + 1) as usize;
        let mut tiles = Vec::with_capacity(width.saturating_mul(height));

        for x in first_x..=last_x {
            for y in first_y..=last_y {
                if let Some(index) = TileIndex::checked(x, y, self.zoom) {
                    tiles.push(index);
                }
            }
        }

        let (cx, cy) = (center_x.floor(), center_y.floor());
        tiles.sort_by(|a, b| {
            let da = (a.x as f64 - cx).powi(2) + (a.y as f64 - cy).powi(2);
            let db = (b.x as f64 - cx).powi(2) + (b.y as f64 - cy).powi(2);
            da.total_cmp(&db)
        });

        tiles
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600, 1.0, crate::core::constants::DEFAULT_INITIAL_ZOOM)
    }
}
