//! Pan and zoom commands applied to a [`Viewport`].
//!
//! Pans move exactly one tile. Zoom changes are applied one level at a time:
//! zooming in doubles the tile offset, zooming out halves it with truncating
//! integer division. Odd offsets therefore lose their low bit when zoomed out
//! and back in again.

use crate::core::constants::MAX_SUPPORTED_ZOOM;
use crate::core::viewport::{ViewState, Viewport};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanDirection {
    North,
    South,
    East,
    West,
}

/// A discrete command coming from the host (buttons, keys, gestures)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapCommand {
    Pan(PanDirection),
    ZoomIn,
    ZoomOut,
    ZoomTo(u8),
}

impl std::str::FromStr for MapCommand {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" | "up" => Ok(Self::Pan(PanDirection::North)),
            "south" | "s" | "down" => Ok(Self::Pan(PanDirection::South)),
            "east" | "e" | "right" => Ok(Self::Pan(PanDirection::East)),
            "west" | "w" | "left" => Ok(Self::Pan(PanDirection::West)),
            "in" | "+" => Ok(Self::ZoomIn),
            "out" | "-" => Ok(Self::ZoomOut),
            other => other
                .strip_prefix("zoom=")
                .and_then(|level| level.parse().ok())
                .map(Self::ZoomTo)
                .ok_or_else(|| MapError::ParseError(format!("unknown map command '{}'", s))),
        }
    }
}

/// Owns the viewport of one map instance and is the only thing that mutates it
#[derive(Debug, Clone, PartialEq)]
pub struct PanZoomController {
    viewport: Viewport,
    zoom_min: u8,
    zoom_max: u8,
}

impl PanZoomController {
    /// Creates a controller; the viewport zoom is clamped into `[zoom_min, zoom_max]`
    pub fn new(mut viewport: Viewport, zoom_min: u8, zoom_max: u8) -> Result<Self> {
        if zoom_min > zoom_max || zoom_max > MAX_SUPPORTED_ZOOM {
            return Err(MapError::Config(format!(
                "invalid zoom range {}..={} (supported 0..={})",
                zoom_min, zoom_max, MAX_SUPPORTED_ZOOM
            )));
        }
        viewport.zoom = viewport.zoom.clamp(zoom_min, zoom_max);
        Ok(Self {
            viewport,
            zoom_min,
            zoom_max,
        })
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn view_state(&self) -> ViewState {
        self.viewport.view_state()
    }

    pub fn position(&self) -> (i64, i64) {
        (self.viewport.tile_offset_x, self.viewport.tile_offset_y)
    }

    pub fn set_position(&mut self, x: i64, y: i64) {
        self.viewport.tile_offset_x = x;
        self.viewport.tile_offset_y = y;
    }

    pub fn set_size(&mut self, pixel_width: u32, pixel_height: u32, display_scale: f64) {
        self.viewport.set_size(pixel_width, pixel_height, display_scale);
    }

    /// Moves the view by one tile. There is no bounds check: the centre may
    /// leave the tile grid, in which case fewer (or no) tiles are visible.
    pub fn pan(&mut self, direction: PanDirection) {
        let viewport = &mut self.viewport;
        match direction {
            PanDirection::North => viewport.tile_offset_y = viewport.tile_offset_y.saturating_sub(1),
            PanDirection::South => viewport.tile_offset_y = viewport.tile_offset_y.saturating_add(1),
            PanDirection::East => viewport.tile_offset_x = viewport.tile_offset_x.saturating_add(1),
            PanDirection::West => viewport.tile_offset_x = viewport.tile_offset_x.saturating_sub(1),
        }
        log::debug!(
            "pan {:?} -> offset ({}, {})",
            direction,
            viewport.tile_offset_x,
            viewport.tile_offset_y
        );
    }

    /// One zoom level in; ignored at the upper limit. Returns whether the zoom changed.
    pub fn zoom_in(&mut self) -> bool {
        if self.viewport.zoom >= self.zoom_max {
            return false;
        }
        self.zoom_in_step();
        true
    }

    /// One zoom level out; ignored at the lower limit. Returns whether the zoom changed.
    pub fn zoom_out(&mut self) -> bool {
        if self.viewport.zoom <= self.zoom_min {
            return false;
        }
        self.zoom_out_step();
        true
    }

    /// Walks to `level` one step at a time, after clamping it into the zoom range
    pub fn zoom_to(&mut self, level: u8) {
        let target = level.clamp(self.zoom_min, self.zoom_max);
        if target != level {
            log::debug!("zoom level {} clamped to {}", level, target);
        }
        while self.viewport.zoom < target {
            self.zoom_in_step();
        }
        while self.viewport.zoom > target {
            self.zoom_out_step();
        }
    }

    pub fn apply(&mut self, command: MapCommand) {
        match command {
            MapCommand::Pan(direction) => self.pan(direction),
            MapCommand::ZoomIn => {
                self.zoom_in();
            }
            MapCommand::ZoomOut => {
                self.zoom_out();
            }
            MapCommand::ZoomTo(level) => self.zoom_to(level),
        }
    }

    fn zoom_in_step(&mut self) {
        let viewport = &mut self.viewport;
        viewport.zoom += 1;
        viewport.tile_offset_x = viewport.tile_offset_x.saturating_mul(2);
        viewport.tile_offset_y = viewport.tile_offset_y.saturating_mul(2);
    }

    fn zoom_out_step(&mut self) {
        let viewport = &mut self.viewport;
        viewport.zoom -= 1;
        viewport.tile_offset_x /= 2;
        viewport.tile_offset_y /= 2;
    }
}
