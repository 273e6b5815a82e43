use crate::core::geo::TileIndex;
use crate::core::viewport::Viewport;
use crate::prelude::{Arc, HashMap};
use crate::tiles::source::TileImage;
use image::{Rgba, RgbaImage};

/// Places decoded tiles into the base raster of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseCompositor {
    background: Rgba<u8>,
}

impl BaseCompositor {
    pub fn new(background: [u8; 4]) -> Self {
        Self {
            background: Rgba(background),
        }
    }

    /// Reallocates `target` when the viewport size changed, otherwise clears it in place
    pub fn prepare(&self, viewport: &Viewport, target: &mut RgbaImage) {
        let size = (viewport.pixel_width, viewport.pixel_height);
        if target.dimensions() != size {
            log::debug!(
                "base buffer resized {:?} -> {:?}",
                target.dimensions(),
                size
            );
            *target = RgbaImage::from_pixel(size.0, size.1, self.background);
        } else {
            for pixel in target.pixels_mut() {
                *pixel = self.background;
            }
        }
    }

    /// Draws every tile of the current zoom at its screen origin, clipped to
    /// the buffer. Returns how many tiles were drawn; missing tiles leave the
    /// background colour.
    pub fn compose(
        &self,
        viewport: &Viewport,
        tiles: &HashMap<TileIndex, Arc<TileImage>>,
        target: &mut RgbaImage,
    ) -> usize {
        self.prepare(viewport, target);

        let tile_size = viewport.device_tile_size();
        let mut drawn = 0;
        for (index, tile) in tiles {
            if index.zoom != viewport.zoom {
                continue;
            }
            if tile.pixels.dimensions() != (tile_size, tile_size) {
                log::warn!(
                    "tile {} is {:?}, expected {}px; skipped",
                    index,
                    tile.pixels.dimensions(),
                    tile_size
                );
                continue;
            }

            let (x, y) = viewport.tile_screen_origin(index);
            image::imageops::replace(target, &tile.pixels, x, y);
            drawn += 1;
        }
        drawn
    }
}

impl Default for BaseCompositor {
    fn default() -> Self {
        Self::new(crate::core::constants::DEFAULT_BACKGROUND_COLOR)
    }
}
