use crate::core::constants::OVERLAY_ALPHA_FACTOR;
use crate::{MapError, Result};
use image::{Rgba, RgbaImage};

/// Blends the overlay over the base raster with a flat opacity factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCompositor {
    alpha_factor: f64,
}

impl FrameCompositor {
    /// `alpha_factor` is clamped into `0..=1`
    pub fn new(alpha_factor: f64) -> Self {
        let alpha_factor = if alpha_factor.is_nan() {
            OVERLAY_ALPHA_FACTOR
        } else {
            alpha_factor.clamp(0.0, 1.0)
        };
        Self { alpha_factor }
    }

    pub fn alpha_factor(&self) -> f64 {
        self.alpha_factor
    }

    pub fn blend(&self, base: &RgbaImage, overlay: &RgbaImage) -> Result<RgbaImage> {
        let mut out = base.clone();
        self.blend_into(&mut out, overlay)?;
        Ok(out)
    }

    /// Blends `overlay` onto `base` in place
    pub fn blend_into(&self, base: &mut RgbaImage, overlay: &RgbaImage) -> Result<()> {
        if base.dimensions() != overlay.dimensions() {
            return Err(MapError::Render(format!(
                "overlay is {:?} but base is {:?}",
                overlay.dimensions(),
                base.dimensions()
            )));
        }

        for (b, o) in base.pixels_mut().zip(overlay.pixels()) {
            *b = blend_pixel(*b, *o, self.alpha_factor);
        }
        Ok(())
    }
}

impl Default for FrameCompositor {
    fn default() -> Self {
        Self::new(OVERLAY_ALPHA_FACTOR)
    }
}

/// Non-premultiplied source-over of `overlay` (alpha scaled by `factor`) onto `base`
pub fn blend_pixel(base: Rgba<u8>, overlay: Rgba<u8>, factor: f64) -> Rgba<u8> {
    let a_o = overlay[3] as f64 / 255.0 * factor;
    if a_o <= 0.0 {
        return base;
    }

    let a_b = base[3] as f64 / 255.0;
    let a = a_o + a_b * (1.0 - a_o);

    let channel = |i: usize| -> u8 {
        let c = (overlay[i] as f64 * a_o + base[i] as f64 * a_b * (1.0 - a_o)) / a;
        c.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_red_over_blue() {
        let out = blend_pixel(Rgba([0, 0, 255, 255]), Rgba([255, 0, 0, 255]), 0.5);
        assert_eq!(out, Rgba([128, 0, 128, 255]));
    }

    #[test]
    fn test_transparent_overlay_passes_base_through() {
        let base = Rgba([12, 34, 56, 78]);
        assert_eq!(blend_pixel(base, Rgba([255, 255, 255, 0]), 0.5), base);
        assert_eq!(blend_pixel(base, Rgba([255, 255, 255, 255]), 0.0), base);
    }

    #[test]
    fn test_overlay_on_empty_base() {
        // nothing underneath: colour is the overlay's, alpha is scaled
        let out = blend_pixel(Rgba([0, 0, 0, 0]), Rgba([83, 118, 245, 255]), 0.5);
        assert_eq!(out, Rgba([83, 118, 245, 128]));
    }

    #[test]
    fn test_full_factor_is_plain_source_over() {
        let out = blend_pixel(Rgba([0, 0, 255, 255]), Rgba([255, 0, 0, 255]), 1.0);
        assert_eq!(out, Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_blend_buffers() {
        let base = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 255, 255]));
        let mut overlay = RgbaImage::new(3, 2);
        overlay.put_pixel(1, 1, Rgba([255, 0, 0, 255]));

        let out = FrameCompositor::default().blend(&base, &overlay).unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgba([128, 0, 128, 255]));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let mut base = RgbaImage::new(3, 2);
        let overlay = RgbaImage::new(2, 3);
        assert!(matches!(
            FrameCompositor::default().blend_into(&mut base, &overlay),
            Err(MapError::Render(_))
        ));
    }

    #[test]
    fn test_factor_is_clamped() {
        assert_eq!(FrameCompositor::new(3.0).alpha_factor(), 1.0);
        assert_eq!(FrameCompositor::new(-1.0).alpha_factor(), 0.0);
    }
}
