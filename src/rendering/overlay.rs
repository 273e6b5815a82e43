//! Vector overlay rasterization.
//!
//! Features are projected with the same anchor the base compositor uses, so a
//! tile corner projects exactly onto the pixel where that tile starts. Lines
//! are drawn as 1 px strokes; polygons get an even-odd fill of all their rings
//! followed by a stroke of every ring.

use crate::core::config::{OverlayStyle, RingWinding};
use crate::core::constants::{MAX_SUPPORTED_ZOOM, TILE_SIZE};
use crate::core::geo::{self, GeoPoint, ProjectedPoint};
use crate::core::viewport::Viewport;
use crate::data::features::{FeatureCollection, Geometry, Polygon};
use crate::Result;
use ::geo::algorithm::winding_order::{Winding, WindingOrder};
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;

/// A vertex in screen space, y pointing down
pub type ScreenPoint = (f64, f64);

/// Maps projected coordinates onto the pixels of one viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenProjection {
    center: ProjectedPoint,
    /// Projected units per device pixel along x and y
    units_per_pixel: (f64, f64),
    anchor: ScreenPoint,
}

impl ScreenProjection {
    pub fn for_viewport(viewport: &Viewport) -> Self {
        let (tile_x, tile_y) = viewport.tile_center();
        let center = geo::geo_to_mercator(geo::tile_to_geo(tile_x, tile_y, viewport.zoom));
        let (upp_x, upp_y) = geo::mercator_tile_size(tile_x, tile_y, viewport.zoom);
        let density = viewport.device_tile_size() as f64 / TILE_SIZE as f64;
        let (anchor_x, anchor_y) = viewport.center_pixel();

        Self {
            center,
            units_per_pixel: (upp_x / density, upp_y / density),
            anchor: (anchor_x as f64, anchor_y as f64),
        }
    }

    /// Projection with `point` on the centre pixel of a `pixel_width` x `pixel_height` buffer
    pub fn centered_on(
        point: GeoPoint,
        zoom: u8,
        pixel_width: u32,
        pixel_height: u32,
        display_scale: f64,
    ) -> Self {
        let viewport = Viewport::new(pixel_width, pixel_height, display_scale, zoom);
        let (tile_x, tile_y) = geo::geo_to_tile(point, zoom);
        let (upp_x, upp_y) = geo::mercator_tile_size(tile_x, tile_y, zoom);
        let density = viewport.device_tile_size() as f64 / TILE_SIZE as f64;
        let (anchor_x, anchor_y) = viewport.center_pixel();

        Self {
            center: geo::geo_to_mercator(point),
            units_per_pixel: (upp_x / density, upp_y / density),
            anchor: (anchor_x as f64, anchor_y as f64),
        }
    }

    pub fn project(&self, point: &GeoPoint) -> ScreenPoint {
        let p = geo::geo_to_mercator(*point);
        (
            (p.x - self.center.x) / self.units_per_pixel.0 + self.anchor.0,
            (self.center.y - p.y) / self.units_per_pixel.1 + self.anchor.1,
        )
    }

    /// False when the view centre sits so far outside the tile grid that the
    /// projection degenerates
    pub fn is_finite(&self) -> bool {
        self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.units_per_pixel.0.is_finite()
            && self.units_per_pixel.1.is_finite()
            && self.units_per_pixel.0 > 0.0
            && self.units_per_pixel.1 > 0.0
    }
}

/// Brings adjacent rings into opposite orientation by comparing endpoints.
///
/// For each pair `a = rings[i]`, `b = rings[i + 1]`, first match wins: equal
/// last points reverse `b`, equal first points reverse `a`, and `a`'s first
/// point equal to `b`'s last reverses both.
pub fn normalize_ring_endpoints<T: PartialEq>(rings: &mut [Vec<T>]) {
    for i in 1..rings.len() {
        let (head, tail) = rings.split_at_mut(i);
        let a = &mut head[i - 1];
        let b = &mut tail[0];

        if a.last() == b.last() {
            b.reverse();
        } else if a.first() == b.first() {
            a.reverse();
        } else if a.first() == b.last() {
            a.reverse();
            b.reverse();
        }
    }
}

/// Makes every ring the opposite orientation of its predecessor using the signed area
pub fn normalize_ring_areas(rings: &mut [Vec<ScreenPoint>]) {
    let mut previous = None;
    for ring in rings.iter_mut() {
        let order = winding_order(ring);
        match (previous, order) {
            (Some(before), Some(current)) if before == current => {
                ring.reverse();
                previous = Some(opposite(current));
            }
            (_, Some(current)) => previous = Some(current),
            (_, None) => previous = None,
        }
    }
}

fn winding_order(ring: &[ScreenPoint]) -> Option<WindingOrder> {
    let mut line: geo_types::LineString<f64> = ring.iter().copied().collect();
    line.close();
    line.winding_order()
}

fn opposite(order: WindingOrder) -> WindingOrder {
    match order {
        WindingOrder::Clockwise => WindingOrder::CounterClockwise,
        WindingOrder::CounterClockwise => WindingOrder::Clockwise,
    }
}

/// Fills the area enclosed by an odd number of ring boundaries, sampling at pixel centres
pub fn fill_even_odd(target: &mut RgbaImage, rings: &[Vec<ScreenPoint>], color: Rgba<u8>) {
    let (width, height) = target.dimensions();
    let points = rings.iter().flatten();
    let (min_y, max_y) = points.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.1), hi.max(p.1))
    });
    if !(min_y.is_finite() && max_y.is_finite()) {
        return;
    }

    let first_row = (min_y.floor().max(0.0)) as u32;
    let last_row = (max_y.ceil().min(height as f64)) as u32;
    let mut crossings = Vec::new();

    for row in first_row..last_row {
        let sy = row as f64 + 0.5;
        crossings.clear();

        for ring in rings.iter().filter(|ring| ring.len() >= 2) {
            for (i, &(x0, y0)) in ring.iter().enumerate() {
                let (x1, y1) = ring[(i + 1) % ring.len()];
                if (y0 <= sy && sy < y1) || (y1 <= sy && sy < y0) {
                    crossings.push(x0 + (sy - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }

        crossings.sort_by(|a, b| a.total_cmp(b));
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(width as f64);
            if start >= end {
                continue;
            }
            for x in start as u32..end as u32 {
                paint(target.get_pixel_mut(x, row), color);
            }
        }
    }
}

fn paint(pixel: &mut Rgba<u8>, color: Rgba<u8>) {
    if color[3] == u8::MAX {
        *pixel = color;
    } else {
        pixel.blend(&color);
    }
}

/// Draws a 1 px segment, clipped to the buffer first
pub fn stroke_segment(target: &mut RgbaImage, a: ScreenPoint, b: ScreenPoint, color: Rgba<u8>) {
    let (width, height) = target.dimensions();
    if let Some((a, b)) = clip_segment(a, b, width as f64, height as f64) {
        draw_line_segment_mut(
            target,
            (a.0 as f32, a.1 as f32),
            (b.0 as f32, b.1 as f32),
            color,
        );
    }
}

/// Liang-Barsky clip against `[-1, width] x [-1, height]`
fn clip_segment(
    a: ScreenPoint,
    b: ScreenPoint,
    width: f64,
    height: f64,
) -> Option<(ScreenPoint, ScreenPoint)> {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return None;
    }

    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let edges = [
        (-dx, a.0 + 1.0),
        (dx, width - a.0),
        (-dy, a.1 + 1.0),
        (dy, height - a.1),
    ];

    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
            if t0 > t1 {
                return None;
            }
        }
    }

    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

fn stroke_path(target: &mut RgbaImage, points: &[ScreenPoint], closed: bool, color: Rgba<u8>) {
    for pair in points.windows(2) {
        stroke_segment(target, pair[0], pair[1], color);
    }
    if closed {
        if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
            if first != last {
                stroke_segment(target, last, first, color);
            }
        }
    }
}

/// Rasterizes a feature collection into a transparent overlay buffer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn render(&self, viewport: &Viewport, features: &FeatureCollection) -> Result<RgbaImage> {
        let mut target = RgbaImage::new(viewport.pixel_width, viewport.pixel_height);
        self.render_into(viewport, features, &mut target)?;
        Ok(target)
    }

    /// Renders into `target`, resizing it to the viewport when needed. Fails
    /// before drawing anything if a feature is malformed.
    pub fn render_into(
        &self,
        viewport: &Viewport,
        features: &FeatureCollection,
        target: &mut RgbaImage,
    ) -> Result<()> {
        features.validate()?;

        let size = (viewport.pixel_width, viewport.pixel_height);
        if target.dimensions() != size {
            *target = RgbaImage::new(size.0, size.1);
        } else {
            for pixel in target.pixels_mut() {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }

        if viewport.zoom > MAX_SUPPORTED_ZOOM {
            log::debug!("zoom {} is past the tile grid; overlay left empty", viewport.zoom);
            return Ok(());
        }

        let projection = ScreenProjection::for_viewport(viewport);
        if !projection.is_finite() {
            log::debug!(
                "view centre {:?} is off the grid; overlay left empty",
                viewport.tile_center()
            );
            return Ok(());
        }

        self.draw(&projection, features, target);
        Ok(())
    }

    /// Draws already validated features with an explicit projection
    pub fn draw(
        &self,
        projection: &ScreenProjection,
        features: &FeatureCollection,
        target: &mut RgbaImage,
    ) {
        let stroke = Rgba(self.style.stroke_color);
        for feature in features.iter() {
            match &feature.geometry {
                Geometry::LineString(points) => {
                    let screen: Vec<ScreenPoint> =
                        points.iter().map(|p| projection.project(p)).collect();
                    stroke_path(target, &screen, false, stroke);
                }
                Geometry::Polygon(polygon) => self.draw_polygon(projection, polygon, target),
                Geometry::MultiPolygon(polygons) => {
                    for polygon in polygons {
                        self.draw_polygon(projection, polygon, target);
                    }
                }
            }
        }
    }

    fn draw_polygon(&self, projection: &ScreenProjection, polygon: &Polygon, target: &mut RgbaImage) {
        let mut rings: Vec<Vec<ScreenPoint>> = polygon
            .rings()
            .iter()
            .map(|ring| ring.points().iter().map(|p| projection.project(p)).collect())
            .collect();

        match self.style.winding {
            RingWinding::Endpoints => normalize_ring_endpoints(&mut rings),
            RingWinding::SignedArea => normalize_ring_areas(&mut rings),
        }

        fill_even_odd(target, &rings, Rgba(self.style.fill_color));
        let stroke = Rgba(self.style.stroke_color);
        for ring in &rings {
            stroke_path(target, ring, true, stroke);
        }
    }
}
