use crate::{
    core::{
        config::EngineConfig,
        controller::{MapCommand, PanDirection, PanZoomController},
        viewport::{ViewState, Viewport},
    },
    data::features::FeatureCollection,
    prelude::Arc,
    rendering::{BaseCompositor, FrameCompositor, OverlayRenderer},
    tiles::{HttpTileSource, TileFetchError, TileLoader, TileSource},
    Result,
};
use image::RgbaImage;

/// One composited frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub pixels: RgbaImage,
    /// View the frame was rendered for
    pub view: ViewState,
    /// Tiles that could not be drawn; their area shows the background colour
    pub failures: Vec<TileFetchError>,
}

/// One map instance: view state, tile loading and the buffers of the render pass
pub struct MapView {
    config: EngineConfig,
    controller: PanZoomController,
    loader: TileLoader,
    base: BaseCompositor,
    overlay: OverlayRenderer,
    frame: FrameCompositor,
    features: Arc<FeatureCollection>,
    base_buffer: RgbaImage,
    overlay_buffer: RgbaImage,
}

impl MapView {
    /// Map backed by the HTTP tile server of `config.tiles`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let source = HttpTileSource::new(&config.tiles)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Map backed by any tile source
    pub fn with_source(config: EngineConfig, source: Arc<dyn TileSource>) -> Result<Self> {
        config.validate()?;

        let view = &config.view;
        let viewport = Viewport::new(
            view.pixel_width,
            view.pixel_height,
            view.display_scale,
            view.initial_zoom,
        )
        .with_offset(view.initial_offset.0, view.initial_offset.1);
        let controller = PanZoomController::new(viewport, view.zoom_min, view.zoom_max)?;

        log::debug!(
            "map view {}x{} at {:?}",
            view.pixel_width,
            view.pixel_height,
            controller.view_state()
        );

        Ok(Self {
            loader: TileLoader::new(source, &config.tiles),
            base: BaseCompositor::new(config.overlay.background_color),
            overlay: OverlayRenderer::new(config.overlay.clone()),
            frame: FrameCompositor::new(config.overlay.alpha_factor),
            controller,
            config,
            features: Arc::new(FeatureCollection::default()),
            base_buffer: RgbaImage::new(0, 0),
            overlay_buffer: RgbaImage::new(0, 0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        self.controller.viewport()
    }

    pub fn view_state(&self) -> ViewState {
        self.controller.view_state()
    }

    pub fn position(&self) -> (i64, i64) {
        self.controller.position()
    }

    pub fn set_position(&mut self, x: i64, y: i64) {
        self.controller.set_position(x, y);
    }

    pub fn zoom(&self) -> u8 {
        self.controller.viewport().zoom
    }

    /// Handle to the tile loader; clones share cache and generations
    pub fn tile_loader(&self) -> TileLoader {
        self.loader.clone()
    }

    /// Resizes the view. A new display scale also changes the device tile
    /// size, so tiles are decoded again at the new density.
    pub fn set_viewport_size(&mut self, pixel_width: u32, pixel_height: u32, display_scale: f64) {
        self.controller
            .set_size(pixel_width, pixel_height, display_scale);
    }

    pub fn pan(&mut self, direction: PanDirection) {
        self.controller.pan(direction);
    }

    pub fn zoom_in(&mut self) -> bool {
        self.controller.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.controller.zoom_out()
    }

    pub fn zoom_to(&mut self, level: u8) {
        self.controller.zoom_to(level);
    }

    pub fn apply(&mut self, command: MapCommand) {
        self.controller.apply(command);
    }

    /// Replaces the overlay features. A render pass already running keeps the
    /// collection it started with.
    pub fn set_feature_collection(&mut self, features: Arc<FeatureCollection>) {
        log::debug!("overlay replaced with {} features", features.len());
        self.features = features;
    }

    pub fn feature_collection(&self) -> Arc<FeatureCollection> {
        Arc::clone(&self.features)
    }

    /// Renders the current view into a new frame
    pub async fn render(&mut self) -> Result<RenderedFrame> {
        let mut pixels = RgbaImage::new(0, 0);
        let (view, failures) = self.render_pass(&mut pixels).await?;
        Ok(RenderedFrame {
            pixels,
            view,
            failures,
        })
    }

    /// Renders the current view into `target`, resizing it when needed.
    /// Returns the tiles that could not be drawn.
    pub async fn render_into(&mut self, target: &mut RgbaImage) -> Result<Vec<TileFetchError>> {
        let (_, failures) = self.render_pass(target).await?;
        Ok(failures)
    }

    async fn render_pass(
        &mut self,
        target: &mut RgbaImage,
    ) -> Result<(ViewState, Vec<TileFetchError>)> {
        let viewport = self.controller.viewport().clone();
        let features = Arc::clone(&self.features);
        features.validate()?;

        let visible = viewport.visible_tiles();
        let tile_size = viewport.device_tile_size();
        let batch = self
            .loader
            .load_visible(&visible, tile_size, self.config.tiles.render_deadline())
            .await?;

        let drawn = self
            .base
            .compose(&viewport, &batch.tiles, &mut self.base_buffer);
        for failure in &batch.failures {
            log::warn!("{}", failure);
        }

        self.overlay
            .render_into(&viewport, &features, &mut self.overlay_buffer)?;

        if target.dimensions() != self.base_buffer.dimensions() {
            *target = self.base_buffer.clone();
        } else {
            target.copy_from_slice(&self.base_buffer);
        }
        self.frame.blend_into(target, &self.overlay_buffer)?;

        log::debug!(
            "rendered {:?}: {}/{} tiles, {} failures",
            viewport.view_state(),
            drawn,
            visible.len(),
            batch.failures.len()
        );
        Ok((viewport.view_state(), batch.failures))
    }
}

impl std::fmt::Debug for MapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("view", &self.view_state())
            .field("viewport", self.viewport())
            .field("features", &self.features.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileIndex;
    use crate::tiles::{TileImage, TileSource};
    use async_trait::async_trait;
    use image::Rgba;

    struct SolidSource;

    #[async_trait]
    impl TileSource for SolidSource {
        async fn fetch(
            &self,
            index: TileIndex,
            tile_size: u32,
        ) -> std::result::Result<TileImage, TileFetchError> {
            Ok(TileImage::new(
                index,
                RgbaImage::from_pixel(tile_size, tile_size, Rgba([0, 0, 255, 255])),
            ))
        }
    }

    fn view() -> MapView {
        let mut config = EngineConfig::default();
        config.tiles = crate::core::config::TileLoadingConfig::for_testing();
        MapView::with_source(config, Arc::new(SolidSource)).unwrap()
    }

    #[test]
    fn test_initial_view() {
        let map = view();
        assert_eq!(
            map.view_state(),
            ViewState {
                x: 38,
                y: -176,
                zoom: 10
            }
        );
        assert!(map.feature_collection().is_empty());
    }

    #[test]
    fn test_commands_go_through_controller() {
        let mut map = view();
        map.set_position(0, 0);
        map.apply(MapCommand::Pan(PanDirection::East));
        map.zoom_in();
        assert_eq!(map.position(), (2, 0));
        assert_eq!(map.zoom(), 11);
        map.zoom_to(30);
        assert_eq!(map.zoom(), 19);
    }

    #[tokio::test]
    async fn test_render_without_overlay() {
        let mut map = view();
        let frame = map.render().await.unwrap();
        assert_eq!(frame.pixels.dimensions(), (800, 600));
        assert!(frame.failures.is_empty());
        assert_eq!(frame.view, map.view_state());
        assert_eq!(frame.pixels.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(frame.pixels.get_pixel(799, 599), &Rgba([0, 0, 255, 255]));
    }

    #[tokio::test]
    async fn test_render_far_off_grid() {
        let mut map = view();
        map.set_position(i64::MIN, 0);
        map.pan(PanDirection::West);
        assert!(map.viewport().visible_tiles().is_empty());

        let frame = map.render().await.unwrap();
        assert!(frame.failures.is_empty());
        assert_eq!(frame.pixels.get_pixel(400, 300), &Rgba([0, 0, 0, 0]));
    }
}
