#[cfg(test)]
mod render_pipeline_tests {
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use mapraster::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    /// Serves solid blue tiles, except for one tile that answers 404
    struct SolidSource {
        missing: Option<TileIndex>,
        last_size: AtomicUsize,
    }

    #[async_trait]
    impl TileSource for SolidSource {
        async fn fetch(
            &self,
            index: TileIndex,
            tile_size: u32,
        ) -> std::result::Result<TileImage, TileFetchError> {
            self.last_size.store(tile_size as usize, Ordering::SeqCst);
            if self.missing == Some(index) {
                return Err(TileFetchError::new(index, FetchCause::Status(404)));
            }
            Ok(TileImage::new(
                index,
                RgbaImage::from_pixel(tile_size, tile_size, BLUE),
            ))
        }
    }

    fn source(missing: Option<TileIndex>) -> Arc<SolidSource> {
        Arc::new(SolidSource {
            missing,
            last_size: AtomicUsize::new(0),
        })
    }

    /// 800x600 view centred on null island at zoom 12
    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.tiles = TileLoadingConfig::for_testing();
        config.view.initial_zoom = 12;
        config.view.initial_offset = (0, 0);
        config
    }

    fn map_with(source: Arc<SolidSource>) -> MapView {
        MapView::with_source(config(), source).expect("valid test config")
    }

    #[tokio::test]
    async fn test_line_is_blended_over_tiles() {
        let mut map = map_with(source(None));
        map.set_feature_collection(Arc::new(FeatureCollection::new(vec![Feature::new(
            Geometry::LineString(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.05, 0.0)]),
        )])));

        let frame = map.render().await.unwrap();
        assert!(frame.failures.is_empty());
        assert_eq!(frame.pixels.dimensions(), (800, 600));

        // red stroke at half opacity over blue
        assert_eq!(frame.pixels.get_pixel(400, 300), &Rgba([128, 0, 128, 255]));
        assert_eq!(frame.pixels.get_pixel(450, 300), &Rgba([128, 0, 128, 255]));
        assert_eq!(frame.pixels.get_pixel(450, 310), &BLUE);
        assert_eq!(frame.pixels.get_pixel(390, 300), &BLUE);
    }

    #[tokio::test]
    async fn test_polygon_fill_is_blended_over_tiles() {
        let mut map = map_with(source(None));
        let ring = Ring::new(vec![
            GeoPoint::new(-0.02, -0.02),
            GeoPoint::new(0.02, -0.02),
            GeoPoint::new(0.02, 0.02),
            GeoPoint::new(-0.02, 0.02),
            GeoPoint::new(-0.02, -0.02),
        ]);
        map.set_feature_collection(Arc::new(FeatureCollection::new(vec![Feature::new(
            Geometry::Polygon(Polygon::new(vec![ring])),
        )])));

        let frame = map.render().await.unwrap();
        // (83, 118, 245) at half opacity over (0, 0, 255)
        assert_eq!(frame.pixels.get_pixel(420, 320), &Rgba([42, 59, 250, 255]));
        assert_eq!(frame.pixels.get_pixel(380, 280), &Rgba([42, 59, 250, 255]));
        assert_eq!(frame.pixels.get_pixel(100, 100), &BLUE);
    }

    #[tokio::test]
    async fn test_missing_tile_leaves_background() {
        let center = TileIndex::new(2048, 2048, 12);
        let mut map = map_with(source(Some(center)));

        let frame = map.render().await.unwrap();
        assert_eq!(frame.failures.len(), 1);
        assert_eq!(frame.failures[0].index, center);
        assert_eq!(frame.pixels.get_pixel(400, 300), &Rgba([0, 0, 0, 0]));
        assert_eq!(frame.pixels.get_pixel(399, 299), &BLUE);
    }

    #[tokio::test]
    async fn test_malformed_overlay_fails_render() {
        let mut map = map_with(source(None));
        map.set_feature_collection(Arc::new(FeatureCollection::new(vec![Feature::new(
            Geometry::LineString(vec![GeoPoint::new(0.0, 0.0)]),
        )])));

        match map.render().await {
            Err(MapError::MalformedFeature { index, .. }) => assert_eq!(index, 0),
            other => panic!("expected malformed feature error, got {:?}", other.map(|f| f.view)),
        }
    }

    #[tokio::test]
    async fn test_geojson_overlay_renders() {
        let mut map = map_with(source(None));
        let features = FeatureCollection::from_geojson_str(
            r#"{ "type": "FeatureCollection", "features": [
                { "type": "Feature", "properties": { "kind": "route" },
                  "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.05, 0.0]] } }
            ] }"#,
        )
        .unwrap();
        map.set_feature_collection(Arc::new(features));

        let frame = map.render().await.unwrap();
        assert_eq!(frame.pixels.get_pixel(450, 300), &Rgba([128, 0, 128, 255]));
    }

    #[tokio::test]
    async fn test_view_changes_are_reported() {
        let mut map = map_with(source(None));
        map.apply(MapCommand::Pan(PanDirection::South));
        map.apply(MapCommand::ZoomIn);

        let frame = map.render().await.unwrap();
        assert_eq!(
            frame.view,
            ViewState {
                x: 0,
                y: 2,
                zoom: 13
            }
        );
        assert_eq!(frame.view, map.view_state());
    }

    #[tokio::test]
    async fn test_display_scale_changes_tile_size() {
        let tiles = source(None);
        let mut map = map_with(tiles.clone());
        map.render().await.unwrap();
        assert_eq!(tiles.last_size.load(Ordering::SeqCst), 256);

        map.set_viewport_size(400, 300, 2.0);
        let frame = map.render().await.unwrap();
        assert_eq!(frame.pixels.dimensions(), (400, 300));
        assert_eq!(tiles.last_size.load(Ordering::SeqCst), 512);
        assert_eq!(map.viewport().device_tile_size(), 512);
    }

    #[tokio::test]
    async fn test_render_into_reuses_buffer() {
        let mut map = map_with(source(None));
        let mut target = RgbaImage::from_pixel(800, 600, Rgba([1, 1, 1, 1]));

        let failures = map.render_into(&mut target).await.unwrap();
        assert!(failures.is_empty());
        assert_eq!(target.get_pixel(0, 0), &BLUE);

        map.set_viewport_size(640, 480, 1.0);
        map.render_into(&mut target).await.unwrap();
        assert_eq!(target.dimensions(), (640, 480));
    }

    #[tokio::test]
    async fn test_replacing_features_keeps_old_snapshot_intact() {
        let mut map = map_with(source(None));
        let first = Arc::new(FeatureCollection::new(vec![Feature::new(Geometry::LineString(
            vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.05, 0.0)],
        ))]));
        map.set_feature_collection(first.clone());
        map.set_feature_collection(Arc::new(FeatureCollection::default()));

        assert_eq!(first.len(), 1);
        let frame = map.render().await.unwrap();
        assert_eq!(frame.pixels.get_pixel(450, 300), &BLUE);
    }
}
