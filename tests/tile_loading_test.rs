#[cfg(test)]
mod tile_loading_tests {
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use mapraster::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tile source that counts requests, sleeps before answering and can be
    /// told to fail one tile
    struct MockSource {
        calls: AtomicUsize,
        delay: Duration,
        missing: Option<TileIndex>,
    }

    impl MockSource {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                missing: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TileSource for MockSource {
        async fn fetch(
            &self,
            index: TileIndex,
            tile_size: u32,
        ) -> std::result::Result<TileImage, TileFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.missing == Some(index) {
                return Err(TileFetchError::new(index, FetchCause::Status(404)));
            }
            Ok(TileImage::new(
                index,
                RgbaImage::from_pixel(tile_size, tile_size, Rgba([10, 20, 30, 255])),
            ))
        }
    }

    fn loader_for(source: Arc<MockSource>) -> TileLoader {
        TileLoader::new(source, &TileLoadingConfig::for_testing())
    }

    fn row(count: u32) -> Vec<TileIndex> {
        (0..count).map(|x| TileIndex::new(x, 3, 4)).collect()
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let source = MockSource::new(Duration::from_millis(50));
        let loader = loader_for(source.clone());
        let index = TileIndex::new(5, 5, 4);

        let first = loader.fetch(index, 256);
        let second = loader.fetch(index, 256);
        assert_eq!(loader.in_flight_count(), 1);

        let (a, b) = futures::join!(first, second);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b), "both waiters should get the same tile");
        assert_eq!(source.calls(), 1, "duplicate request should not reach the source");
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_fetches_are_cancelled() {
        let source = MockSource::new(Duration::from_secs(10));
        let loader = loader_for(source);
        let stale = TileIndex::new(0, 0, 4);
        let kept = TileIndex::new(1, 0, 4);

        loader.begin_generation(&[stale, kept], 256);
        let stale_fetch = loader.fetch(stale, 256);
        let _kept_fetch = loader.fetch(kept, 256);
        assert_eq!(loader.in_flight_count(), 2);

        loader.begin_generation(&[kept], 256);
        assert_eq!(loader.in_flight_count(), 1);

        let err = stale_fetch.await.unwrap_err();
        assert_eq!(err.index, stale);
        assert_eq!(err.cause, FetchCause::Cancelled);
    }

    #[tokio::test]
    async fn test_superseded_generation_is_discarded() {
        let source = MockSource::new(Duration::from_millis(200));
        let loader = loader_for(source);
        let visible = row(4);

        let generation = loader.begin_generation(&visible, 256);
        let pending = {
            let loader = loader.clone();
            let visible = visible.clone();
            tokio::spawn(async move {
                loader
                    .load(generation, &visible, 256, Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let newer = loader.begin_generation(&[], 256);

        match pending.await.unwrap() {
            Err(MapError::Superseded { requested, current }) => {
                assert_eq!(requested, generation.value());
                assert_eq!(current, newer.value());
            }
            other => panic!("expected superseded render pass, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_late_tiles_time_out_but_fill_the_cache() {
        let source = MockSource::new(Duration::from_millis(150));
        let loader = loader_for(source.clone());
        let visible = row(3);

        let batch = loader
            .load_visible(&visible, 256, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(batch.tiles.is_empty());
        assert_eq!(batch.failures.len(), 3);
        assert!(batch
            .failures
            .iter()
            .all(|failure| failure.cause == FetchCause::Timeout));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(loader.cache().len(), 3, "late fetches should still land in the cache");

        let batch = loader
            .load_visible(&visible, 256, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(batch.tiles.len(), 3);
        assert!(batch.failures.is_empty());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_tile_does_not_fail_the_batch() {
        let missing = TileIndex::new(1, 3, 4);
        let source = Arc::new(MockSource {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(1),
            missing: Some(missing),
        });
        let loader = loader_for(source);

        let batch = loader
            .load_visible(&row(3), 256, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(batch.tiles.len(), 2);
        assert_eq!(
            batch.failures,
            vec![TileFetchError::new(missing, FetchCause::Status(404))]
        );
        assert!(!batch.tiles.contains_key(&missing));
        // failures are not cached
        assert!(!loader.cache().contains(&TileKey::new(missing, 256)));
    }

    #[tokio::test]
    async fn test_device_size_is_part_of_the_cache_key() {
        let source = MockSource::new(Duration::from_millis(1));
        let loader = loader_for(source.clone());
        let index = TileIndex::new(2, 2, 4);

        let small = loader.fetch(index, 256).await.unwrap();
        let large = loader.fetch(index, 512).await.unwrap();
        assert_eq!(small.size(), 256);
        assert_eq!(large.size(), 512);
        assert_eq!(source.calls(), 2);

        loader.fetch(index, 512).await.unwrap();
        assert_eq!(source.calls(), 2);
    }
}
