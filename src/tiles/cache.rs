use crate::core::geo::TileIndex;
use crate::tiles::source::TileImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Tiles are decoded at a specific device size, so the size is part of the key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub index: TileIndex,
    pub tile_size: u32,
}

impl TileKey {
    pub fn new(index: TileIndex, tile_size: u32) -> Self {
        Self { index, tile_size }
    }
}

/// In-memory cache of decoded tiles using LRU eviction
#[derive(Debug)]
pub struct TileCache {
    cache: Arc<Mutex<LruCache<TileKey, Arc<TileImage>>>>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Get a tile from the cache, marking it as recently used
    pub fn get(&self, key: &TileKey) -> Option<Arc<TileImage>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    pub fn put(&self, key: TileKey, tile: Arc<TileImage>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, tile);
        }
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.contains(key))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().ok().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.cap().get())
            .unwrap_or(0)
    }
}

impl Clone for TileCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn tile(x: u32) -> Arc<TileImage> {
        let index = TileIndex::new(x, 0, 4);
        Arc::new(TileImage::new(index, RgbaImage::new(1, 1)))
    }

    #[test]
    fn test_tile_cache_basic_operations() {
        let cache = TileCache::new(2);
        let key = TileKey::new(TileIndex::new(1, 0, 4), 256);

        assert!(cache.is_empty());
        cache.put(key, tile(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().index, key.index);

        // same tile at another device size is a different entry
        assert!(!cache.contains(&TileKey::new(key.index, 512)));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tile_cache_lru_eviction() {
        let cache = TileCache::new(2);
        let keys: Vec<_> = (0..3).map(|x| TileKey::new(TileIndex::new(x, 0, 4), 256)).collect();

        cache.put(keys[0], tile(0));
        cache.put(keys[1], tile(1));
        // touch the first so the second becomes least recently used
        assert!(cache.get(&keys[0]).is_some());
        cache.put(keys[2], tile(2));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&keys[0]));
        assert!(!cache.contains(&keys[1]));
        assert!(cache.contains(&keys[2]));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        assert_eq!(TileCache::new(0).capacity(), 1);
    }
}
