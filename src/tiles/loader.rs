use super::cache::{TileCache, TileKey};
use super::source::{FetchCause, TileFetchError, TileImage, TileSource};
use crate::core::config::TileLoadingConfig;
use crate::core::geo::TileIndex;
use crate::prelude::{Arc, Duration, HashMap, HashSet, Mutex};
use crate::{MapError, Result};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;

/// A fetch every interested render pass can await. Resolves once, to the same
/// value for every waiter.
pub type TileFuture = Shared<BoxFuture<'static, std::result::Result<Arc<TileImage>, TileFetchError>>>;

/// Identifies one render pass. Starting a new pass supersedes every older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Tiles gathered for one render pass
#[derive(Debug, Default)]
pub struct TileBatch {
    pub tiles: HashMap<TileIndex, Arc<TileImage>>,
    pub failures: Vec<TileFetchError>,
}

struct InFlight {
    id: u64,
    future: TileFuture,
    abort: AbortHandle,
}

/// Loads tiles with bounded concurrency.
///
/// Concurrent requests for the same tile share one fetch. Starting a new
/// generation aborts fetches for tiles that are no longer visible.
#[derive(Clone)]
pub struct TileLoader {
    source: Arc<dyn TileSource>,
    cache: TileCache,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<TileKey, InFlight>>>,
    generation: Arc<AtomicU64>,
    next_fetch_id: Arc<AtomicU64>,
}

impl TileLoader {
    pub fn new(source: Arc<dyn TileSource>, config: &TileLoadingConfig) -> Self {
        Self {
            source,
            cache: TileCache::new(config.cache_size),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::default())),
            generation: Arc::new(AtomicU64::new(0)),
            next_fetch_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn current_generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    /// Number of fetches currently running
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Starts a new render pass and cancels fetches for tiles outside `visible`
    pub fn begin_generation(&self, visible: &[TileIndex], tile_size: u32) -> Generation {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let keep: HashSet<TileKey> = visible
            .iter()
            .map(|index| TileKey::new(*index, tile_size))
            .collect();

        if let Ok(mut in_flight) = self.in_flight.lock() {
            let before = in_flight.len();
            in_flight.retain(|key, fetch| {
                let visible = keep.contains(key);
                if !visible {
                    fetch.abort.abort();
                }
                visible
            });
            let cancelled = before - in_flight.len();
            if cancelled > 0 {
                log::debug!(
                    "generation {}: cancelled {} stale tile fetches",
                    generation,
                    cancelled
                );
            }
        }

        Generation(generation)
    }

    /// Returns the cached tile or a shared fetch for it, starting one if needed
    pub fn fetch(&self, index: TileIndex, tile_size: u32) -> TileFuture {
        let key = TileKey::new(index, tile_size);
        if let Some(tile) = self.cache.get(&key) {
            return future::ready(Ok(tile)).boxed().shared();
        }

        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(_) => {
                return future::ready(Err(TileFetchError::new(index, FetchCause::Cancelled)))
                    .boxed()
                    .shared()
            }
        };

        if let Some(existing) = in_flight.get(&key) {
            return existing.future.clone();
        }

        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let source = Arc::clone(&self.source);
        let semaphore = Arc::clone(&self.semaphore);
        let cache = self.cache.clone();
        let registry = Arc::clone(&self.in_flight);

        let handle = tokio::spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => source.fetch(index, tile_size).await.map(Arc::new),
                Err(_) => Err(TileFetchError::new(index, FetchCause::Cancelled)),
            };

            if let Ok(tile) = &result {
                cache.put(key, Arc::clone(tile));
            }
            if let Ok(mut fetches) = registry.lock() {
                if fetches.get(&key).map(|f| f.id) == Some(id) {
                    fetches.remove(&key);
                }
            }
            result
        });

        let abort = handle.abort_handle();
        let registry = Arc::clone(&self.in_flight);
        let shared = handle
            .map(move |joined| match joined {
                Ok(result) => result,
                Err(e) => {
                    // the task never reached its own cleanup if it panicked
                    if e.is_panic() {
                        log::warn!("fetch of tile {} panicked", index);
                    }
                    if let Ok(mut fetches) = registry.lock() {
                        if fetches.get(&key).map(|f| f.id) == Some(id) {
                            fetches.remove(&key);
                        }
                    }
                    Err(TileFetchError::new(index, FetchCause::Cancelled))
                }
            })
            .boxed()
            .shared();

        in_flight.insert(
            key,
            InFlight {
                id,
                future: shared.clone(),
                abort,
            },
        );
        shared
    }

    /// Waits for `visible` until `budget` runs out. Tiles still missing by then
    /// are reported as timeouts; their fetches keep running and fill the cache.
    ///
    /// Fails with [`MapError::Superseded`] when another generation started
    /// while waiting.
    pub async fn load(
        &self,
        generation: Generation,
        visible: &[TileIndex],
        tile_size: u32,
        budget: Duration,
    ) -> Result<TileBatch> {
        let deadline = tokio::time::Instant::now() + budget;

        let pending = visible.iter().map(|&index| {
            let fetch = self.fetch(index, tile_size);
            async move {
                match tokio::time::timeout_at(deadline, fetch).await {
                    Ok(result) => (index, result),
                    Err(_) => (index, Err(TileFetchError::new(index, FetchCause::Timeout))),
                }
            }
        });
        let results = future::join_all(pending).await;

        let current = self.current_generation();
        if current != generation {
            return Err(MapError::Superseded {
                requested: generation.value(),
                current: current.value(),
            });
        }

        let mut batch = TileBatch::default();
        for (index, result) in results {
            match result {
                Ok(tile) => {
                    batch.tiles.insert(index, tile);
                }
                Err(e) => batch.failures.push(e),
            }
        }

        if !batch.failures.is_empty() {
            log::warn!(
                "generation {}: {} of {} tiles missing",
                generation.value(),
                batch.failures.len(),
                visible.len()
            );
        }
        Ok(batch)
    }

    /// Starts a generation for `visible` and loads it
    pub async fn load_visible(
        &self,
        visible: &[TileIndex],
        tile_size: u32,
        budget: Duration,
    ) -> Result<TileBatch> {
        let generation = self.begin_generation(visible, tile_size);
        self.load(generation, visible, tile_size, budget).await
    }
}
