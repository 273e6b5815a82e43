pub mod cache;
pub mod loader;
pub mod source;

// Re-exports for convenience
pub use cache::{TileCache, TileKey};
pub use loader::{Generation, TileBatch, TileFuture, TileLoader};
pub use source::{
    decode_tile, FetchCause, HttpTileSource, TileFetchError, TileImage, TileSource, TileUrlTemplate,
};
