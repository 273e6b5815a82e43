use crate::core::config::TileLoadingConfig;
use crate::core::geo::TileIndex;
use crate::{MapError, Result};
use async_trait::async_trait;
use image::{imageops::FilterType, RgbaImage};
use once_cell::sync::Lazy;

/// Shared async HTTP client for the default configuration. Building the client
/// once avoids TLS and connection pool setup for every tile.
static HTTP_CLIENT: Lazy<std::result::Result<reqwest::Client, String>> = Lazy::new(|| {
    let defaults = TileLoadingConfig::default();
    build_client(&defaults).map_err(|e| e.to_string())
});

fn build_client(config: &TileLoadingConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .pool_max_idle_per_host(config.max_concurrent)
        .build()
}

/// A decoded tile, always `tile_size` x `tile_size` RGBA pixels
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    pub index: TileIndex,
    pub pixels: RgbaImage,
}

impl TileImage {
    pub fn new(index: TileIndex, pixels: RgbaImage) -> Self {
        Self { index, pixels }
    }

    pub fn size(&self) -> u32 {
        self.pixels.width()
    }
}

/// Why a single tile is missing from a render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    Network(String),
    Status(u16),
    Decode(String),
    Timeout,
    Cancelled,
}

impl std::fmt::Display for FetchCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchCause::Network(e) => write!(f, "network error: {}", e),
            FetchCause::Status(code) => write!(f, "HTTP {}", code),
            FetchCause::Decode(e) => write!(f, "decode error: {}", e),
            FetchCause::Timeout => write!(f, "deadline exceeded"),
            FetchCause::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure to produce one tile. Cloneable so a shared in-flight fetch can
/// hand the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tile {index}: {cause}")]
pub struct TileFetchError {
    pub index: TileIndex,
    pub cause: FetchCause,
}

impl TileFetchError {
    pub fn new(index: TileIndex, cause: FetchCause) -> Self {
        Self { index, cause }
    }
}

/// Anything that can produce decoded tile images
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Fetches and decodes `index`, scaled to `tile_size` pixels per side
    async fn fetch(
        &self,
        index: TileIndex,
        tile_size: u32,
    ) -> std::result::Result<TileImage, TileFetchError>;
}

/// Tile server URL pattern.
///
/// Supports `{z}`, `{x}`, `{y}` and `{s}` placeholders, and the positional
/// `%d/%d/%d` form which takes zoom, x and y in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>, subdomains: Vec<String>) -> Result<Self> {
        let template = template.into();
        let named = template.contains("{z}") && template.contains("{x}") && template.contains("{y}");
        let positional = template.matches("%d").count() == 3;
        if !named && !positional {
            return Err(MapError::Config(format!(
                "tile url template '{}' needs {{z}}, {{x}} and {{y}} or three %d",
                template
            )));
        }
        if template.contains("{s}") && subdomains.is_empty() {
            return Err(MapError::Config(format!(
                "tile url template '{}' uses {{s}} without subdomains",
                template
            )));
        }
        Ok(Self {
            template,
            subdomains,
        })
    }

    pub fn url(&self, index: TileIndex) -> String {
        let mut url = self.template.clone();

        if url.contains("%d") {
            for value in [index.zoom as u32, index.x, index.y] {
                url = url.replacen("%d", &value.to_string(), 1);
            }
        }

        if !self.subdomains.is_empty() {
            let i = ((index.x as u64 + index.y as u64) % self.subdomains.len() as u64) as usize;
            url = url.replace("{s}", &self.subdomains[i]);
        }

        url.replace("{z}", &index.zoom.to_string())
            .replace("{x}", &index.x.to_string())
            .replace("{y}", &index.y.to_string())
    }
}

/// Decodes PNG/JPEG bytes and resamples them to `tile_size` when needed
pub fn decode_tile(
    index: TileIndex,
    bytes: &[u8],
    tile_size: u32,
) -> std::result::Result<TileImage, TileFetchError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| TileFetchError::new(index, FetchCause::Decode(e.to_string())))?;
    let mut pixels = decoded.to_rgba8();

    if pixels.width() != tile_size || pixels.height() != tile_size {
        pixels = image::imageops::resize(&pixels, tile_size, tile_size, FilterType::Lanczos3);
    }

    Ok(TileImage::new(index, pixels))
}

/// Fetches tiles from a raster tile server over HTTP
pub struct HttpTileSource {
    template: TileUrlTemplate,
    client: reqwest::Client,
}

impl HttpTileSource {
    pub fn new(config: &TileLoadingConfig) -> Result<Self> {
        let template = TileUrlTemplate::new(config.url_template.clone(), config.subdomains.clone())?;

        let client = if config.user_agent == TileLoadingConfig::default().user_agent
            && config.request_timeout_ms == TileLoadingConfig::default().request_timeout_ms
        {
            (*HTTP_CLIENT).clone().map_err(MapError::Config)?
        } else {
            build_client(config)?
        };

        Ok(Self { template, client })
    }

    /// OpenStreetMap with default settings
    pub fn openstreetmap() -> Result<Self> {
        Self::new(&TileLoadingConfig::default())
    }

    pub fn template(&self) -> &TileUrlTemplate {
        &self.template
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch(
        &self,
        index: TileIndex,
        tile_size: u32,
    ) -> std::result::Result<TileImage, TileFetchError> {
        let url = self.template.url(index);
        log::debug!("fetch tile {} from {}", index, url);

        let network = |e: reqwest::Error| {
            if e.is_timeout() {
                TileFetchError::new(index, FetchCause::Timeout)
            } else {
                TileFetchError::new(index, FetchCause::Network(e.to_string()))
            }
        };

        let response = self.client.get(&url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TileFetchError::new(index, FetchCause::Status(status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(network)?;
        log::info!("downloaded tile {} ({} bytes)", index, bytes.len());
        decode_tile(index, &bytes, tile_size)
    }
}
