use anyhow::Context;
use clap::Parser;
use mapraster::{EngineConfig, FeatureCollection, MapCommand, MapView};
use std::path::PathBuf;
use std::sync::Arc;

/// Renders one map frame to a PNG file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON engine configuration; command line flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tile URL template with {z}/{x}/{y} placeholders
    #[arg(long)]
    tiles: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Display scale, 2.0 for a high density screen
    #[arg(long)]
    scale: Option<f64>,
    #[arg(long)]
    zoom: Option<u8>,
    /// Tile offset from the grid centre
    #[arg(long, allow_hyphen_values = true)]
    x: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    y: Option<i64>,
    /// GeoJSON overlay
    #[arg(long)]
    features: Option<PathBuf>,
    /// Commands applied before rendering, e.g. "north,east,in,zoom=14"
    #[arg(long, value_delimiter = ',')]
    commands: Vec<String>,
    #[arg(long, default_value = "map.png")]
    out: PathBuf,
}

impl Args {
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                EngineConfig::from_json_str(&json)?
            }
            None => EngineConfig::default(),
        };

        if let Some(tiles) = &self.tiles {
            config.tiles.url_template = tiles.clone();
        }
        if let Some(width) = self.width {
            config.view.pixel_width = width;
        }
        if let Some(height) = self.height {
            config.view.pixel_height = height;
        }
        if let Some(scale) = self.scale {
            config.view.display_scale = scale;
        }
        if let Some(zoom) = self.zoom {
            config.view.initial_zoom = zoom;
        }
        if let Some(x) = self.x {
            config.view.initial_offset.0 = x;
        }
        if let Some(y) = self.y {
            config.view.initial_offset.1 = y;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mapraster::init_logging();

    let args = Args::parse();
    let config = args.engine_config()?;
    log::info!(
        "tiles from {} ({})",
        config.tiles.url_template,
        config.tiles.attribution_label
    );

    let mut map = MapView::new(config)?;

    if let Some(path) = &args.features {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let features = FeatureCollection::from_geojson_str(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loaded {} features", features.len());
        map.set_feature_collection(Arc::new(features));
    }

    for command in &args.commands {
        let command: MapCommand = command.parse()?;
        map.apply(command);
    }

    let frame = map.render().await?;
    for failure in &frame.failures {
        log::warn!("missing {}", failure);
    }

    frame
        .pixels
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;

    let view = frame.view;
    log::info!(
        "wrote {} at x={} y={} zoom={}",
        args.out.display(),
        view.x,
        view.y,
        view.zoom
    );
    Ok(())
}
