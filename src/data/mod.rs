pub mod features;
pub mod geojson;

pub use features::{Feature, FeatureCollection, Geometry, Polygon, Ring};
