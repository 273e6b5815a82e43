//! GeoJSON ingestion into a [`FeatureCollection`]
//!
//! Only `LineString`, `Polygon` and `MultiPolygon` can be drawn. Every other
//! kind is reported as [`MapError::UnsupportedGeometryKind`] instead of being
//! dropped, since it means producer and consumer disagree about the schema.

use crate::data::features::{Feature, FeatureCollection, Geometry, Polygon, Ring};
use crate::core::geo::GeoPoint;
use crate::{MapError, Result};
use serde::Deserialize;

/// `[lon, lat]` with an optional altitude, which is ignored
type Position = Vec<f64>;

/// GeoJSON geometry types as they appear on the wire
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Point {
        #[allow(dead_code)]
        coordinates: serde_json::Value,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPoint {
        #[allow(dead_code)]
        coordinates: serde_json::Value,
    },
    MultiLineString {
        #[allow(dead_code)]
        coordinates: serde_json::Value,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        #[allow(dead_code)]
        geometries: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    id: Option<serde_json::Value>,
    geometry: Option<serde_json::Value>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Root GeoJSON object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    Feature(GeoJsonFeature),
    FeatureCollection { features: Vec<GeoJsonFeature> },
}

impl FeatureCollection {
    /// Parses a GeoJSON `FeatureCollection`, a single `Feature` or a bare geometry
    pub fn from_geojson_str(geojson: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(geojson)?;
        Self::from_geojson_value(value)
    }

    pub fn from_geojson_value(value: serde_json::Value) -> Result<Self> {
        let kind = value.get("type").and_then(|t| t.as_str());
        let features = match kind {
            Some("Feature") | Some("FeatureCollection") => {
                let root: GeoJson = serde_json::from_value(value)
                    .map_err(|e| MapError::ParseError(format!("Invalid GeoJSON: {}", e)))?;
                match root {
                    GeoJson::Feature(feature) => vec![feature],
                    GeoJson::FeatureCollection { features } => features,
                }
            }
            Some(_) => vec![GeoJsonFeature {
                id: None,
                geometry: Some(value),
                properties: None,
            }],
            None => {
                return Err(MapError::ParseError(
                    "Invalid GeoJSON: root object has no type".to_string(),
                ))
            }
        };

        features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| convert_feature(index, feature))
            .collect::<Result<Vec<_>>>()
            .map(FeatureCollection::new)
    }
}

fn convert_feature(index: usize, feature: GeoJsonFeature) -> Result<Feature> {
    let raw = feature.geometry.ok_or_else(|| MapError::MalformedFeature {
        index,
        reason: "feature has no geometry".to_string(),
    })?;

    let kind = raw
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("<missing>")
        .to_string();

    let geometry: GeoJsonGeometry = match serde_json::from_value(raw) {
        Ok(geometry) => geometry,
        Err(_) if !is_known_kind(&kind) => return Err(MapError::UnsupportedGeometryKind(kind)),
        Err(e) => {
            return Err(MapError::MalformedFeature {
                index,
                reason: format!("invalid {} coordinates: {}", kind, e),
            })
        }
    };

    let geometry = match geometry {
        GeoJsonGeometry::LineString { coordinates } => {
            Geometry::LineString(points(index, coordinates)?)
        }
        GeoJsonGeometry::Polygon { coordinates } => {
            Geometry::Polygon(polygon(index, coordinates)?)
        }
        GeoJsonGeometry::MultiPolygon { coordinates } => Geometry::MultiPolygon(
            coordinates
                .into_iter()
                .map(|rings| polygon(index, rings))
                .collect::<Result<Vec<_>>>()?,
        ),
        GeoJsonGeometry::Point { .. }
        | GeoJsonGeometry::MultiPoint { .. }
        | GeoJsonGeometry::MultiLineString { .. }
        | GeoJsonGeometry::GeometryCollection { .. } => {
            return Err(MapError::UnsupportedGeometryKind(kind))
        }
    };

    Ok(Feature {
        geometry,
        id: feature.id,
        properties: feature.properties,
    })
}

fn points(index: usize, positions: Vec<Position>) -> Result<Vec<GeoPoint>> {
    positions
        .into_iter()
        .map(|position| match position.as_slice() {
            [lon, lat, ..] => Ok(GeoPoint::new(*lon, *lat)),
            _ => Err(MapError::MalformedFeature {
                index,
                reason: format!("position with {} values, need 2", position.len()),
            }),
        })
        .collect()
}

fn polygon(index: usize, rings: Vec<Vec<Position>>) -> Result<Polygon> {
    rings
        .into_iter()
        .map(|ring| points(index, ring).map(Ring::new))
        .collect::<Result<Vec<_>>>()
        .map(Polygon::new)
}

fn is_known_kind(kind: &str) -> bool {
    matches!(
        kind,
        "Point"
            | "LineString"
            | "Polygon"
            | "MultiPoint"
            | "MultiLineString"
            | "MultiPolygon"
            | "GeometryCollection"
    )
}
