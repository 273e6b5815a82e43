//! In-memory feature model consumed by the overlay renderer

use crate::core::geo::GeoPoint;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// A closed boundary. First and last point are usually equal; nothing relies on it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring(pub Vec<GeoPoint>);

impl Ring {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn first(&self) -> Option<&GeoPoint> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&GeoPoint> {
        self.0.last()
    }

    pub fn reverse(&mut self) {
        self.0.reverse();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<[f64; 2]>> for Ring {
    fn from(coords: Vec<[f64; 2]>) -> Self {
        Self(coords.into_iter().map(GeoPoint::from).collect())
    }
}

/// Outer ring followed by any number of inner rings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<Ring>);

impl Polygon {
    pub fn new(rings: Vec<Ring>) -> Self {
        Self(rings)
    }

    pub fn rings(&self) -> &[Ring] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    LineString(Vec<GeoPoint>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// GeoJSON name of the geometry kind
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Checks everything the renderer relies on; the reason names the first problem
    pub fn check(&self) -> std::result::Result<(), String> {
        fn check_points(points: &[GeoPoint]) -> std::result::Result<(), String> {
            match points.iter().position(|p| !p.is_projectable()) {
                Some(i) => Err(format!(
                    "point {} ({}, {}) cannot be projected",
                    i, points[i].lon, points[i].lat
                )),
                None => Ok(()),
            }
        }

        fn check_polygon(polygon: &Polygon) -> std::result::Result<(), String> {
            for (i, ring) in polygon.rings().iter().enumerate() {
                if ring.len() < 3 {
                    return Err(format!("ring {} has {} points, need at least 3", i, ring.len()));
                }
                check_points(ring.points()).map_err(|e| format!("ring {}: {}", i, e))?;
            }
            Ok(())
        }

        match self {
            Geometry::LineString(points) => {
                if points.len() < 2 {
                    return Err(format!(
                        "line string has {} points, need at least 2",
                        points.len()
                    ));
                }
                check_points(points)
            }
            Geometry::Polygon(polygon) => check_polygon(polygon),
            Geometry::MultiPolygon(polygons) => {
                for (i, polygon) in polygons.iter().enumerate() {
                    check_polygon(polygon).map_err(|e| format!("polygon {}: {}", i, e))?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<geo_types::Geometry<f64>> for Geometry {
    type Error = MapError;

    fn try_from(geometry: geo_types::Geometry<f64>) -> Result<Self> {
        fn ring(line: geo_types::LineString<f64>) -> Ring {
            Ring(line.0.into_iter().map(GeoPoint::from).collect())
        }

        fn polygon(polygon: geo_types::Polygon<f64>) -> Polygon {
            let (exterior, interiors) = polygon.into_inner();
            let mut rings = Vec::with_capacity(1 + interiors.len());
            rings.push(ring(exterior));
            rings.extend(interiors.into_iter().map(ring));
            Polygon(rings)
        }

        match geometry {
            geo_types::Geometry::LineString(line) => Ok(Geometry::LineString(
                line.0.into_iter().map(GeoPoint::from).collect(),
            )),
            geo_types::Geometry::Polygon(p) => Ok(Geometry::Polygon(polygon(p))),
            geo_types::Geometry::MultiPolygon(mp) => Ok(Geometry::MultiPolygon(
                mp.0.into_iter().map(polygon).collect(),
            )),
            other => Err(MapError::UnsupportedGeometryKind(
                geo_types_kind(&other).to_string(),
            )),
        }
    }
}

fn geo_types_kind(geometry: &geo_types::Geometry<f64>) -> &'static str {
    match geometry {
        geo_types::Geometry::Point(_) => "Point",
        geo_types::Geometry::Line(_) => "Line",
        geo_types::Geometry::LineString(_) => "LineString",
        geo_types::Geometry::Polygon(_) => "Polygon",
        geo_types::Geometry::MultiPoint(_) => "MultiPoint",
        geo_types::Geometry::MultiLineString(_) => "MultiLineString",
        geo_types::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo_types::Geometry::Rect(_) => "Rect",
        geo_types::Geometry::Triangle(_) => "Triangle",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            id: None,
            properties: None,
        }
    }
}

/// Ordered features of one overlay. Replaced wholesale, never edited by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Fails on the first feature the renderer could not draw faithfully
    pub fn validate(&self) -> Result<()> {
        for (index, feature) in self.features.iter().enumerate() {
            feature
                .geometry
                .check()
                .map_err(|reason| MapError::MalformedFeature { index, reason })?;
        }
        Ok(())
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn square(min: f64, max: f64) -> Ring {
        Ring::from(vec![[min, min], [max, min], [max, max], [min, max], [min, min]])
    }

    #[test]
    fn test_valid_collection() {
        let collection: FeatureCollection = vec![
            Feature::new(Geometry::LineString(vec![
                GeoPoint::new(13.0, 52.5),
                GeoPoint::new(13.1, 52.55),
            ])),
            Feature::new(Geometry::Polygon(Polygon::new(vec![square(0.0, 1.0)]))),
            Feature::new(Geometry::MultiPolygon(vec![])),
        ]
        .into_iter()
        .collect();

        assert_eq!(collection.len(), 3);
        assert!(collection.validate().is_ok());
    }

    #[test]
    fn test_malformed_features_are_reported_with_index() {
        let collection = FeatureCollection::new(vec![
            Feature::new(Geometry::Polygon(Polygon::new(vec![square(0.0, 1.0)]))),
            Feature::new(Geometry::LineString(vec![GeoPoint::new(1.0, 1.0)])),
        ]);
        match collection.validate() {
            Err(MapError::MalformedFeature { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("line string"));
            }
            other => panic!("unexpected result {:?}", other),
        }

        let collection = FeatureCollection::new(vec![Feature::new(Geometry::MultiPolygon(vec![
            Polygon::new(vec![Ring::from(vec![[0.0, 0.0], [1.0, f64::NAN], [1.0, 1.0]])]),
        ]))]);
        assert!(matches!(
            collection.validate(),
            Err(MapError::MalformedFeature { index: 0, .. })
        ));

        let polar = FeatureCollection::new(vec![Feature::new(Geometry::LineString(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 90.0),
        ]))]);
        assert!(polar.validate().is_err());
    }

    #[test]
    fn test_from_geo_types() {
        let polygon = geo_types::polygon![
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 1.0)]],
        ];
        let geometry = Geometry::try_from(geo_types::Geometry::Polygon(polygon)).unwrap();
        match geometry {
            Geometry::Polygon(p) => {
                assert_eq!(p.rings().len(), 2);
                assert_eq!(p.rings()[1].first(), Some(&GeoPoint::new(1.0, 1.0)));
            }
            other => panic!("unexpected geometry {:?}", other),
        }

        let point = geo_types::Geometry::Point(geo_types::point!(x: 1.0, y: 2.0));
        match Geometry::try_from(point) {
            Err(MapError::UnsupportedGeometryKind(kind)) => assert_eq!(kind, "Point"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
