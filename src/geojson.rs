//! GeoJSON document model
//!
//! Every loader produces a [`GeometryDocument`], a `FeatureCollection` shaped
//! like RFC 7946 GeoJSON. Properties keep their insertion order so that
//! label fallback and the properties table follow the order of the source file.

use crate::error::ParseError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A coordinate tuple: `[lng, lat]` or `[lng, lat, alt]`
pub type Position = Vec<f64>;

/// Feature properties in source order
pub type Properties = IndexMap<String, Value>;

/// Type tag for [`Feature`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

/// Type tag for [`GeometryDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Calls `f` for every position in the geometry, depth first
    pub fn visit_positions<F: FnMut(&[f64])>(&self, f: &mut F) {
        match self {
            Geometry::Point { coordinates } => f(coordinates.as_slice()),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                for p in coordinates {
                    f(p.as_slice());
                }
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                for p in coordinates.iter().flatten() {
                    f(p.as_slice());
                }
            }
            Geometry::MultiPolygon { coordinates } => {
                for p in coordinates.iter().flatten().flatten() {
                    f(p.as_slice());
                }
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.visit_positions(f);
                }
            }
        }
    }

    /// Rewrites every position in place
    pub fn map_positions<F: FnMut(&mut Position)>(&mut self, f: &mut F) {
        match self {
            Geometry::Point { coordinates } => f(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter_mut().for_each(f);
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter_mut().flatten().for_each(f);
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter_mut().flatten().flatten().for_each(f);
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.map_positions(f);
                }
            }
        }
    }

    /// First position in document order, if the geometry has any
    pub fn first_position(&self) -> Option<&Position> {
        match self {
            Geometry::Point { coordinates } => Some(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.first()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().next()
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().next()
            }
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().find_map(Geometry::first_position)
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
            Geometry::GeometryCollection { .. } => "GeometryCollection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty_properties")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            kind: FeatureTag::Feature,
            id: None,
            geometry,
            properties,
        }
    }
}

/// A GeoJSON `FeatureCollection`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDocument {
    #[serde(rename = "type")]
    pub kind: CollectionTag,
    pub features: Vec<Feature>,
    /// Layer name for documents decoded from a shapefile bundle
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl GeometryDocument {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionTag::FeatureCollection,
            features,
            file_name: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for GeometryDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// `"properties": null` is valid GeoJSON; treat it as an empty map
fn null_as_empty_properties<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses GeoJSON text into a feature collection.
///
/// A bare `Feature` or bare geometry is wrapped into a one-feature collection.
///
/// # Errors
/// * [`ParseError::Json`] if the text is not JSON at all
/// * [`ParseError::InvalidGeoJson`] if the JSON is not a GeoJSON object
pub fn parse_geojson(text: &str) -> Result<GeometryDocument, ParseError> {
    let value: Value = serde_json::from_str(text)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::InvalidGeoJson("missing \"type\" member".to_string()))?
        .to_string();

    let invalid = |e: serde_json::Error| ParseError::InvalidGeoJson(format!("{}: {}", kind, e));

    match kind.as_str() {
        "FeatureCollection" => serde_json::from_value(value).map_err(invalid),
        "Feature" => {
            let feature: Feature = serde_json::from_value(value).map_err(invalid)?;
            Ok(GeometryDocument::new(vec![feature]))
        }
        "Point" | "MultiPoint" | "LineString" | "MultiLineString" | "Polygon" | "MultiPolygon"
        | "GeometryCollection" => {
            let geometry: Geometry = serde_json::from_value(value).map_err(invalid)?;
            Ok(GeometryDocument::new(vec![Feature::new(Some(geometry), Properties::new())]))
        }
        other => Err(ParseError::InvalidGeoJson(format!("unknown type '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_feature_collection() {
        let doc = parse_geojson(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":7,"geometry":{"type":"Point","coordinates":[1.5,2.5]},
                 "properties":{"b":1,"a":2}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(doc.features.len(), 1);
        let feature = &doc.features[0];
        assert_eq!(feature.id, Some(json!(7)));
        assert_eq!(
            feature.geometry,
            Some(Geometry::Point { coordinates: vec![1.5, 2.5] })
        );
        // insertion order survives
        let keys: Vec<&str> = feature.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_null_properties_and_geometry() {
        let doc = parse_geojson(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":null,"properties":null}
            ]}"#,
        )
        .unwrap();
        assert!(doc.features[0].geometry.is_none());
        assert!(doc.features[0].properties.is_empty());
    }

    #[test]
    fn test_bare_feature_and_geometry_are_wrapped() {
        let doc = parse_geojson(
            r#"{"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":{"name":"x"}}"#,
        )
        .unwrap();
        assert_eq!(doc.features.len(), 1);
        assert_eq!(doc.features[0].properties["name"], json!("x"));

        let doc = parse_geojson(r#"{"type":"Point","coordinates":[3,4]}"#).unwrap();
        assert_eq!(doc.features.len(), 1);
        assert!(doc.features[0].properties.is_empty());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(parse_geojson("not json"), Err(ParseError::Json(_))));
        assert!(matches!(parse_geojson("42"), Err(ParseError::InvalidGeoJson(_))));
        assert!(matches!(
            parse_geojson(r#"{"type":"Topology"}"#),
            Err(ParseError::InvalidGeoJson(_))
        ));
        assert!(matches!(
            parse_geojson(r#"{"type":"FeatureCollection"}"#),
            Err(ParseError::InvalidGeoJson(_))
        ));
    }

    #[test]
    fn test_serialize_shape() {
        let mut doc = GeometryDocument::new(vec![Feature::new(None, Properties::new())]);
        doc.file_name = Some("roads".to_string());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "FeatureCollection",
                "features": [{"type": "Feature", "geometry": null, "properties": {}}],
                "fileName": "roads"
            })
        );
    }

    #[test]
    fn test_first_position_and_visit() {
        let geometry = Geometry::GeometryCollection {
            geometries: vec![
                Geometry::MultiPoint { coordinates: vec![] },
                Geometry::Polygon {
                    coordinates: vec![vec![vec![5.0, 6.0], vec![7.0, 8.0], vec![5.0, 6.0]]],
                },
            ],
        };
        assert_eq!(geometry.first_position(), Some(&vec![5.0, 6.0]));

        let mut count = 0;
        geometry.visit_positions(&mut |_| count += 1);
        assert_eq!(count, 3);
        assert_eq!(geometry.type_name(), "GeometryCollection");
    }
}
