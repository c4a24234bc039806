//! KML to GeoJSON conversion
//!
//! Every `Placemark` in the document, at any depth, becomes one feature.
//! Placemarks without geometry are dropped. Element names are matched by
//! local name so `kml:` and `gx:` prefixes do not matter.

use crate::error::ParseError;
use crate::geojson::{Feature, Geometry, GeometryDocument, Position, Properties};
use crate::parse_xml::XmlNode;
use serde_json::{Map, Value};
use tracing::warn;

/// Plain-text placemark children copied into properties as strings
const TEXT_PROPERTIES: [&str; 4] = ["name", "address", "description", "styleUrl"];

/// Converts a parsed KML tree into a feature collection
pub fn kml_to_geojson(root: &XmlNode) -> Result<GeometryDocument, ParseError> {
    if root.local_name() != "kml" {
        return Err(ParseError::Kml(format!(
            "root element is <{}>, expected <kml>",
            root.name
        )));
    }

    let mut placemarks = Vec::new();
    root.descendants_named("Placemark", &mut placemarks);

    let mut features = Vec::with_capacity(placemarks.len());
    let mut skipped = 0usize;
    for placemark in placemarks {
        match placemark_to_feature(placemark)? {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "skipped KML placemarks without geometry");
    }

    Ok(GeometryDocument::new(features))
}

fn placemark_to_feature(placemark: &XmlNode) -> Result<Option<Feature>, ParseError> {
    let mut geometries = Vec::new();
    collect_geometries(placemark, &mut geometries)?;

    let geometry = match geometries.len() {
        0 => return Ok(None),
        1 => geometries.pop(),
        _ => Some(Geometry::GeometryCollection { geometries }),
    };

    let mut feature = Feature::new(geometry, placemark_properties(placemark));
    feature.id = placemark.attribute("id").map(|id| Value::String(id.to_string()));
    Ok(Some(feature))
}

fn collect_geometries(node: &XmlNode, out: &mut Vec<Geometry>) -> Result<(), ParseError> {
    for child in &node.children {
        match child.local_name() {
            "Point" => {
                if let Some(position) = coordinates_of(child)?.into_iter().next() {
                    out.push(Geometry::Point { coordinates: position });
                }
            }
            "LineString" | "LinearRing" => {
                let coordinates = coordinates_of(child)?;
                if !coordinates.is_empty() {
                    out.push(Geometry::LineString { coordinates });
                }
            }
            "Polygon" => {
                let mut rings = Vec::new();
                for boundary in ["outerBoundaryIs", "innerBoundaryIs"] {
                    for side in child.children_named(boundary) {
                        for ring in side.children_named("LinearRing") {
                            let coordinates = coordinates_of(ring)?;
                            if !coordinates.is_empty() {
                                rings.push(coordinates);
                            }
                        }
                    }
                }
                if !rings.is_empty() {
                    out.push(Geometry::Polygon { coordinates: rings });
                }
            }
            "MultiGeometry" => collect_geometries(child, out)?,
            "Track" => {
                // gx:coord holds one space-separated tuple per element
                let mut coordinates = Vec::new();
                for coord in child.children_named("coord") {
                    if let Some(position) = parse_tuple(coord.text_content.trim(), ' ')? {
                        coordinates.push(position);
                    }
                }
                if !coordinates.is_empty() {
                    out.push(Geometry::LineString { coordinates });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parses the `<coordinates>` child: whitespace-separated `lng,lat[,alt]` tuples
fn coordinates_of(node: &XmlNode) -> Result<Vec<Position>, ParseError> {
    let Some(text) = node.child_text("coordinates") else {
        return Ok(Vec::new());
    };

    // "1, 2" is one tuple; drop whitespace around commas before splitting tuples apart
    let text = text.split(',').map(str::trim).collect::<Vec<_>>().join(",");

    let mut positions = Vec::new();
    for tuple in text.split_whitespace() {
        if let Some(position) = parse_tuple(tuple, ',')? {
            positions.push(position);
        }
    }
    Ok(positions)
}

fn parse_tuple(tuple: &str, separator: char) -> Result<Option<Position>, ParseError> {
    let values = tuple
        .split(separator)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| ParseError::Kml(format!("invalid coordinate '{}'", v)))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    match values.len() {
        0 => Ok(None),
        1 => Err(ParseError::Kml(format!("incomplete coordinate '{}'", tuple))),
        _ => Ok(Some(values.into_iter().take(3).collect())),
    }
}

fn placemark_properties(placemark: &XmlNode) -> Properties {
    let mut properties = Properties::new();

    for key in TEXT_PROPERTIES {
        if let Some(text) = placemark.child_text(key) {
            properties.insert(key.to_string(), Value::String(text.to_string()));
        }
    }

    if let Some(visibility) = placemark.child_text("visibility") {
        properties.insert("visibility".to_string(), Value::Bool(visibility != "0"));
    }

    if let Some(when) = placemark.child("TimeStamp").and_then(|t| t.child_text("when")) {
        properties.insert("timestamp".to_string(), Value::String(when.to_string()));
    }

    if let Some(span) = placemark.child("TimeSpan") {
        let mut timespan = Map::new();
        for key in ["begin", "end"] {
            if let Some(text) = span.child_text(key) {
                timespan.insert(key.to_string(), Value::String(text.to_string()));
            }
        }
        properties.insert("timespan".to_string(), Value::Object(timespan));
    }

    if let Some(extended) = placemark.child("ExtendedData") {
        for data in extended.children_named("Data") {
            if let Some(name) = data.attribute("name") {
                let value = data.child_text("value").unwrap_or_default();
                properties.insert(name.to_string(), Value::String(value.to_string()));
            }
        }
        for schema_data in extended.children_named("SchemaData") {
            for simple in schema_data.children_named("SimpleData") {
                if let Some(name) = simple.attribute("name") {
                    properties.insert(
                        name.to_string(),
                        Value::String(simple.text_content.trim().to_string()),
                    );
                }
            }
        }
    }

    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_xml::parse_xml_str;
    use serde_json::json;

    fn convert(kml: &str) -> Result<GeometryDocument, ParseError> {
        kml_to_geojson(&parse_xml_str(kml)?)
    }

    #[test]
    fn test_point_placemark() {
        let doc = convert(
            r#"<kml><Document><Placemark id="p1">
                <name>Tower</name>
                <Point><coordinates> 106.8, -6.2, 12 </coordinates></Point>
            </Placemark></Document></kml>"#,
        )
        .unwrap();
        assert_eq!(doc.features.len(), 1);
        let feature = &doc.features[0];
        assert_eq!(feature.id, Some(json!("p1")));
        assert_eq!(feature.properties["name"], json!("Tower"));
        assert_eq!(
            feature.geometry,
            Some(Geometry::Point { coordinates: vec![106.8, -6.2, 12.0] })
        );
    }

    #[test]
    fn test_polygon_with_hole() {
        let doc = convert(
            r#"<kml><Placemark><Polygon>
                <outerBoundaryIs><LinearRing><coordinates>0,0 10,0 10,10 0,10 0,0</coordinates></LinearRing></outerBoundaryIs>
                <innerBoundaryIs><LinearRing><coordinates>2,2 3,2 3,3 2,2</coordinates></LinearRing></innerBoundaryIs>
            </Polygon></Placemark></kml>"#,
        )
        .unwrap();
        match &doc.features[0].geometry {
            Some(Geometry::Polygon { coordinates }) => {
                assert_eq!(coordinates.len(), 2);
                assert_eq!(coordinates[0].len(), 5);
                assert_eq!(coordinates[1][0], vec![2.0, 2.0]);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_multigeometry_becomes_collection() {
        let doc = convert(
            r#"<kml><Placemark><MultiGeometry>
                <Point><coordinates>1,2</coordinates></Point>
                <LineString><coordinates>0,0 1,1</coordinates></LineString>
            </MultiGeometry></Placemark></kml>"#,
        )
        .unwrap();
        match &doc.features[0].geometry {
            Some(Geometry::GeometryCollection { geometries }) => {
                assert_eq!(geometries.len(), 2);
                assert_eq!(geometries[0].type_name(), "Point");
                assert_eq!(geometries[1].type_name(), "LineString");
            }
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_gx_track() {
        let doc = convert(
            r#"<kml xmlns:gx="http://www.google.com/kml/ext/2.2"><Placemark><gx:Track>
                <when>2024-01-01T00:00:00Z</when>
                <gx:coord>1 2 3</gx:coord>
                <gx:coord>4 5 6</gx:coord>
            </gx:Track></Placemark></kml>"#,
        )
        .unwrap();
        assert_eq!(
            doc.features[0].geometry,
            Some(Geometry::LineString {
                coordinates: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
            })
        );
    }

    #[test]
    fn test_extended_data_and_time() {
        let doc = convert(
            r##"<kml><Placemark>
                <visibility>0</visibility>
                <TimeSpan><begin>2020</begin></TimeSpan>
                <ExtendedData>
                    <Data name="kecamatan"><value>Menteng</value></Data>
                    <SchemaData schemaUrl="#s"><SimpleData name="luas">12.5</SimpleData></SchemaData>
                </ExtendedData>
                <Point><coordinates>1,1</coordinates></Point>
            </Placemark></kml>"##,
        )
        .unwrap();
        let props = &doc.features[0].properties;
        assert_eq!(props["visibility"], json!(false));
        assert_eq!(props["timespan"], json!({"begin": "2020"}));
        assert_eq!(props["kecamatan"], json!("Menteng"));
        assert_eq!(props["luas"], json!("12.5"));
    }

    #[test]
    fn test_placemark_without_geometry_is_skipped() {
        let doc = convert("<kml><Placemark><name>empty</name></Placemark></kml>").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_rejects_non_kml_root() {
        assert!(matches!(convert("<gpx/>"), Err(ParseError::Kml(_))));
    }

    #[test]
    fn test_bad_coordinates() {
        let result = convert(
            "<kml><Placemark><Point><coordinates>east,north</coordinates></Point></Placemark></kml>",
        );
        assert!(matches!(result, Err(ParseError::Kml(_))));

        let result = convert(
            "<kml><Placemark><Point><coordinates>12</coordinates></Point></Placemark></kml>",
        );
        assert!(matches!(result, Err(ParseError::Kml(_))));
    }
}
