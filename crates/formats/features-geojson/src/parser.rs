//! `GeoJSON` parsing helpers.

use std::convert::TryInto;
use std::path::Path;

use archesetl_core_common::{FeatureRecord, SourceError, SourceResult};
use geo_types::Geometry;
use geojson::{
    Feature, FeatureCollection, GeoJson, Geometry as GeoJsonGeometry, JsonObject, JsonValue,
};
use geozero::ToWkt;

const FORMAT: &str = "GeoJSON";

/// Parsed `GeoJSON` feature with materialized properties and geometry.
#[derive(Debug, Clone)]
pub struct ParsedFeature {
    pub properties: JsonObject,
    pub geometry: Option<Geometry<f64>>,
}

impl ParsedFeature {
    /// Converts properties to text values and the geometry to WKT.
    ///
    /// JSON `null` properties are dropped so they read as missing values.
    pub fn into_record(self, path: &Path) -> SourceResult<FeatureRecord> {
        let geometry = match self.geometry {
            Some(geometry) => Some(geometry.to_wkt().map_err(|err| parse_error(
                path,
                None,
                format!("Failed to write geometry as WKT: {err}"),
            ))?),
            None => None,
        };

        let properties = self
            .properties
            .into_iter()
            .filter_map(|(key, value)| property_text(value).map(|text| (key, text)))
            .collect();

        Ok(FeatureRecord {
            properties,
            geometry,
        })
    }
}

/// Renders a property value as the text written to the export.
pub(crate) fn property_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        other @ (JsonValue::Array(_) | JsonValue::Object(_)) => Some(other.to_string()),
    }
}

/// Parse raw bytes into a vector of `ParsedFeature`s.
///
/// Accepts a `FeatureCollection`, a single `Feature` or bare geometry, or a
/// newline-delimited `GeoJSON` sequence.
pub fn parse_geojson_bytes(bytes: &[u8], path: &Path) -> SourceResult<Vec<ParsedFeature>> {
    let reader = std::io::Cursor::new(bytes);

    match GeoJson::from_reader(reader) {
        Ok(geojson) => geojson_to_features(geojson, path),
        Err(primary_err) => {
            let primary_err_message = primary_err.to_string();
            match parse_geojson_sequence(bytes, path) {
                Ok(features) => Ok(features),
                Err(sequence_err) => Err(combine_errors(&primary_err_message, &sequence_err, path)),
            }
        },
    }
}

fn geojson_to_features(geojson: GeoJson, path: &Path) -> SourceResult<Vec<ParsedFeature>> {
    match geojson {
        GeoJson::FeatureCollection(collection) => feature_collection_to_features(collection, path),
        GeoJson::Feature(feature) => Ok(vec![convert_feature(feature, path)?]),
        GeoJson::Geometry(geometry) => Ok(vec![ParsedFeature {
            properties: JsonObject::new(),
            geometry: Some(convert_geometry(geometry, path)?),
        }]),
    }
}

fn feature_collection_to_features(
    collection: FeatureCollection,
    path: &Path,
) -> SourceResult<Vec<ParsedFeature>> {
    collection
        .features
        .into_iter()
        .map(|feature| convert_feature(feature, path))
        .collect()
}

fn convert_feature(feature: Feature, path: &Path) -> SourceResult<ParsedFeature> {
    let geometry = match feature.geometry {
        Some(geometry) => Some(convert_geometry(geometry, path)?),
        None => None,
    };

    Ok(ParsedFeature {
        properties: feature.properties.unwrap_or_default(),
        geometry,
    })
}

fn convert_geometry(geometry: GeoJsonGeometry, path: &Path) -> SourceResult<Geometry<f64>> {
    geometry.try_into().map_err(|err| {
        parse_error(path, None, format!("Failed to convert GeoJSON geometry: {err}"))
    })
}

fn parse_geojson_sequence(bytes: &[u8], path: &Path) -> SourceResult<Vec<ParsedFeature>> {
    let mut features = Vec::new();
    for (line_idx, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line_number = (line_idx + 1) as u64;
        let line = match std::str::from_utf8(raw_line) {
            Ok(line) => line.trim(),
            Err(err) => {
                return Err(parse_error(
                    path,
                    Some(line_number),
                    format!("GeoJSON line is not valid UTF-8: {err}"),
                ));
            },
        };

        if line.is_empty() {
            continue;
        }

        let geojson = line.parse::<GeoJson>().map_err(|err| {
            parse_error(
                path,
                Some(line_number),
                format!("Failed to parse GeoJSON feature: {err}"),
            )
        })?;

        features.append(&mut geojson_to_features(geojson, path)?);
    }

    if features.is_empty() {
        Err(parse_error(path, None, "No GeoJSON features found".to_string()))
    } else {
        Ok(features)
    }
}

fn combine_errors(collection_err: &str, sequence_err: &SourceError, path: &Path) -> SourceError {
    let detail = match sequence_err {
        SourceError::Parse { message, .. } => message.clone(),
        other => other.to_string(),
    };
    parse_error(
        path,
        None,
        format!(
            "Failed to parse GeoJSON as FeatureCollection ({collection_err}); \
             also failed to parse as GeoJSON sequence: {detail}"
        ),
    )
}

fn parse_error(path: &Path, line: Option<u64>, message: String) -> SourceError {
    SourceError::Parse {
        format: FORMAT.to_string(),
        path: path.to_path_buf(),
        line,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("test.geojson")
    }

    #[test]
    fn parse_feature_collection() {
        let data = br#"{
  "type": "FeatureCollection",
  "features": [
    {"type":"Feature","geometry":{"type":"Point","coordinates":[1.0,2.0]},"properties":{"name":"A"}},
    {"type":"Feature","geometry":null,"properties":{"value":42}}
  ]
}"#;

        let features = parse_geojson_bytes(data, path()).expect("parse");
        assert_eq!(features.len(), 2);
        assert!(features[0].geometry.is_some());
        assert_eq!(features[0].properties.get("name").unwrap(), "A");
        assert!(features[1].geometry.is_none());
        assert_eq!(features[1].properties.get("value").unwrap(), 42);
    }

    #[test]
    fn parse_single_feature_without_properties() {
        let data = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]}}"#;

        let features = parse_geojson_bytes(data, path()).expect("parse");
        assert_eq!(features.len(), 1);
        assert!(features[0].geometry.is_some());
        assert!(features[0].properties.is_empty());
    }

    #[test]
    fn parse_sequence_with_empty_lines() {
        let data = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]},"properties":{"id":1}}

{"type":"Feature","geometry":{"type":"Point","coordinates":[1,1]},"properties":{"id":2}}
"#;

        let features = parse_geojson_bytes(data, path()).expect("sequence");
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn parse_empty_sequence_fails() {
        let err = parse_geojson_bytes(b"\n\n\n", path()).unwrap_err();
        match err {
            SourceError::Parse { message, .. } => {
                assert!(message.contains("No GeoJSON features found"));
            },
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn parse_invalid_geojson_sequence_line() {
        let data = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]},"properties":{"id":1}}
not valid json"#;

        let err = parse_geojson_bytes(data, path()).unwrap_err();
        match err {
            SourceError::Parse { message, .. } => {
                assert!(message.contains("Failed to parse GeoJSON feature"));
            },
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn parse_invalid_json_combines_errors() {
        let err = parse_geojson_bytes(b"not valid json at all", path()).unwrap_err();
        match err {
            SourceError::Parse { message, path, .. } => {
                assert!(message.contains("Failed to parse GeoJSON as FeatureCollection"));
                assert!(message.contains("also failed to parse as GeoJSON sequence"));
                assert_eq!(path, Path::new("test.geojson"));
            },
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn property_text_renders_scalars() {
        assert_eq!(property_text(JsonValue::Null), None);
        assert_eq!(property_text(JsonValue::Bool(true)).as_deref(), Some("true"));
        assert_eq!(property_text(serde_json::json!(42)).as_deref(), Some("42"));
        assert_eq!(property_text(serde_json::json!(1.5)).as_deref(), Some("1.5"));
        assert_eq!(property_text(serde_json::json!("Barn")).as_deref(), Some("Barn"));
        assert_eq!(property_text(serde_json::json!(["a"])).as_deref(), Some("[\"a\"]"));
    }

    #[test]
    fn into_record_writes_wkt() {
        let data = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1.5,2.0]},"properties":{"name":"A","gone":null}}"#;
        let feature = parse_geojson_bytes(data, path()).unwrap().remove(0);
        let record = feature.into_record(path()).unwrap();

        let wkt = record.geometry.clone().expect("geometry");
        assert!(wkt.starts_with("POINT"));
        assert!(wkt.contains("1.5 2"));
        assert_eq!(record.value("name"), Some("A"));
        assert_eq!(record.value("gone"), None);
    }
}
