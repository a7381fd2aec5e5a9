//! Integration tests for the `GeoJSON` feature source

use std::fs;

use archesetl_core_common::{FeatureSource, ShapeType};
use features_geojson::GeoJsonFeatureSource;
use tempfile::TempDir;

#[test]
fn test_read_feature_collection() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("heritage_sites.geojson");
    fs::write(
        &path,
        r#"{
  "type": "FeatureCollection",
  "features": [
    {"type":"Feature","geometry":{"type":"Point","coordinates":[-74.006,40.7128]},
     "properties":{"NAME":"Old Barn","TYPE":"Barn","YEAR":1880}},
    {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},
     "properties":{"NAME":"Canal","CONDITION":null}}
  ]
}"#,
    )
    .unwrap();

    let mut source = GeoJsonFeatureSource::open(&path).unwrap();
    assert_eq!(source.dataset_name(), "heritage_sites");
    assert_eq!(source.fields(), ["NAME", "TYPE", "YEAR", "CONDITION"]);
    assert!(source.is_spatial());
    assert_eq!(source.len(), 2);

    let features: Vec<_> = source.features().collect::<Result<_, _>>().unwrap();
    assert_eq!(features[0].value("YEAR"), Some("1880"));
    assert_eq!(features[1].value("CONDITION"), None);

    let first = features[0].geometry.as_deref().unwrap();
    let second = features[1].geometry.as_deref().unwrap();
    assert_eq!(ShapeType::from_wkt(first).unwrap(), ShapeType::Point);
    assert_eq!(ShapeType::from_wkt(second).unwrap(), ShapeType::Polyline);

    assert!(source.is_empty());
}

#[test]
fn test_null_geometries_make_a_table() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("owners.geojson");
    fs::write(
        &path,
        r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{"OWNER":"Smith"}}
        ]}"#,
    )
    .unwrap();

    let source = GeoJsonFeatureSource::open(&path).unwrap();
    assert!(!source.is_spatial());
    assert_eq!(source.fields(), ["OWNER"]);
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = GeoJsonFeatureSource::open(temp_dir.path().join("nope.geojson")).unwrap_err();
    assert!(err.to_string().contains("Failed to read GeoJSON source"));
}
