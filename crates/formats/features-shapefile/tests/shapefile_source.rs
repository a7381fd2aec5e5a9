//! Integration tests for the shapefile feature source

use archesetl_core_common::FeatureSource;
use features_shapefile::ShapefileFeatureSource;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Writer};
use tempfile::TempDir;

fn barn(name: &str, year: f64) -> Record {
    let mut record = Record::default();
    record.insert("NAME".to_string(), FieldValue::Character(Some(name.to_string())));
    record.insert("YEAR".to_string(), FieldValue::Numeric(Some(year)));
    record
}

#[test]
fn test_read_points_with_attributes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("barns.shp");

    {
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("NAME").unwrap(), 50)
            .add_numeric_field(FieldName::try_from("YEAR").unwrap(), 10, 0);
        let mut writer = Writer::from_path(&path, table).unwrap();
        writer
            .write_shape_and_record(&Point::new(-86.64, 32.53), &barn("Old Barn", 1880.0))
            .unwrap();
        writer
            .write_shape_and_record(&Point::new(1.0, 2.0), &barn("Silo", 1921.0))
            .unwrap();
    }

    let mut source = ShapefileFeatureSource::open(&path).unwrap();
    assert_eq!(source.dataset_name(), "barns");
    assert_eq!(source.fields(), ["NAME".to_string(), "YEAR".to_string()]);
    assert!(source.is_spatial());

    let features: Vec<_> = source.features().collect::<Result<_, _>>().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].value("NAME"), Some("Old Barn"));
    assert_eq!(features[0].value("YEAR"), Some("1880"));
    assert!(features[0].geometry.as_deref().unwrap().starts_with("POINT"));
    assert_eq!(features[1].value("NAME"), Some("Silo"));
}
