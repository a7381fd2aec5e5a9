//! Shapefile feature source implementation

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use archesetl_core_common::{
    FeatureIter, FeatureRecord, FeatureSource, SourceError, SourceResult, dataset_name,
};
use geo_types::Geometry;
use geozero::ToWkt;
use shapefile::dbase::{self, FieldValue, Record};
use shapefile::Shape;

const FORMAT: &str = "Shapefile";

/// Name dbase gives the hidden record deletion marker.
const DELETION_FLAG: &str = "DeletionFlag";

type ShpReader = shapefile::Reader<BufReader<File>, BufReader<File>>;

/// Feature source backed by a `.shp` / `.dbf` pair.
///
/// Shapes and records are streamed from disk, so [`FeatureSource::features`]
/// can only be iterated once per source. Null shapes yield records without
/// geometry.
pub struct ShapefileFeatureSource {
    path: PathBuf,
    name: String,
    fields: Vec<String>,
    reader: ShpReader,
}

impl ShapefileFeatureSource {
    /// Opens `path` and reads the field list of its `.dbf` table.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.shp` or `.dbf` file cannot be opened or its
    /// header cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = shapefile::Reader::from_path(&path).map_err(|e| shapefile_error(&path, e))?;

        let dbf = path.with_extension("dbf");
        let table = dbase::Reader::from_path(&dbf).map_err(|e| parse_error(&dbf, e.to_string()))?;
        let fields = table
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .filter(|name| name != DELETION_FLAG)
            .collect();

        Ok(Self {
            name: dataset_name(&path),
            path,
            fields,
            reader,
        })
    }

    /// Path of the `.shp` file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureSource for ShapefileFeatureSource {
    fn dataset_name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn is_spatial(&self) -> bool {
        true
    }

    fn features(&mut self) -> FeatureIter<'_> {
        let fields = &self.fields;
        let path = &self.path;

        Box::new(self.reader.iter_shapes_and_records().map(move |result| {
            let (shape, record) = result.map_err(|e| shapefile_error(path, e))?;
            to_feature(fields, shape, record, path)
        }))
    }
}

fn to_feature(fields: &[String], shape: Shape, mut record: Record, path: &Path) -> SourceResult<FeatureRecord> {
    let mut feature = FeatureRecord::default();

    for field in fields {
        if let Some(text) = record.remove(field).and_then(field_text) {
            feature.properties.insert(field.clone(), text);
        }
    }
    feature.geometry = shape_wkt(shape, path)?;

    Ok(feature)
}

/// Renders a shape as WKT; `None` for null shapes.
pub(crate) fn shape_wkt(shape: Shape, path: &Path) -> SourceResult<Option<String>> {
    match shape {
        Shape::NullShape => Ok(None),
        Shape::Multipatch(_) => Err(SourceError::UnsupportedGeometryType {
            geometry_type: "MULTIPATCH".to_string(),
            feature: None,
        }),
        shape => {
            let geometry = Geometry::<f64>::try_from(shape).map_err(|e| parse_error(path, e.to_string()))?;
            geometry
                .to_wkt()
                .map(Some)
                .map_err(|e| parse_error(path, e.to_string()))
        },
    }
}

/// Renders a dbase value as text; `None` for nulls.
///
/// Character values lose the right padding of their fixed-width column.
pub(crate) fn field_text(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(text) => text.map(|t| t.trim_end().to_string()),
        FieldValue::Memo(text) => Some(text),
        FieldValue::Numeric(n) => n.map(|n| n.to_string()),
        FieldValue::Float(n) => n.map(|n| n.to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        FieldValue::Date(date) => {
            date.map(|d| format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        },
        FieldValue::Integer(n) => Some(n.to_string()),
        FieldValue::Currency(n) | FieldValue::Double(n) => Some(n.to_string()),
        other => Some(format!("{other:?}")),
    }
}

fn shapefile_error(path: &Path, err: shapefile::Error) -> SourceError {
    match err {
        shapefile::Error::IoError(source) => SourceError::Io {
            format: FORMAT.to_string(),
            path: path.to_path_buf(),
            source,
        },
        other => parse_error(path, other.to_string()),
    }
}

fn parse_error(path: &Path, message: String) -> SourceError {
    SourceError::Parse {
        format: FORMAT.to_string(),
        path: path.to_path_buf(),
        line: None,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archesetl_core_common::ShapeType;
    use shapefile::{Multipoint, Point, Polyline};

    fn path() -> &'static Path {
        Path::new("sites.shp")
    }

    #[test]
    fn test_shape_wkt_classifies() {
        let point = shape_wkt(Shape::Point(Point::new(1.5, 2.0)), path()).unwrap().unwrap();
        assert_eq!(ShapeType::from_wkt(&point).unwrap(), ShapeType::Point);
        assert!(point.contains("1.5 2"));

        let line = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let line = shape_wkt(Shape::Polyline(line), path()).unwrap().unwrap();
        assert_eq!(ShapeType::from_wkt(&line).unwrap(), ShapeType::Polyline);

        let cluster = Multipoint::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let cluster = shape_wkt(Shape::Multipoint(cluster), path()).unwrap().unwrap();
        assert!(ShapeType::from_wkt(&cluster).is_err());
    }

    #[test]
    fn test_null_shape_has_no_geometry() {
        assert_eq!(shape_wkt(Shape::NullShape, path()).unwrap(), None);
    }

    #[test]
    fn test_field_text_renders_values() {
        assert_eq!(
            field_text(FieldValue::Character(Some("Old Barn   ".to_string()))).as_deref(),
            Some("Old Barn")
        );
        assert_eq!(field_text(FieldValue::Character(None)), None);
        assert_eq!(field_text(FieldValue::Numeric(Some(1880.0))).as_deref(), Some("1880"));
        assert_eq!(field_text(FieldValue::Numeric(Some(2.5))).as_deref(), Some("2.5"));
        assert_eq!(field_text(FieldValue::Numeric(None)), None);
        assert_eq!(field_text(FieldValue::Logical(Some(true))).as_deref(), Some("true"));
        assert_eq!(field_text(FieldValue::Integer(7)).as_deref(), Some("7"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ShapefileFeatureSource::open("/nonexistent/sites.shp");
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }
}
