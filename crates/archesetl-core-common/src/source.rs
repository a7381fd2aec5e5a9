//! Feature source abstraction.
//!
//! A feature source exposes the field names of a dataset and iterates its
//! records. Spatial sources attach a WKT geometry to each record.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{SourceError, SourceResult};

/// One record read from a feature source.
///
/// Null attribute values are simply absent from `properties`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureRecord {
    /// Attribute values keyed by field name.
    pub properties: BTreeMap<String, String>,
    /// Geometry as well-known text, for spatial sources.
    pub geometry: Option<String>,
}

impl FeatureRecord {
    /// Creates a record from attribute pairs without geometry.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            geometry: None,
        }
    }

    /// Attaches a WKT geometry to the record.
    #[must_use]
    pub fn with_geometry(mut self, wkt: impl Into<String>) -> Self {
        self.geometry = Some(wkt.into());
        self
    }

    /// Returns the raw value of `field`, or `None` when null.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&str> {
        self.properties.get(field).map(String::as_str)
    }
}

/// Derives a dataset name from a path: the file name without its extension.
#[must_use]
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map_or_else(|| "dataset".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Boxed iterator over the records of a feature source.
pub type FeatureIter<'a> = Box<dyn Iterator<Item = SourceResult<FeatureRecord>> + 'a>;

/// A dataset that can be exported.
pub trait FeatureSource {
    /// Dataset name used as the prefix of resource ids.
    fn dataset_name(&self) -> &str;

    /// Attribute field names, in source order. Never includes the geometry column.
    fn fields(&self) -> &[String];

    /// Returns `true` when records carry geometry.
    fn is_spatial(&self) -> bool;

    /// Iterates the records of the dataset.
    fn features(&mut self) -> FeatureIter<'_>;
}

/// Shape families that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    /// `POINT`
    Point,
    /// `LINESTRING` / `MULTILINESTRING`
    Polyline,
    /// `POLYGON` / `MULTIPOLYGON`
    Polygon,
}

impl ShapeType {
    /// Classifies a WKT string by its leading geometry keyword.
    ///
    /// Only the keyword is inspected; the coordinates are passed through as-is.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnsupportedGeometryType`] for any other geometry
    /// type (multi-points, collections, ...), or when no keyword is present.
    pub fn from_wkt(wkt: &str) -> SourceResult<Self> {
        let keyword: String = wkt
            .trim_start()
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .collect::<String>()
            .to_ascii_uppercase();

        match keyword.as_str() {
            "POINT" => Ok(Self::Point),
            "LINESTRING" | "MULTILINESTRING" => Ok(Self::Polyline),
            "POLYGON" | "MULTIPOLYGON" => Ok(Self::Polygon),
            "" => Err(SourceError::UnsupportedGeometryType {
                geometry_type: wkt.chars().take(32).collect(),
                feature: None,
            }),
            _ => Err(SourceError::UnsupportedGeometryType {
                geometry_type: keyword,
                feature: None,
            }),
        }
    }

    /// Returns the display name of this shape type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::Polyline => "POLYLINE",
            Self::Polygon => "POLYGON",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
