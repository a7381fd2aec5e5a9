//! ESRI Shapefile feature source for `ArchesETL`.
//!
//! Reads the `.shp` geometries together with the `.dbf` attribute table and
//! converts each shape to WKT.

pub mod file_source;

pub use file_source::ShapefileFeatureSource;
