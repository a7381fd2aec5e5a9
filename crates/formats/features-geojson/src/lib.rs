//! `GeoJSON` feature source for `ArchesETL`.
//!
//! Reads `FeatureCollection` documents and newline-delimited `GeoJSON`
//! sequences, converting each geometry to WKT.

pub mod file_source;
pub mod parser;

pub use file_source::GeoJsonFeatureSource;
