//! CSV feature source for `ArchesETL`.
//!
//! Reads delimited text files with a header row. An optional column holding
//! well-known text turns the table into a spatial dataset.

pub mod file_format;
pub mod file_source;

pub use file_format::{CsvSourceOptions, GeometryColumn};
pub use file_source::CsvFeatureSource;
