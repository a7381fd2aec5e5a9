//! Errors raised by feature sources.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening or iterating a feature source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// An underlying I/O failure occurred.
    #[error("Failed to read {format} source '{path}': {source}")]
    Io {
        /// The format being read (e.g., "CSV", "`GeoJSON`")
        format: String,
        /// The source path
        path: PathBuf,
        /// The originating error
        #[source]
        source: std::io::Error,
    },

    /// Parsing failed for the input source.
    #[error("Failed to parse {format} source '{path}'{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Parse {
        /// The format being parsed
        format: String,
        /// The source path
        path: PathBuf,
        /// 1-based line number where parsing failed (if known)
        line: Option<u64>,
        /// Description of the failure
        message: String,
    },

    /// A geometry column was requested but the source does not have it.
    #[error("Geometry column '{column}' not found in '{path}'")]
    MissingGeometryColumn {
        /// The requested column
        column: String,
        /// The source path
        path: PathBuf,
    },

    /// A feature carries a geometry other than point, line or polygon.
    #[error("Unsupported geometry type: {geometry_type}{}", .feature.map(|f| format!(" (feature {f})")).unwrap_or_default())]
    UnsupportedGeometryType {
        /// The unsupported geometry type
        geometry_type: String,
        /// 1-based feature index, when known
        feature: Option<usize>,
    },
}

/// Result type used by feature sources.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
