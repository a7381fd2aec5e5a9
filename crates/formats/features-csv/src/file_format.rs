//! CSV source configuration

/// Column names recognised as WKT geometry when [`GeometryColumn::Auto`] is used.
pub const WKT_COLUMN_CANDIDATES: &[&str] = &["WKT", "SHAPE@WKT", "GEOMETRY", "GEOM", "THE_GEOM"];

/// How the geometry column of a CSV file is located.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeometryColumn {
    /// Use the first header matching [`WKT_COLUMN_CANDIDATES`] (case-insensitive),
    /// or treat the file as a non-spatial table when none matches.
    #[default]
    Auto,
    /// Use the named column; its absence is an error.
    Named(String),
    /// Treat the file as a non-spatial table.
    None,
}

/// CSV source configuration options
#[derive(Debug, Clone)]
pub struct CsvSourceOptions {
    /// The delimiter character (default: b',')
    pub delimiter: u8,
    /// Location of the WKT geometry column (default: auto-detect)
    pub geometry: GeometryColumn,
    /// Whether values are trimmed of surrounding whitespace (default: false)
    pub trim: bool,
}

impl Default for CsvSourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            geometry: GeometryColumn::Auto,
            trim: false,
        }
    }
}

impl CsvSourceOptions {
    /// Create new CSV source options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter character
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read geometry from the named WKT column
    #[must_use]
    pub fn with_geometry_from_wkt(mut self, column: impl Into<String>) -> Self {
        self.geometry = GeometryColumn::Named(column.into());
        self
    }

    /// Treat the file as a non-spatial table
    #[must_use]
    pub fn without_geometry(mut self) -> Self {
        self.geometry = GeometryColumn::None;
        self
    }

    /// Set whether values are trimmed
    #[must_use]
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Finds the index of the geometry column among `headers`.
    pub(crate) fn geometry_index(&self, headers: &[String]) -> Result<Option<usize>, String> {
        match &self.geometry {
            GeometryColumn::None => Ok(None),
            GeometryColumn::Named(column) => headers
                .iter()
                .position(|h| h == column)
                .map(Some)
                .ok_or_else(|| column.clone()),
            GeometryColumn::Auto => Ok(WKT_COLUMN_CANDIDATES.iter().find_map(|candidate| {
                headers
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case(candidate))
            })),
        }
    }
}
