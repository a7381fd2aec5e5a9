//! CSV feature source implementation

use std::fs::File;
use std::path::{Path, PathBuf};

use archesetl_core_common::{
    FeatureIter, FeatureRecord, FeatureSource, SourceError, SourceResult, dataset_name,
};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::file_format::CsvSourceOptions;

const FORMAT: &str = "CSV";

/// Feature source backed by a delimited text file.
///
/// The header row defines the fields. Records are streamed from disk, so
/// [`FeatureSource::features`] can only be iterated once per source.
pub struct CsvFeatureSource {
    path: PathBuf,
    name: String,
    headers: Vec<String>,
    fields: Vec<String>,
    geometry_index: Option<usize>,
    reader: csv::Reader<File>,
}

impl CsvFeatureSource {
    /// Opens `path` and reads its header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, the header row cannot be
    /// parsed, or a named geometry column is missing.
    pub fn open(path: impl AsRef<Path>, options: &CsvSourceOptions) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .trim(if options.trim { Trim::All } else { Trim::None })
            .from_path(&path)
            .map_err(|e| csv_error(&path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(&path, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let geometry_index =
            options
                .geometry_index(&headers)
                .map_err(|column| SourceError::MissingGeometryColumn {
                    column,
                    path: path.clone(),
                })?;

        let fields = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != geometry_index)
            .map(|(_, h)| h.clone())
            .collect();

        Ok(Self {
            name: dataset_name(&path),
            path,
            headers,
            fields,
            geometry_index,
            reader,
        })
    }

    /// Overrides the dataset name derived from the file name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureSource for CsvFeatureSource {
    fn dataset_name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn is_spatial(&self) -> bool {
        self.geometry_index.is_some()
    }

    fn features(&mut self) -> FeatureIter<'_> {
        let headers = &self.headers;
        let path = &self.path;
        let geometry_index = self.geometry_index;

        Box::new(self.reader.records().map(move |result| {
            let record = result.map_err(|e| csv_error(path, e))?;
            Ok(to_feature(headers, geometry_index, &record))
        }))
    }
}

fn to_feature(headers: &[String], geometry_index: Option<usize>, record: &StringRecord) -> FeatureRecord {
    let mut feature = FeatureRecord::default();

    for (idx, value) in record.iter().enumerate() {
        if Some(idx) == geometry_index {
            let wkt = value.trim();
            if !wkt.is_empty() {
                feature.geometry = Some(wkt.to_string());
            }
        } else if let Some(header) = headers.get(idx) {
            feature.properties.insert(header.clone(), value.to_string());
        }
    }

    feature
}

fn csv_error(path: &Path, err: csv::Error) -> SourceError {
    let line = err.position().map(csv::Position::line);
    let message = err.to_string();

    match err.into_kind() {
        csv::ErrorKind::Io(source) => SourceError::Io {
            format: FORMAT.to_string(),
            path: path.to_path_buf(),
            source,
        },
        _ => SourceError::Parse {
            format: FORMAT.to_string(),
            path: path.to_path_buf(),
            line,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_to_feature_splits_geometry() {
        let headers = vec!["NAME".to_string(), "WKT".to_string()];
        let record = StringRecord::from(vec!["Old Barn", " POINT (1 2) "]);
        let feature = to_feature(&headers, Some(1), &record);

        assert_eq!(feature.value("NAME"), Some("Old Barn"));
        assert_eq!(feature.value("WKT"), None);
        assert_eq!(feature.geometry.as_deref(), Some("POINT (1 2)"));
    }

    #[test]
    fn test_blank_geometry_is_none() {
        let headers = vec!["NAME".to_string(), "WKT".to_string()];
        let record = StringRecord::from(vec!["Old Barn", "  "]);
        let feature = to_feature(&headers, Some(1), &record);
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_unequal_row_is_parse_error() {
        let file = write_csv("NAME,TYPE\nOld Barn,Barn\nlonely\n");
        let mut source = CsvFeatureSource::open(file.path(), &CsvSourceOptions::default()).unwrap();

        let results: Vec<_> = source.features().collect();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SourceError::Parse { line: Some(3), .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = CsvFeatureSource::open("/nonexistent/sites.csv", &CsvSourceOptions::default());
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }
}
