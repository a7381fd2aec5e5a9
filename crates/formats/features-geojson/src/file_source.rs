//! `GeoJSON` feature source implementation

use std::path::{Path, PathBuf};

use archesetl_core_common::{
    FeatureIter, FeatureRecord, FeatureSource, SourceError, SourceResult, dataset_name,
};

use crate::parser::parse_geojson_bytes;

/// Feature source backed by a `GeoJSON` document.
///
/// `GeoJSON` has no schema, so the field list is the union of all property
/// names in first-seen order. The dataset counts as spatial when any feature
/// carries a geometry.
#[derive(Debug)]
pub struct GeoJsonFeatureSource {
    path: PathBuf,
    name: String,
    fields: Vec<String>,
    spatial: bool,
    records: Vec<FeatureRecord>,
}

impl GeoJsonFeatureSource {
    /// Reads and parses the whole document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid `GeoJSON`.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|source| SourceError::Io {
            format: "GeoJSON".to_string(),
            path: path.clone(),
            source,
        })?;

        let parsed = parse_geojson_bytes(&bytes, &path)?;

        let mut fields: Vec<String> = Vec::new();
        for feature in &parsed {
            for key in feature.properties.keys() {
                if !fields.iter().any(|f| f == key) {
                    fields.push(key.clone());
                }
            }
        }

        let spatial = parsed.iter().any(|f| f.geometry.is_some());
        let records = parsed
            .into_iter()
            .map(|feature| feature.into_record(&path))
            .collect::<SourceResult<Vec<_>>>()?;

        Ok(Self {
            name: dataset_name(&path),
            path,
            fields,
            spatial,
            records,
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

    /// Number of features not yet handed out by [`FeatureSource::features`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no features remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FeatureSource for GeoJsonFeatureSource {
    fn dataset_name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn is_spatial(&self) -> bool {
        self.spatial
    }

    fn features(&mut self) -> FeatureIter<'_> {
        Box::new(std::mem::take(&mut self.records).into_iter().map(Ok))
    }
}
