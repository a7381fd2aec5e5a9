//! Driver registry for feature source formats.
//!
//! Lists every dataset format `archesetl` knows about together with its support
//! status, and opens datasets through the drivers that can read them.
//!
//! # Examples
//!
//! ```
//! use archesetl_core::drivers::{find_driver, find_driver_for_path};
//! use std::path::Path;
//!
//! let csv = find_driver("csv").expect("CSV driver should exist");
//! assert!(csv.capabilities.read.is_supported());
//!
//! let driver = find_driver_for_path(Path::new("sites.geojson")).unwrap();
//! assert_eq!(driver.short_name, "GeoJSON");
//! ```

use std::path::Path;

pub use archesetl_core_common::{Driver, DriverCapabilities, SupportStatus};
use archesetl_core_common::FeatureSource;
use features_csv::{CsvFeatureSource, CsvSourceOptions};
use features_geojson::GeoJsonFeatureSource;
use features_shapefile::ShapefileFeatureSource;
use log::debug;

use crate::error::{DriverError, Result, driver_not_found};

/// Returns the full driver registry.
#[must_use]
pub fn get_drivers() -> Vec<Driver> {
    vec![
        Driver::new(
            "CSV",
            "Comma Separated Value (.csv) with optional WKT column",
            &["csv", "txt", "tsv"],
            SupportStatus::Supported,
            SupportStatus::Supported,
        ),
        Driver::new(
            "GeoJSON",
            "GeoJSON and newline-delimited GeoJSON",
            &["geojson", "json", "geojsonl", "geojsons"],
            SupportStatus::Supported,
            SupportStatus::Supported,
        ),
        Driver::new(
            "ESRI Shapefile",
            "ESRI Shapefile",
            &["shp"],
            SupportStatus::Supported,
            SupportStatus::Supported,
        ),
        Driver::new(
            "GPKG",
            "GeoPackage vector",
            &["gpkg"],
            SupportStatus::Planned,
            SupportStatus::Planned,
        ),
        Driver::new(
            "OpenFileGDB",
            "ESRI File Geodatabase vector",
            &["gdb"],
            SupportStatus::NotSupported,
            SupportStatus::NotSupported,
        ),
        Driver::new(
            "KML",
            "Keyhole Markup Language",
            &["kml"],
            SupportStatus::NotSupported,
            SupportStatus::NotSupported,
        ),
    ]
}

/// Drivers with at least one supported capability.
#[must_use]
pub fn get_available_drivers() -> Vec<Driver> {
    get_drivers()
        .into_iter()
        .filter(|d| d.capabilities.has_supported_operation())
        .collect()
}

/// Finds a driver by short name, ignoring case.
#[must_use]
pub fn find_driver(name: &str) -> Option<Driver> {
    get_drivers()
        .into_iter()
        .find(|d| d.short_name.eq_ignore_ascii_case(name))
}

/// Finds the driver claiming the extension of `path`.
#[must_use]
pub fn find_driver_for_path(path: &Path) -> Option<Driver> {
    let extension = path.extension()?.to_str()?;
    get_drivers()
        .into_iter()
        .find(|d| d.handles_extension(extension))
}

/// Returns all driver short names in alphabetically sorted order.
#[must_use]
pub fn get_driver_names() -> Vec<&'static str> {
    let mut names: Vec<_> = get_drivers().iter().map(|d| d.short_name).collect();
    names.sort_unstable();
    names
}

/// Opens `path` as a feature source.
///
/// The driver is looked up by `driver` when given, otherwise by the file
/// extension.
///
/// # Errors
///
/// Returns a [`DriverError`] when no driver matches or the driver cannot
/// read, and the source error when the dataset cannot be opened.
pub fn open_feature_source(path: &Path, driver: Option<&str>) -> Result<Box<dyn FeatureSource>> {
    let driver = match driver {
        Some(name) => find_driver(name).ok_or_else(|| driver_not_found(name))?,
        None => find_driver_for_path(path).ok_or_else(|| DriverError::UnknownExtension {
            path: path.to_path_buf(),
        })?,
    };

    if !driver.capabilities.read.is_supported() {
        return Err(DriverError::ReadNotSupported {
            driver: driver.short_name.to_string(),
        }
        .into());
    }

    debug!("Opening {} with driver {}", path.display(), driver.short_name);
    match driver.short_name {
        "CSV" => {
            let mut options = CsvSourceOptions::new();
            let is_tsv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
            if is_tsv {
                options = options.with_delimiter(b'\t');
            }
            Ok(Box::new(CsvFeatureSource::open(path, &options)?))
        },
        "GeoJSON" => Ok(Box::new(GeoJsonFeatureSource::open(path)?)),
        "ESRI Shapefile" => Ok(Box::new(ShapefileFeatureSource::open(path)?)),
        other => Err(DriverError::ReadNotSupported {
            driver: other.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchesEtlError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_driver_case_insensitive() {
        let driver = find_driver("geojson");
        assert!(driver.is_some());
        assert_eq!(driver.unwrap().short_name, "GeoJSON");
        assert!(find_driver("InvalidDriver").is_none());
    }

    #[test]
    fn test_find_driver_for_path() {
        assert_eq!(
            find_driver_for_path(Path::new("data/sites.CSV")).unwrap().short_name,
            "CSV"
        );
        assert_eq!(
            find_driver_for_path(Path::new("sites.shp")).unwrap().short_name,
            "ESRI Shapefile"
        );
        assert!(find_driver_for_path(Path::new("sites")).is_none());
    }

    #[test]
    fn test_available_drivers() {
        let names: Vec<_> = get_available_drivers().iter().map(|d| d.short_name).collect();
        assert_eq!(names, vec!["CSV", "GeoJSON", "ESRI Shapefile"]);
    }

    #[test]
    fn test_driver_names_sorted() {
        let names = get_driver_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_open_unreadable_driver_fails() {
        let err = open_feature_source(Path::new("sites.gpkg"), None).err().unwrap();
        assert!(matches!(
            err,
            ArchesEtlError::Driver(DriverError::ReadNotSupported { .. })
        ));

        let err = open_feature_source(Path::new("sites.xyz"), None).err().unwrap();
        assert!(matches!(
            err,
            ArchesEtlError::Driver(DriverError::UnknownExtension { .. })
        ));

        let err = open_feature_source(Path::new("sites.csv"), Some("Parquet")).err().unwrap();
        assert!(matches!(err, ArchesEtlError::Driver(DriverError::NotFound { .. })));
    }

    #[test]
    fn test_open_missing_shapefile_is_source_error() {
        let dir = TempDir::new().unwrap();
        let err = open_feature_source(&dir.path().join("sites.shp"), None).err().unwrap();
        assert!(matches!(err, ArchesEtlError::Source(_)));
    }

    #[test]
    fn test_open_tsv_uses_tab_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sites.tsv");
        fs::write(&path, "NAME\tTYPE\nOld Barn\tBarn\n").unwrap();

        let mut source = open_feature_source(&path, None).unwrap();
        assert_eq!(source.fields(), ["NAME".to_string(), "TYPE".to_string()]);
        assert!(!source.is_spatial());
        let feature = source.features().next().unwrap().unwrap();
        assert_eq!(feature.value("TYPE"), Some("Barn"));
    }

    #[test]
    fn test_open_with_explicit_driver() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sites.data");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{"NAME":"A"}}]}"#,
        )
        .unwrap();

        let source = open_feature_source(&path, Some("geojson")).unwrap();
        assert_eq!(source.dataset_name(), "sites");
        assert!(source.is_spatial());
    }
}
