//! Driver definitions for feature source formats.
//!
//! A driver describes one input format the exporter can pull features from,
//! the file extensions it claims and whether it can carry geometry. The static
//! registry itself lives in `archesetl-core`.

/// Support status for a specific driver capability.
///
/// Indicates whether a capability is currently supported, planned for future
/// implementation, or not supported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// The feature is fully supported and implemented.
    Supported,
    /// The feature is not supported by the driver.
    NotSupported,
    /// The feature is planned for future implementation.
    Planned,
}

impl SupportStatus {
    /// Returns `true` if the capability is fully supported and implemented.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportStatus::Supported)
    }

    /// Returns `true` if the capability is supported or planned (i.e., not explicitly unsupported).
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, SupportStatus::NotSupported)
    }

    /// Returns the string representation of this support status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::NotSupported => "Not Supported",
            SupportStatus::Planned => "Planned",
        }
    }
}

/// Capabilities of a feature source driver.
///
/// `read` covers iterating attribute records; `geometry` covers producing a WKT
/// geometry per record. A driver that reads but has no geometry support only
/// yields non-spatial tables.
#[derive(Debug, Clone, Copy)]
pub struct DriverCapabilities {
    /// Support status for reading feature attributes.
    pub read: SupportStatus,
    /// Support status for reading feature geometry.
    pub geometry: SupportStatus,
}

impl DriverCapabilities {
    /// Returns `true` if at least one capability is supported or planned.
    #[must_use]
    pub fn has_any_support(&self) -> bool {
        self.read.is_available() || self.geometry.is_available()
    }

    /// Returns `true` if at least one capability is fully supported and implemented.
    #[must_use]
    pub fn has_supported_operation(&self) -> bool {
        self.read.is_supported() || self.geometry.is_supported()
    }
}

/// Feature source driver definition.
///
/// Each driver has a short name (used on the command line), a descriptive long
/// name, the file extensions it is selected for and its capabilities.
#[derive(Debug, Clone)]
pub struct Driver {
    /// Short name used in the CLI and for driver identification (e.g., `"GeoJSON"`).
    pub short_name: &'static str,
    /// Long descriptive name for display purposes.
    pub long_name: &'static str,
    /// Lower-case file extensions (without the dot) handled by this driver.
    pub extensions: &'static [&'static str],
    /// Capabilities of this driver.
    pub capabilities: DriverCapabilities,
}

impl Driver {
    /// Creates a new driver definition with specified capabilities.
    #[must_use]
    pub const fn new(
        short_name: &'static str,
        long_name: &'static str,
        extensions: &'static [&'static str],
        read: SupportStatus,
        geometry: SupportStatus,
    ) -> Self {
        Self {
            short_name,
            long_name,
            extensions,
            capabilities: DriverCapabilities { read, geometry },
        }
    }

    /// Returns `true` if `extension` (without the dot, any case) belongs to this driver.
    #[must_use]
    pub fn handles_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_extension_case_insensitive() {
        let driver = Driver::new(
            "GeoJSON",
            "GeoJSON",
            &["geojson", "json"],
            SupportStatus::Supported,
            SupportStatus::Supported,
        );
        assert!(driver.handles_extension("GeoJSON"));
        assert!(driver.handles_extension("json"));
        assert!(!driver.handles_extension("csv"));
    }

    #[test]
    fn test_capabilities() {
        let caps = DriverCapabilities {
            read: SupportStatus::Planned,
            geometry: SupportStatus::NotSupported,
        };
        assert!(caps.has_any_support());
        assert!(!caps.has_supported_operation());
    }
}
