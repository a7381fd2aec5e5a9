//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting export runs, conflig groups and drivers.

use std::path::Path;

use tabled::{Table, Tabled};

use archesetl_core::config::MappingGroup;
use archesetl_core::drivers::Driver;
use archesetl_core::operations::TemplateSummary;
use archesetl_core::types::{DatasetSummary, ExportSummary, MappingInfo};

/// Table row representation for displaying one field mapping.
#[derive(Tabled)]
pub struct MappingRow {
    /// Name of the group the mapping belongs to.
    #[tabled(rename = "Group")]
    pub group: String,
    /// Source field in the dataset.
    #[tabled(rename = "Field")]
    pub field: String,
    /// Target entity code.
    #[tabled(rename = "Entity")]
    pub entity: String,
}

impl From<&MappingInfo> for MappingRow {
    fn from(info: &MappingInfo) -> Self {
        Self {
            group: info.group.clone(),
            field: info.field.clone(),
            entity: info.entity.clone(),
        }
    }
}

/// Table row representation for displaying the outcome of one dataset.
#[derive(Tabled)]
pub struct DatasetRow {
    #[tabled(rename = "Dataset")]
    pub name: String,
    #[tabled(rename = "Shape")]
    pub shape: String,
    #[tabled(rename = "Resources")]
    pub resources: usize,
    #[tabled(rename = "Rows")]
    pub rows: usize,
    #[tabled(rename = "Skipped")]
    pub skipped: usize,
    #[tabled(rename = "Resource Ids")]
    pub ids: String,
}

impl From<&DatasetSummary> for DatasetRow {
    fn from(summary: &DatasetSummary) -> Self {
        let ids = match (&summary.first_resource, &summary.last_resource) {
            (Some(first), Some(last)) if first == last => first.to_string(),
            (Some(first), Some(last)) => format!("{first} .. {last}"),
            _ => "-".to_string(),
        };
        Self {
            name: summary.name.clone(),
            shape: summary.shape_label().to_string(),
            resources: summary.features_emitted,
            rows: summary.rows_written,
            skipped: summary.features_skipped,
            ids,
        }
    }
}

/// Table row representation for displaying driver information.
#[derive(Tabled)]
pub struct DriverRow {
    /// Short identifier for the driver (e.g., `CSV`, `GeoJSON`).
    #[tabled(rename = "Short Name")]
    pub short_name: String,
    /// Full descriptive name of the driver format.
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    /// File extensions claimed by the driver.
    #[tabled(rename = "Extensions")]
    pub extensions: String,
    /// Support status for reading features.
    #[tabled(rename = "Read")]
    pub read: String,
    /// Support status for reading geometries.
    #[tabled(rename = "Geometry")]
    pub geometry: String,
}

impl From<&Driver> for DriverRow {
    fn from(driver: &Driver) -> Self {
        Self {
            short_name: driver.short_name.to_string(),
            long_name: driver.long_name.to_string(),
            extensions: driver.extensions.join(", "),
            read: driver.capabilities.read.as_str().to_string(),
            geometry: driver.capabilities.geometry.as_str().to_string(),
        }
    }
}

/// Table row representation for a dataset field offered for mapping.
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub name: String,
}

fn mapping_table(mappings: &[MappingInfo]) -> String {
    Table::new(mappings.iter().map(MappingRow::from)).to_string()
}

/// Prints the run summary of an export: per dataset the source, conflig,
/// resource type, shape and field mapping, then the files written.
pub fn display_export_summary(summary: &ExportSummary) {
    for dataset in &summary.datasets {
        println!("\nFROM: {}", dataset.path.display());
        println!("TO: {}", summary.arches_path.display());
        println!("CONFLIG: {}", dataset.config.display());
        println!("Resource type: {}", dataset.resource_type);
        println!("Shape type: {}", dataset.shape_label());

        if dataset.mappings.is_empty() {
            println!("\n(no field mappings)");
        } else {
            println!("\n=== Field Mapping ===");
            println!("{}", mapping_table(&dataset.mappings));
        }
    }

    println!("\n=== Export ===");
    println!("{}", Table::new(summary.datasets.iter().map(DatasetRow::from)));

    println!("\nAttributes: {} ({} rows)", summary.arches_path.display(), summary.rows_written());
    println!(
        "Relations: {} ({} relationships)",
        summary.relations_path.display(),
        summary.relationships
    );
    println!(
        "Next ids: resource {}, group {}",
        summary.sequence.last_resource_id + 1,
        summary.sequence.last_group_id + 1
    );
}

/// Prints the conflig created by `init` and the fields available for mapping.
pub fn display_template(template: &TemplateSummary) {
    println!("\nCreated conflig: {}", template.path.display());
    println!(
        "Dataset is {}",
        if template.spatial { "spatial" } else { "a table (no geometry)" }
    );

    if !template.fields.is_empty() {
        println!("\n=== Fields ===");
        let rows = template.fields.iter().map(|name| FieldRow { name: name.clone() });
        println!("{}", Table::new(rows));
    }
}

/// Prints a group added by `add-group`.
pub fn display_group(config: &Path, group: &MappingGroup) {
    println!("\nAdded {} to {}", group.name, config.display());

    let rows = group.mappings.iter().map(|m| MappingRow {
        group: group.name.clone(),
        field: m.field.clone(),
        entity: m.entity.clone(),
    });
    println!("{}", Table::new(rows));
}

/// Prints the driver registry.
pub fn display_drivers(drivers: &[Driver]) {
    println!("\nAvailable Drivers ({} total):\n", drivers.len());
    println!("{}", Table::new(drivers.iter().map(DriverRow::from)));
}
