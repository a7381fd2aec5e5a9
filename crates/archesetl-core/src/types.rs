//! Data types for export runs.
//!
//! This module defines the request handed to [`crate::operations::export`] and
//! the summary it returns.

use std::path::PathBuf;

use archesetl_core_common::ShapeType;

use crate::authority::AuthorityPolicyKind;
use crate::relations::DEFAULT_RELATION_TYPE;
use crate::sequence::{ResourceId, SequenceState};

/// One dataset of an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Path to the dataset
    pub path: PathBuf,
    /// Path to its conflig
    pub config: PathBuf,
    /// Join field for relationship output
    pub relate_field: Option<String>,
}

impl DatasetSpec {
    pub fn new(path: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: config.into(),
            relate_field: None,
        }
    }

    #[must_use]
    pub fn with_relate_field(mut self, field: impl Into<String>) -> Self {
        self.relate_field = Some(field.into());
        self
    }
}

/// Parameters of an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Datasets, exported in order into one output
    pub datasets: Vec<DatasetSpec>,
    /// Directory holding authority documents; `None` disables reconciliation
    pub authority_dir: Option<PathBuf>,
    /// How authority-backed entities are recognized
    pub authority_policy: AuthorityPolicyKind,
    /// Directory for `<first dataset>.arches` / `.relations`
    pub out_dir: Option<PathBuf>,
    /// Explicit `.arches` path, overriding `out_dir`
    pub output: Option<PathBuf>,
    /// Continue an existing export instead of replacing it
    pub append: bool,
    /// Relation type written to `.relations` rows
    pub relation_type: String,
    /// Driver name; inferred from each file extension when `None`
    pub driver: Option<String>,
}

impl ExportRequest {
    #[must_use]
    pub fn new(datasets: Vec<DatasetSpec>) -> Self {
        Self {
            datasets,
            authority_dir: None,
            authority_policy: AuthorityPolicyKind::default(),
            out_dir: None,
            output: None,
            append: false,
            relation_type: DEFAULT_RELATION_TYPE.to_string(),
            driver: None,
        }
    }

    #[must_use]
    pub fn with_authority_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.authority_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_authority_policy(mut self, policy: AuthorityPolicyKind) -> Self {
        self.authority_policy = policy;
        self
    }

    #[must_use]
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    #[must_use]
    pub fn with_relation_type(mut self, relation_type: impl Into<String>) -> Self {
        self.relation_type = relation_type.into();
        self
    }

    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }
}

/// A field mapping as shown in run summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingInfo {
    /// Group name
    pub group: String,
    /// Source field
    pub field: String,
    /// Target entity code
    pub entity: String,
}

/// Outcome of exporting one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    /// Dataset name (resource id prefix)
    pub name: String,
    /// Path to the dataset
    pub path: PathBuf,
    /// Path to its conflig
    pub config: PathBuf,
    /// Resource type from the conflig
    pub resource_type: String,
    /// Shape family of the first geometry; `None` for tables
    pub shape: Option<ShapeType>,
    /// Field mappings in declaration order
    pub mappings: Vec<MappingInfo>,
    /// Features read from the source
    pub features_read: usize,
    /// Features that received a resource id
    pub features_emitted: usize,
    /// Spatial features skipped for lacking geometry
    pub features_skipped: usize,
    /// Attribute rows written
    pub rows_written: usize,
    /// First resource id handed out
    pub first_resource: Option<ResourceId>,
    /// Last resource id handed out
    pub last_resource: Option<ResourceId>,
}

impl DatasetSummary {
    /// Shape label used in summaries: `POINT`, `POLYLINE`, `POLYGON` or `TABLE`.
    #[must_use]
    pub fn shape_label(&self) -> &'static str {
        self.shape.map_or("TABLE", |s| s.as_str())
    }
}

/// Outcome of an export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// The `.arches` file
    pub arches_path: PathBuf,
    /// The `.relations` file
    pub relations_path: PathBuf,
    /// The persisted sequence state
    pub state_path: PathBuf,
    /// Per-dataset results, in request order
    pub datasets: Vec<DatasetSummary>,
    /// Relationship rows written
    pub relationships: usize,
    /// Sequence state after the run
    pub sequence: SequenceState,
}

impl ExportSummary {
    /// Attribute rows written across all datasets.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.datasets.iter().map(|d| d.rows_written).sum()
    }

    /// Resources exported across all datasets.
    #[must_use]
    pub fn resources(&self) -> usize {
        self.datasets.iter().map(|d| d.features_emitted).sum()
    }
}
