//! Export runs and conflig maintenance.
//!
//! This module provides the entry points used by the CLI: [`export`] turns one
//! or more datasets into an `.arches` / `.relations` pair, [`create_config_template`]
//! starts a conflig for a dataset and [`add_group`] extends one.

use std::fs;
use std::path::{Path, PathBuf};

use archesetl_core_common::FeatureSource;
use log::{info, warn};

use crate::authority::AuthorityCache;
use crate::config::{Config, MappingGroup};
use crate::drivers::open_feature_source;
use crate::error::{ConfigError, IoErrorExt, Result};
use crate::output::ArchesWriter;
use crate::relations::{emit, write_relations};
use crate::sequence::{SequenceState, Sequencer};
use crate::transform::{RecordTransformer, RunContext};
use crate::types::{DatasetSpec, DatasetSummary, ExportRequest, ExportSummary, MappingInfo};
use crate::utils::{OutputPaths, config_path_in};

/// A dataset that passed validation and is ready to transform.
struct PreparedDataset<'a> {
    spec: &'a DatasetSpec,
    config: Config,
    source: Box<dyn FeatureSource>,
}

/// Loads the conflig and opens the source of every dataset, checking that all
/// mapped fields and join fields exist.
fn prepare<'a>(request: &'a ExportRequest) -> Result<Vec<PreparedDataset<'a>>> {
    let mut prepared = Vec::with_capacity(request.datasets.len());

    for spec in &request.datasets {
        let config = Config::load(&spec.config)?;
        let source = open_feature_source(&spec.path, request.driver.as_deref())?;
        let name = source.dataset_name().to_string();

        config.validate_against(source.fields(), &name)?;
        if let Some(field) = &spec.relate_field {
            if !source.fields().contains(field) {
                return Err(ConfigError::RelationshipFieldMissing {
                    field: field.clone(),
                    dataset: name,
                }
                .into());
            }
        }

        prepared.push(PreparedDataset {
            spec,
            config,
            source,
        });
    }

    Ok(prepared)
}

fn mapping_info(groups: &[MappingGroup]) -> Vec<MappingInfo> {
    groups
        .iter()
        .flat_map(|group| {
            group.mappings.iter().map(|m| MappingInfo {
                group: group.name.clone(),
                field: m.field.clone(),
                entity: m.entity.clone(),
            })
        })
        .collect()
}

/// Picks the first ids of the run.
///
/// Appending continues after the persisted state and the tail of the existing
/// export, whichever is later, so rows left by an interrupted run are never
/// reused. A new export starts fresh.
fn starting_sequence(paths: &OutputPaths, append: bool) -> Result<Sequencer> {
    if !append {
        return Ok(Sequencer::fresh());
    }

    let state = SequenceState::load(&paths.state)?.map(Sequencer::from_state);
    let tail = if paths.arches.is_file() {
        Some(Sequencer::resume_from(&paths.arches)?)
    } else {
        None
    };

    Ok(match (state, tail) {
        (Some(state), Some(tail)) => {
            info!("Continuing ids from {}", paths.state.display());
            state.later(tail)
        },
        (Some(state), None) => {
            info!("Continuing ids from {}", paths.state.display());
            state
        },
        (None, Some(tail)) => {
            info!("Continuing ids from the last row of {}", paths.arches.display());
            tail
        },
        (None, None) => Sequencer::fresh(),
    })
}

/// Transforms every prepared dataset into `writer`, in order.
fn transform_datasets(
    prepared: &mut [PreparedDataset<'_>],
    arches: &Path,
    ctx: &mut RunContext,
    writer: &mut ArchesWriter,
) -> Result<Vec<DatasetSummary>> {
    let mut datasets = Vec::with_capacity(prepared.len());
    for dataset in prepared {
        let name = dataset.source.dataset_name().to_string();
        let spatial = dataset.source.is_spatial();

        info!("FROM: {}", dataset.spec.path.display());
        info!("TO: {}", arches.display());
        info!("CONFLIG: {}", dataset.spec.config.display());
        info!("Resource type: {}", dataset.config.resource_type);
        info!("Spatial: {spatial}");

        let transformer = RecordTransformer::new(&dataset.config, name.clone(), spatial)
            .with_relate_field(dataset.spec.relate_field.as_deref());
        let stats = transformer.transform_all(dataset.source.as_mut(), ctx, writer)?;

        info!(
            "Exported {} resources ({} rows) from '{name}'",
            stats.features_emitted, stats.rows_written
        );
        datasets.push(DatasetSummary {
            name,
            path: dataset.spec.path.clone(),
            config: dataset.spec.config.clone(),
            resource_type: dataset.config.resource_type.clone(),
            shape: stats.shape,
            mappings: mapping_info(&dataset.config.groups),
            features_read: stats.features_read,
            features_emitted: stats.features_emitted,
            features_skipped: stats.features_skipped,
            rows_written: stats.rows_written,
            first_resource: stats.first_resource,
            last_resource: stats.last_resource,
        });
    }
    Ok(datasets)
}

/// Exports the datasets of `request` into one `.arches` file and its `.relations`
/// companion.
///
/// Every conflig, dataset and join field is checked, and the authority policy
/// is built, before any output is touched. Datasets are then transformed in
/// order, sharing resource ids, group ids, authority tables and relationship
/// keys. The sequence state is stored once all rows are flushed.
///
/// # Errors
///
/// Returns the first configuration, source, authority, sequence, output or
/// I/O error. Nothing is written when validation fails, and rows written
/// before a later failure are removed again.
pub fn export(request: &ExportRequest) -> Result<ExportSummary> {
    let Some(first) = request.datasets.first() else {
        return Err(ConfigError::InvalidOption {
            option: "datasets".to_string(),
            message: "at least one dataset is required".to_string(),
        }
        .into());
    };

    let mut prepared = prepare(request)?;

    let authority = match &request.authority_dir {
        Some(dir) => {
            let policy = request.authority_policy.build(dir)?;
            info!("Reconciling values against {} ({} policy)", dir.display(), policy.name());
            AuthorityCache::new(policy)
        },
        None => AuthorityCache::disabled(),
    };

    let paths = OutputPaths::resolve(
        request.out_dir.as_deref(),
        request.output.as_deref(),
        &first.path,
    );
    if let Some(parent) = paths.arches.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_write_context("output directory", parent)?;
    }

    let sequencer = starting_sequence(&paths, request.append)?;
    let mut ctx = RunContext::new(sequencer, authority);
    let mut writer = if request.append {
        ArchesWriter::append(&paths.arches)?
    } else {
        ArchesWriter::create(&paths.arches)?
    };

    let datasets = match transform_datasets(&mut prepared, &paths.arches, &mut ctx, &mut writer) {
        Ok(datasets) => datasets,
        Err(err) => {
            warn!("Export failed; removing its rows from {}", paths.arches.display());
            if let Err(rollback) = writer.discard() {
                warn!("Could not roll back {}: {rollback}", paths.arches.display());
            }
            return Err(err);
        },
    };

    writer.finish()?;
    let sequence = ctx.sequencer.state();
    sequence.store(&paths.state)?;

    let relations = emit(&ctx.relations, &request.relation_type);
    let relationships = write_relations(&paths.relations, &relations, request.append)?;

    info!(
        "Export complete: {} ({} authority documents used)",
        paths.arches.display(),
        ctx.authority.loaded_tables()
    );

    Ok(ExportSummary {
        arches_path: paths.arches,
        relations_path: paths.relations,
        state_path: paths.state,
        datasets,
        relationships,
        sequence,
    })
}

/// Result of [`create_config_template`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSummary {
    /// The new conflig
    pub path: PathBuf,
    /// Fields available for mapping
    pub fields: Vec<String>,
    /// Whether the dataset carries geometry
    pub spatial: bool,
}

/// Writes a starter conflig for `dataset`.
///
/// The conflig lands in `out_dir` (or next to the dataset) as `<name>.conflig`.
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyExists`] when the conflig exists and `force`
/// is not set, and any error opening the dataset or writing the file.
pub fn create_config_template(
    dataset: &Path,
    out_dir: Option<&Path>,
    resource_type: &str,
    driver: Option<&str>,
    force: bool,
) -> Result<TemplateSummary> {
    let source = open_feature_source(dataset, driver)?;

    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => dataset.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let path = config_path_in(&dir, dataset);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path }.into());
    }

    Config::template(dataset.to_string_lossy(), resource_type).save(&path)?;
    info!("Created conflig {}", path.display());

    Ok(TemplateSummary {
        path,
        fields: source.fields().to_vec(),
        spatial: source.is_spatial(),
    })
}

/// Appends a group built from `entries` to the conflig at `config_path`.
///
/// Returns the new group.
///
/// # Errors
///
/// Returns an error if the conflig cannot be read, parsed or written.
pub fn add_group(config_path: &Path, entries: &[(String, String)]) -> Result<MappingGroup> {
    let mut config = Config::load(config_path)?;
    let group = config.add_group(entries.iter().cloned()).clone();
    config.save(config_path)?;
    info!(
        "Added {} with {} mappings to {}",
        group.name,
        group.mappings.len(),
        config_path.display()
    );
    Ok(group)
}
