//! Per-feature expansion into attribute rows.

use archesetl_core_common::{FeatureRecord, FeatureSource, ShapeType, SourceError};
use log::{debug, warn};

use crate::authority::AuthorityCache;
use crate::config::Config;
use crate::error::Result;
use crate::output::{ArchesWriter, AttributeRow, check_value};
use crate::relations::RelationAccumulator;
use crate::sequence::{ResourceId, Sequencer};

/// State shared by every dataset of one export run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub sequencer: Sequencer,
    pub authority: AuthorityCache,
    pub relations: RelationAccumulator,
}

impl RunContext {
    #[must_use]
    pub fn new(sequencer: Sequencer, authority: AuthorityCache) -> Self {
        Self {
            sequencer,
            authority,
            relations: RelationAccumulator::new(),
        }
    }
}

/// What happened to one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureOutcome {
    /// The feature received `resource_id` and expanded into `rows`.
    Emitted {
        resource_id: ResourceId,
        shape: Option<ShapeType>,
        rows: Vec<AttributeRow>,
    },
    /// A spatial feature without geometry; no ids were consumed.
    SkippedInvalid,
}

/// Counters for one transformed dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub features_read: usize,
    pub features_emitted: usize,
    pub features_skipped: usize,
    pub rows_written: usize,
    pub first_resource: Option<ResourceId>,
    pub last_resource: Option<ResourceId>,
    /// Shape of the first geometry, for spatial datasets
    pub shape: Option<ShapeType>,
}

/// Expands features of one dataset according to a conflig.
#[derive(Debug, Clone)]
pub struct RecordTransformer<'a> {
    config: &'a Config,
    dataset: String,
    spatial: bool,
    relate_field: Option<&'a str>,
}

impl<'a> RecordTransformer<'a> {
    pub fn new(config: &'a Config, dataset: impl Into<String>, spatial: bool) -> Self {
        Self {
            config,
            dataset: dataset.into(),
            spatial,
            relate_field: None,
        }
    }

    /// Records each feature's value of `field` for relationship output.
    #[must_use]
    pub fn with_relate_field(mut self, field: Option<&'a str>) -> Self {
        self.relate_field = field;
        self
    }

    /// Expands the feature at 1-based position `number` of its source.
    ///
    /// Spatial features get a geometry row under its own group id. Each group
    /// then takes a group id, whether or not any of its fields has a value.
    /// Blank values are skipped; values of authority-backed entities are
    /// reconciled to concept ids.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnsupportedGeometryType`] for geometries other
    /// than points, lines and polygons, [`crate::error::OutputError::ReservedCharacter`]
    /// for values holding `|` or a line break, and any authority resolution failure.
    pub fn transform(
        &self,
        number: usize,
        feature: &FeatureRecord,
        ctx: &mut RunContext,
    ) -> Result<FeatureOutcome> {
        let geometry = if self.spatial {
            match feature.geometry.as_deref().map(str::trim) {
                Some(wkt) if !wkt.is_empty() => {
                    let shape = ShapeType::from_wkt(wkt).map_err(|e| match e {
                        SourceError::UnsupportedGeometryType { geometry_type, .. } => {
                            SourceError::UnsupportedGeometryType {
                                geometry_type,
                                feature: Some(number),
                            }
                        },
                        other => other,
                    })?;
                    Some((wkt, shape))
                },
                _ => {
                    warn!(
                        "Skipping feature {number} of '{}': it has no geometry",
                        self.dataset
                    );
                    return Ok(FeatureOutcome::SkippedInvalid);
                },
            }
        } else {
            None
        };

        let resource_type = &self.config.resource_type;
        let resource_id = ResourceId::new(
            self.dataset.clone(),
            ctx.sequencer.peek_resource_number(),
        );
        let mut rows = Vec::with_capacity(self.config.mapping_count() + 1);

        if let Some((wkt, _)) = geometry {
            check_value(wkt, self.config.geometry_entity(), &self.dataset)?;
            rows.push(AttributeRow {
                resource_id: resource_id.clone(),
                resource_type: resource_type.clone(),
                entity: self.config.geometry_entity().to_string(),
                value: wkt.to_string(),
                group_id: ctx.sequencer.next_group_id(),
            });
        }

        for group in &self.config.groups {
            let group_id = ctx.sequencer.next_group_id();
            for mapping in &group.mappings {
                let Some(raw) = feature.value(&mapping.field) else {
                    continue;
                };
                if raw.trim().is_empty() {
                    continue;
                }

                let value = ctx
                    .authority
                    .resolve(&mapping.entity, raw, &mapping.field, &self.dataset)?;
                check_value(&value, &mapping.field, &self.dataset)?;
                rows.push(AttributeRow {
                    resource_id: resource_id.clone(),
                    resource_type: resource_type.clone(),
                    entity: mapping.entity.clone(),
                    value,
                    group_id,
                });
            }
        }

        if let Some(key) = self.relate_field.and_then(|field| feature.value(field)) {
            ctx.relations.add(key, resource_id.clone());
        }

        ctx.sequencer.next_resource_id(&self.dataset);

        Ok(FeatureOutcome::Emitted {
            resource_id,
            shape: geometry.map(|(_, shape)| shape),
            rows,
        })
    }

    /// Streams every feature of `source` through [`Self::transform`] into `writer`.
    ///
    /// The rows of one feature are written together, geometry first.
    ///
    /// # Errors
    ///
    /// Returns the first source, resolution or write error; the run stops there.
    pub fn transform_all(
        &self,
        source: &mut dyn FeatureSource,
        ctx: &mut RunContext,
        writer: &mut ArchesWriter,
    ) -> Result<TransformStats> {
        let mut stats = TransformStats::default();

        for (index, feature) in source.features().enumerate() {
            let feature = feature?;
            stats.features_read += 1;

            match self.transform(index + 1, &feature, ctx)? {
                FeatureOutcome::Emitted {
                    resource_id,
                    shape,
                    rows,
                } => {
                    for row in &rows {
                        writer.write_row(row)?;
                    }
                    stats.rows_written += rows.len();
                    stats.features_emitted += 1;
                    if stats.shape.is_none() {
                        stats.shape = shape;
                    }
                    if stats.first_resource.is_none() {
                        stats.first_resource = Some(resource_id.clone());
                    }
                    stats.last_resource = Some(resource_id);
                },
                FeatureOutcome::SkippedInvalid => stats.features_skipped += 1,
            }
        }

        debug!(
            "Transformed '{}': {} features, {} rows, {} skipped",
            self.dataset, stats.features_emitted, stats.rows_written, stats.features_skipped
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::AuthorityPolicy;
    use crate::error::{ArchesEtlError, AuthorityError};
    use std::path::{Path, PathBuf};

    const CONFLIG: &str = r#"{
        "RESOURCE_TYPE": "HERITAGE_RESOURCE.E18",
        "FIELD_MAP": [
            { "Main": { "TYPE": "ENTITY.E55", "NAME": "ENTITY2" } },
            { "Notes": { "NOTE": "DESCRIPTION.E62" } }
        ]
    }"#;

    fn config() -> Config {
        Config::from_json_str(CONFLIG, Path::new("test.conflig")).unwrap()
    }

    /// Backs `ENTITY.E55` with `{"C1": "Barn"}` written to a temp dir.
    #[derive(Debug)]
    struct FixturePolicy {
        document: PathBuf,
    }

    impl AuthorityPolicy for FixturePolicy {
        fn name(&self) -> &'static str {
            "fixture"
        }

        fn authority_path_for(&self, entity: &str) -> Result<Option<PathBuf>> {
            Ok((entity == "ENTITY.E55").then(|| self.document.clone()))
        }
    }

    fn context(dir: &tempfile::TempDir) -> RunContext {
        let document = dir.path().join("ENTITY_AUTHORITY_DOCUMENT.csv");
        std::fs::write(
            &document,
            "conceptid,Preflabel,altlabels,ParentConceptid,ConceptType,Provider\nC1,Barn,,,,\n",
        )
        .unwrap();
        RunContext::new(
            Sequencer::fresh(),
            AuthorityCache::new(Box::new(FixturePolicy { document })),
        )
    }

    fn barn() -> FeatureRecord {
        FeatureRecord::from_pairs([("TYPE", "Barn"), ("NAME", "Old Barn"), ("NOTE", "")])
            .with_geometry("POINT (1 2)")
    }

    #[test]
    fn test_point_feature_expands_to_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", true);

        let FeatureOutcome::Emitted {
            resource_id,
            shape,
            rows,
        } = transformer.transform(1, &barn(), &mut ctx).unwrap()
        else {
            panic!("feature should be emitted");
        };

        assert_eq!(resource_id.to_string(), "barns-100000");
        assert_eq!(shape, Some(ShapeType::Point));
        let lines: Vec<String> = rows.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "barns-100000|HERITAGE_RESOURCE.E18|SPATIAL_COORDINATES_GEOMETRY.E47|POINT (1 2)|300000",
                "barns-100000|HERITAGE_RESOURCE.E18|ENTITY.E55|C1|300001",
                "barns-100000|HERITAGE_RESOURCE.E18|ENTITY2|Old Barn|300001",
            ]
        );

        // The empty "Notes" group still took 300002.
        assert_eq!(ctx.sequencer.peek_group_id(), 300_003);
        assert_eq!(ctx.sequencer.peek_resource_number(), 100_001);
    }

    #[test]
    fn test_non_spatial_feature_has_no_geometry_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", false);

        let feature = FeatureRecord::from_pairs([("TYPE", "C1"), ("NOTE", "timber")]);
        let FeatureOutcome::Emitted { rows, .. } = transformer.transform(1, &feature, &mut ctx).unwrap()
        else {
            panic!("feature should be emitted");
        };

        let summary: Vec<(&str, &str, u64)> = rows
            .iter()
            .map(|r| (r.entity.as_str(), r.value.as_str(), r.group_id))
            .collect();
        assert_eq!(
            summary,
            vec![("ENTITY.E55", "C1", 300_000), ("DESCRIPTION.E62", "timber", 300_001)]
        );
    }

    #[test]
    fn test_missing_geometry_is_skipped_without_consuming_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", true);

        let feature = FeatureRecord::from_pairs([("NAME", "Nowhere")]);
        assert_eq!(
            transformer.transform(1, &feature, &mut ctx).unwrap(),
            FeatureOutcome::SkippedInvalid
        );
        assert_eq!(ctx.sequencer, Sequencer::fresh());
    }

    #[test]
    fn test_unsupported_geometry_names_feature() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", true);

        let feature = FeatureRecord::from_pairs([("NAME", "Cluster")]).with_geometry("MULTIPOINT ((1 2), (3 4))");
        match transformer.transform(7, &feature, &mut ctx).unwrap_err() {
            ArchesEtlError::Source(SourceError::UnsupportedGeometryType {
                geometry_type,
                feature,
            }) => {
                assert_eq!(geometry_type, "MULTIPOINT");
                assert_eq!(feature, Some(7));
            },
            other => panic!("Expected UnsupportedGeometryType, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_value_aborts() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", false);

        let feature = FeatureRecord::from_pairs([("TYPE", "Shed")]);
        let err = transformer.transform(1, &feature, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            ArchesEtlError::Authority(AuthorityError::UnresolvedValue { .. })
        ));
    }

    #[test]
    fn test_relate_field_collects_ids() {
        let mut ctx = RunContext::default();
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", false).with_relate_field(Some("SITE"));

        for site in ["S1", "S1", " ", "S2"] {
            let feature = FeatureRecord::from_pairs([("NAME", "x"), ("SITE", site)]);
            transformer.transform(1, &feature, &mut ctx).unwrap();
        }

        let ids: Vec<u64> = ctx.relations.ids("S1").iter().map(ResourceId::number).collect();
        assert_eq!(ids, vec![100_000, 100_001]);
        assert_eq!(ctx.relations.len(), 2);
    }

    #[test]
    fn test_transform_all_numbers_features_from_one() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("barns.csv");
        std::fs::write(
            &path,
            r#"NAME,WKT
Old Barn,POINT (1 2)
Cluster,"MULTIPOINT ((1 2), (3 4))"
"#,
        )
        .unwrap();
        let mut source =
            features_csv::CsvFeatureSource::open(&path, &features_csv::CsvSourceOptions::default()).unwrap();
        let mut writer = ArchesWriter::create(&dir.path().join("barns.arches")).unwrap();

        let mut ctx = RunContext::default();
        let config = config();
        let transformer = RecordTransformer::new(&config, "barns", true);
        match transformer.transform_all(&mut source, &mut ctx, &mut writer) {
            Err(ArchesEtlError::Source(SourceError::UnsupportedGeometryType { feature, .. })) => {
                assert_eq!(feature, Some(2));
            },
            other => panic!("Expected UnsupportedGeometryType, got {other:?}"),
        }
    }
}
