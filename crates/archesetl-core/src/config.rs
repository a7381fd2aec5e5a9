//! Conflig documents.
//!
//! A conflig maps dataset fields to Arches entity codes:
//!
//! ```json
//! {
//!     "RESOURCE_TYPE": "HERITAGE_RESOURCE.E18",
//!     "FIELD_MAP": [
//!         { "NameGroup": { "NAME": "NAME.E41", "NAME_TYPE": "NAME_TYPE.E55" } },
//!         { "TypeGroup": { "TYPE": "HERITAGE_TYPE.E55" } }
//!     ]
//! }
//! ```
//!
//! Group order and field order inside a group are kept as declared; they decide
//! which group id each row receives.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::error::{ConfigError, IoError, IoErrorExt, Result};

/// Entity code of the geometry row when the conflig has no `GEOM_TYPE`.
pub const DEFAULT_GEOMETRY_ENTITY: &str = "SPATIAL_COORDINATES_GEOMETRY.E47";

/// One source field → entity code pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field: String,
    pub entity: String,
}

impl FieldMapping {
    pub fn new(field: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            entity: entity.into(),
        }
    }
}

/// Field mappings written together under one group id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingGroup {
    pub name: String,
    pub mappings: Vec<FieldMapping>,
}

/// Parsed conflig document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Value of the `RESOURCETYPE` column
    pub resource_type: String,
    /// Mapping groups in declaration order
    pub groups: Vec<MappingGroup>,
    /// Dataset the conflig was written for (informational)
    pub dataset_path: Option<String>,
    /// Entity code of the geometry row
    pub geometry_entity: Option<String>,
}

/// On-disk layout of a conflig.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "DATASET_PATH", default, skip_serializing_if = "Option::is_none")]
    dataset_path: Option<String>,
    #[serde(rename = "RESOURCE_TYPE")]
    resource_type: String,
    #[serde(rename = "GEOM_TYPE", default, skip_serializing_if = "Option::is_none")]
    geom_type: Option<String>,
    #[serde(rename = "FIELD_MAP")]
    field_map: Vec<Map<String, Value>>,
}

impl Config {
    /// Reads and parses the conflig at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] if there is no file at `path`, or
    /// [`ConfigError::Parse`] if it is not a valid conflig.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IoError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let text = fs::read_to_string(path).with_read_context("conflig", path)?;
        let config = Self::from_json_str(&text, path)?;
        debug!(
            "Loaded conflig {} ({} groups, {} mappings)",
            path.display(),
            config.groups.len(),
            config.mapping_count()
        );
        Ok(config)
    }

    /// Parses conflig text; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not JSON, lacks
    /// `RESOURCE_TYPE` or `FIELD_MAP`, or a group is not an object of strings.
    pub fn from_json_str(text: &str, path: &Path) -> Result<Self> {
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let document: ConfigDocument =
            serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| parse_error(e.to_string()))?;

        let mut groups = Vec::new();
        for (position, entry) in document.field_map.into_iter().enumerate() {
            for (name, fields) in entry {
                let Value::Object(fields) = fields else {
                    return Err(parse_error(format!(
                        "FIELD_MAP entry {} group '{name}' must be an object of field names to entity codes",
                        position + 1
                    ))
                    .into());
                };

                let mut mappings = Vec::with_capacity(fields.len());
                for (field, entity) in fields {
                    let Value::String(entity) = entity else {
                        return Err(parse_error(format!(
                            "entity code of field '{field}' in group '{name}' must be a string"
                        ))
                        .into());
                    };
                    mappings.push(FieldMapping { field, entity });
                }
                groups.push(MappingGroup { name, mappings });
            }
        }

        Ok(Self {
            resource_type: document.resource_type,
            groups,
            dataset_path: document.dataset_path,
            geometry_entity: document.geom_type,
        })
    }

    /// Starter conflig for a dataset, with an empty field map.
    pub fn template(dataset_path: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            groups: Vec::new(),
            dataset_path: Some(dataset_path.into()),
            geometry_entity: Some(DEFAULT_GEOMETRY_ENTITY.to_string()),
        }
    }

    /// Entity code used for geometry rows.
    #[must_use]
    pub fn geometry_entity(&self) -> &str {
        self.geometry_entity.as_deref().unwrap_or(DEFAULT_GEOMETRY_ENTITY)
    }

    /// Total number of field mappings across all groups.
    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.groups.iter().map(|g| g.mappings.len()).sum()
    }

    /// Source fields referenced by any group, first occurrence first.
    #[must_use]
    pub fn required_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for mapping in self.groups.iter().flat_map(|g| &g.mappings) {
            if !fields.contains(&mapping.field.as_str()) {
                fields.push(&mapping.field);
            }
        }
        fields
    }

    /// Checks every required field exists in `available`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for the first required field, in
    /// declaration order, that the dataset lacks.
    pub fn validate_against(&self, available: &[String], dataset: &str) -> Result<()> {
        match self
            .required_fields()
            .into_iter()
            .find(|field| !available.iter().any(|a| a.as_str() == *field))
        {
            Some(field) => Err(ConfigError::MissingField {
                field: field.to_string(),
                dataset: dataset.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Appends a group named `Group<n>` where `n` is the new group count.
    ///
    /// Entries with an empty field name are dropped.
    pub fn add_group<I, F, E>(&mut self, entries: I) -> &MappingGroup
    where
        I: IntoIterator<Item = (F, E)>,
        F: Into<String>,
        E: Into<String>,
    {
        let mappings = entries
            .into_iter()
            .map(|(field, entity)| FieldMapping::new(field, entity))
            .filter(|m| !m.field.trim().is_empty())
            .collect();

        let name = format!("Group{}", self.groups.len() + 1);
        self.groups.push(MappingGroup { name, mappings });
        &self.groups[self.groups.len() - 1]
    }

    /// Renders the conflig as JSON indented by four spaces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        let document = ConfigDocument {
            dataset_path: self.dataset_path.clone(),
            resource_type: self.resource_type.clone(),
            geom_type: self.geometry_entity.clone(),
            field_map: self
                .groups
                .iter()
                .map(|group| {
                    let fields: Map<String, Value> = group
                        .mappings
                        .iter()
                        .map(|m| (m.field.clone(), Value::String(m.entity.clone())))
                        .collect();
                    let mut entry = Map::new();
                    entry.insert(group.name.clone(), Value::Object(fields));
                    entry
                })
                .collect(),
        };

        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        document.serialize(&mut serializer).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        // serde_json only emits UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes the conflig to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = self.to_json_string()?;
        text.push('\n');
        fs::write(path, text).with_write_context("conflig", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchesEtlError;
    use tempfile::TempDir;

    const CONFLIG: &str = r#"{
        "RESOURCE_TYPE": "HERITAGE_RESOURCE.E18",
        "FIELD_MAP": [
            { "NameGroup": { "NAME": "NAME.E41", "NAME_TYPE": "NAME_TYPE.E55" } },
            { "TypeGroup": { "TYPE": "HERITAGE_TYPE.E55" }, "Extra": { "NAME": "DESCRIPTION.E62" } }
        ]
    }"#;

    fn parse(text: &str) -> Result<Config> {
        Config::from_json_str(text, Path::new("sites.conflig"))
    }

    #[test]
    fn test_parse_preserves_declaration_order() {
        let config = parse(CONFLIG).unwrap();
        assert_eq!(config.resource_type, "HERITAGE_RESOURCE.E18");

        let names: Vec<&str> = config.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["NameGroup", "TypeGroup", "Extra"]);
        assert_eq!(
            config.groups[0].mappings,
            vec![
                FieldMapping::new("NAME", "NAME.E41"),
                FieldMapping::new("NAME_TYPE", "NAME_TYPE.E55"),
            ]
        );
        assert_eq!(config.mapping_count(), 4);
        assert_eq!(config.geometry_entity(), DEFAULT_GEOMETRY_ENTITY);
    }

    #[test]
    fn test_required_fields_are_unique() {
        let config = parse(CONFLIG).unwrap();
        assert_eq!(config.required_fields(), vec!["NAME", "NAME_TYPE", "TYPE"]);
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let config = parse(CONFLIG).unwrap();
        let available = vec!["NAME".to_string()];

        match config.validate_against(&available, "sites").unwrap_err() {
            ArchesEtlError::Config(ConfigError::MissingField { field, dataset }) => {
                assert_eq!(field, "NAME_TYPE");
                assert_eq!(dataset, "sites");
            },
            other => panic!("Expected MissingField, got {other:?}"),
        }

        let available: Vec<String> = ["TYPE", "NAME_TYPE", "NAME", "OTHER"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert!(config.validate_against(&available, "sites").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        for text in [
            "not json",
            r#"{"FIELD_MAP": []}"#,
            r#"{"RESOURCE_TYPE": "X"}"#,
            r#"{"RESOURCE_TYPE": "X", "FIELD_MAP": [{"G": "NAME"}]}"#,
            r#"{"RESOURCE_TYPE": "X", "FIELD_MAP": [{"G": {"NAME": 3}}]}"#,
        ] {
            assert!(
                matches!(parse(text), Err(ArchesEtlError::Config(ConfigError::Parse { .. }))),
                "{text} should not parse"
            );
        }
    }

    #[test]
    fn test_geom_type_override() {
        let config = parse(r#"{"RESOURCE_TYPE": "X", "GEOM_TYPE": "GEOM.E47", "FIELD_MAP": []}"#).unwrap();
        assert_eq!(config.geometry_entity(), "GEOM.E47");
        assert!(config.groups.is_empty());
    }

    #[test]
    fn test_add_group_numbers_and_filters() {
        let mut config = Config::template("data/sites.csv", "HERITAGE_RESOURCE.E18");
        config.add_group([("NAME", "NAME.E41"), ("", "IGNORED.E1")]);
        let group = config.add_group([("TYPE", "HERITAGE_TYPE.E55")]);
        assert_eq!(group.name, "Group2");

        assert_eq!(config.groups[0].name, "Group1");
        assert_eq!(config.groups[0].mappings, vec![FieldMapping::new("NAME", "NAME.E41")]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sites.conflig");

        let mut config = Config::template("data/sites.csv", "HERITAGE_RESOURCE.E18");
        config.add_group([("NAME", "NAME.E41"), ("TYPE", "HERITAGE_TYPE.E55")]);
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"DATASET_PATH\": \"data/sites.csv\",\n    \"RESOURCE_TYPE\""));
        assert!(text.find("GEOM_TYPE").unwrap() < text.find("FIELD_MAP").unwrap());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/sites.conflig")).unwrap_err();
        assert!(matches!(err, ArchesEtlError::Io(IoError::FileNotFound { .. })));
    }
}
