//! Path and argument helpers shared by the operations and the CLI.

use std::path::{Path, PathBuf};

use archesetl_core_common::dataset_name;

use crate::error::{ConfigError, Result};
use crate::sequence::SequenceState;

/// Extension of conflig documents.
pub const CONFLIG_EXTENSION: &str = "conflig";

/// Extension of attribute exports.
pub const ARCHES_EXTENSION: &str = "arches";

/// Extension of relationship exports.
pub const RELATIONS_EXTENSION: &str = "relations";

/// Files written by one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub arches: PathBuf,
    pub relations: PathBuf,
    pub state: PathBuf,
}

impl OutputPaths {
    /// Derives the run's files.
    ///
    /// An explicit `output` wins; its `.relations` companion shares its stem.
    /// Otherwise both files are named after `first_dataset` inside `out_dir`,
    /// or next to the dataset when there is no `out_dir`.
    #[must_use]
    pub fn resolve(out_dir: Option<&Path>, output: Option<&Path>, first_dataset: &Path) -> Self {
        let arches = match (output, out_dir) {
            (Some(output), _) => output.to_path_buf(),
            (None, Some(dir)) => dir.join(format!("{}.{ARCHES_EXTENSION}", dataset_name(first_dataset))),
            (None, None) => first_dataset.with_extension(ARCHES_EXTENSION),
        };
        let relations = arches.with_extension(RELATIONS_EXTENSION);
        let state = SequenceState::path_for(&arches);
        Self {
            arches,
            relations,
            state,
        }
    }
}

/// Conflig expected next to a dataset: `<dir>/<stem>.conflig`.
#[must_use]
pub fn sibling_config_path(dataset: &Path) -> PathBuf {
    dataset.with_extension(CONFLIG_EXTENSION)
}

/// Conflig created by `init` for `dataset` inside `out_dir`.
#[must_use]
pub fn config_path_in(out_dir: &Path, dataset: &Path) -> PathBuf {
    out_dir.join(format!("{}.{CONFLIG_EXTENSION}", dataset_name(dataset)))
}

/// Parses a `FIELD=ENTITY` mapping argument.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] when there is no `=` or the entity is
/// empty. An empty field is accepted; such entries are dropped when the group
/// is added.
pub fn parse_mapping_entry(entry: &str) -> Result<(String, String)> {
    let invalid = |message: &str| ConfigError::InvalidOption {
        option: "mapping entry".to_string(),
        message: format!("'{entry}': {message}"),
    };

    let (field, entity) = entry
        .split_once('=')
        .ok_or_else(|| invalid("expected FIELD=ENTITY"))?;
    let entity = entity.trim();
    if entity.is_empty() {
        return Err(invalid("entity code is empty").into());
    }
    Ok((field.trim().to_string(), entity.to_string()))
}

/// Spreads per-dataset options given once or once per dataset.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] when `values` has neither one nor
/// `count` entries.
pub fn per_dataset<T: Clone>(option: &str, values: &[T], count: usize) -> Result<Vec<Option<T>>> {
    match values.len() {
        0 => Ok(vec![None; count]),
        1 => Ok(vec![Some(values[0].clone()); count]),
        n if n == count => Ok(values.iter().cloned().map(Some).collect()),
        n => Err(ConfigError::InvalidOption {
            option: option.to_string(),
            message: format!("given {n} times for {count} datasets; give it once or once per dataset"),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_in_out_dir() {
        let paths = OutputPaths::resolve(Some(Path::new("out")), None, Path::new("data/barns.csv"));
        assert_eq!(paths.arches, Path::new("out/barns.arches"));
        assert_eq!(paths.relations, Path::new("out/barns.relations"));
        assert_eq!(paths.state, Path::new("out/barns.arches.seq.json"));
    }

    #[test]
    fn test_output_paths_explicit_output() {
        let paths = OutputPaths::resolve(
            Some(Path::new("ignored")),
            Some(Path::new("exports/all.arches")),
            Path::new("data/barns.csv"),
        );
        assert_eq!(paths.arches, Path::new("exports/all.arches"));
        assert_eq!(paths.relations, Path::new("exports/all.relations"));
    }

    #[test]
    fn test_output_paths_next_to_dataset() {
        let paths = OutputPaths::resolve(None, None, Path::new("data/barns.geojson"));
        assert_eq!(paths.arches, Path::new("data/barns.arches"));
    }

    #[test]
    fn test_config_paths() {
        assert_eq!(
            sibling_config_path(Path::new("data/barns.csv")),
            Path::new("data/barns.conflig")
        );
        assert_eq!(
            config_path_in(Path::new("configs"), Path::new("data/barns.csv")),
            Path::new("configs/barns.conflig")
        );
    }

    #[test]
    fn test_parse_mapping_entry() {
        assert_eq!(
            parse_mapping_entry("NAME = NAME.E41").unwrap(),
            ("NAME".to_string(), "NAME.E41".to_string())
        );
        assert_eq!(
            parse_mapping_entry("=NAME.E41").unwrap(),
            (String::new(), "NAME.E41".to_string())
        );
        assert!(parse_mapping_entry("NAME").is_err());
        assert!(parse_mapping_entry("NAME=").is_err());
    }

    #[test]
    fn test_per_dataset() {
        assert_eq!(per_dataset::<String>("config", &[], 2).unwrap(), vec![None, None]);
        assert_eq!(
            per_dataset("config", &["a"], 2).unwrap(),
            vec![Some("a"), Some("a")]
        );
        assert_eq!(
            per_dataset("config", &["a", "b"], 2).unwrap(),
            vec![Some("a"), Some("b")]
        );
        assert!(per_dataset("config", &["a", "b"], 3).is_err());
    }
}
