//! Custom error types for `ArchesETL` operations.
//!
//! Every error in this module is fatal: an export run stops at the first one
//! and nothing is coerced or skipped. Errors carry the dataset, field, value and
//! candidate lists needed to fix the source data.

use std::path::PathBuf;

use archesetl_core_common::SourceError;
use thiserror::Error;

use crate::authority::Concept;

/// Main error type for `ArchesETL` operations.
///
/// This is the root error type that encompasses all domain-specific errors.
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum ArchesEtlError {
    /// Conflig document and field validation errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Authority document loading and value reconciliation errors
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Resource/group id sequence errors
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// Feature source errors (parsing, unsupported geometry)
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Driver lookup errors
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Values that cannot be written to the delimited output
    #[error(transparent)]
    Output(#[from] OutputError),

    /// I/O errors on output, config and state files
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Conflig and field validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The conflig document is not valid JSON or lacks required keys
    #[error("Failed to parse conflig '{path}': {message}")]
    Parse {
        /// The conflig path
        path: PathBuf,
        /// Description of the problem
        message: String,
    },

    /// A field named in the conflig does not exist in the dataset
    #[error("Invalid field name in conflig file: '{field}' is not a field of dataset '{dataset}'")]
    MissingField {
        /// The missing field
        field: String,
        /// The dataset name
        dataset: String,
    },

    /// The relationship join field does not exist in the dataset
    #[error("Relationship field '{field}' is not a field of dataset '{dataset}'")]
    RelationshipFieldMissing {
        /// The join field
        field: String,
        /// The dataset name
        dataset: String,
    },

    /// Refusing to overwrite an existing file
    #[error("'{path}' already exists")]
    AlreadyExists {
        /// The existing file
        path: PathBuf,
    },

    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },
}

/// Authority document errors.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// An authority document (or the entity index) could not be loaded
    #[error("Authority document not found: '{path}'{}: {reason}", .entity.as_ref().map(|e| format!(" (entity {e})")).unwrap_or_default())]
    DocumentNotFound {
        /// The document path
        path: PathBuf,
        /// The entity that needed the document, when known
        entity: Option<String>,
        /// Why the document could not be used
        reason: String,
    },

    /// The entity index names documents that do not exist
    #[error("The authority documents listed below are used in '{index}', but do not exist in the authority document directory:\n{}", format_paths(.missing))]
    IndexIncomplete {
        /// The index file
        index: PathBuf,
        /// Documents named by the index but missing on disk
        missing: Vec<PathBuf>,
    },

    /// More than one concept carries the label being resolved
    #[error("There are two or more corresponding concept ids for the Preflabel '{value}': {}\n  authority document contents:\n{}", .matching.join(", "), format_candidates(.candidates))]
    AmbiguousLabel {
        /// The raw value
        value: String,
        /// Codes whose label matches the value
        matching: Vec<String>,
        /// Full authority document contents
        candidates: Vec<Concept>,
    },

    /// The value is neither a concept id nor a preferred label
    #[error("The value '{value}' can not be reconciled with the Preflabels or conceptids available for this entity\n  dataset: {dataset}\n  field: {field}\n  authority document contents:\n{}", format_candidates(.candidates))]
    UnresolvedValue {
        /// The raw value
        value: String,
        /// The source field
        field: String,
        /// The dataset name
        dataset: String,
        /// Full authority document contents
        candidates: Vec<Concept>,
    },
}

/// Resource/group id sequence errors.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The trailing row of an existing export does not end in numeric ids
    #[error("Cannot resume ids from '{path}' line {line}: '{value}' is not numeric")]
    Corrupt {
        /// The export file
        path: PathBuf,
        /// 1-based line number of the trailing row
        line: usize,
        /// The offending value
        value: String,
    },

    /// The persisted sequence state could not be read
    #[error("Invalid sequence state '{path}': {message}")]
    InvalidState {
        /// The state file
        path: PathBuf,
        /// Description of the problem
        message: String,
    },
}

/// Errors writing attribute rows.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A value holds the column delimiter or a line break
    #[error("The value {value:?} of field '{field}' in dataset '{dataset}' contains '|' or a line break, which cannot be written to an .arches file")]
    ReservedCharacter {
        /// The offending value
        value: String,
        /// The source field
        field: String,
        /// The dataset name
        dataset: String,
    },
}

/// Driver-related errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Driver was not found in the registry
    #[error("Driver '{name}' not found. Available drivers: {available}")]
    NotFound {
        /// The requested driver name
        name: String,
        /// Comma-separated list of available drivers
        available: String,
    },

    /// Driver cannot read features
    #[error("Driver '{driver}' does not support reading")]
    ReadNotSupported {
        /// The driver name
        driver: String,
    },

    /// No driver claims the file extension
    #[error("No driver found for '{path}'")]
    UnknownExtension {
        /// The dataset path
        path: PathBuf,
    },
}

/// I/O related errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file
    #[error("Failed to read {what} '{path}': {source}")]
    Read {
        /// What was being read (e.g., "conflig", "export")
        what: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file
    #[error("Failed to write {what} '{path}': {source}")]
    Write {
        /// What was being written
        what: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },
}

/// Type alias for Results using `ArchesEtlError`.
pub type Result<T> = std::result::Result<T, ArchesEtlError>;

fn format_candidates(candidates: &[Concept]) -> String {
    if candidates.is_empty() {
        return "      (empty)".to_string();
    }
    candidates
        .iter()
        .map(|c| format!("      {} | {}", c.code, c.label))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("    {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ArchesEtlError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(e) => format!("Conflig error: {e}"),
            Self::Authority(e) => format!("Authority error: {e}"),
            Self::Sequence(e) => format!("Sequence error: {e}"),
            Self::Source(e) => format!("Source error: {e}"),
            Self::Output(e) => format!("Output error: {e}"),
            Self::Driver(e) => e.to_string(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.recovery_suggestion(),
            Self::Authority(e) => e.recovery_suggestion(),
            Self::Sequence(_) => Some(
                "Remove the .seq.json state file or start a new export without --append."
                    .to_string(),
            ),
            Self::Output(OutputError::ReservedCharacter { .. }) => Some(
                "Remove '|' and line breaks from the value in the original dataset.".to_string(),
            ),
            Self::Source(SourceError::UnsupportedGeometryType { .. }) => {
                Some("Only point, line and polygon datasets can be exported.".to_string())
            },
            Self::Driver(DriverError::NotFound { .. } | DriverError::UnknownExtension { .. }) => {
                Some("Run 'archesetl drivers' to see all available drivers.".to_string())
            },
            Self::Io(IoError::FileNotFound { .. }) => {
                Some("Check that the file path is correct and the file exists.".to_string())
            },
            _ => None,
        }
    }
}

impl ConfigError {
    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Parse { .. } => Some(
                "A conflig needs RESOURCE_TYPE and a FIELD_MAP list of {\"Group\": {\"field\": \"ENTITY\"}} objects."
                    .to_string(),
            ),
            Self::MissingField { .. } | Self::RelationshipFieldMissing { .. } => {
                Some("Field names are case-sensitive; compare the conflig against the dataset fields.".to_string())
            },
            Self::AlreadyExists { .. } => Some("Pass --force to overwrite it.".to_string()),
            Self::InvalidOption { .. } => None,
        }
    }
}

impl AuthorityError {
    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::DocumentNotFound { .. } | Self::IndexIncomplete { .. } => Some(
                "Check the authority document directory and the --authority-policy setting."
                    .to_string(),
            ),
            Self::AmbiguousLabel { .. } => Some(
                "Find the correct conceptid and apply it to the original dataset.".to_string(),
            ),
            Self::UnresolvedValue { .. } => Some(
                "Double-check your original data and conflig files before trying again."
                    .to_string(),
            ),
        }
    }
}

/// Extension trait for adding I/O context to errors.
///
/// This trait provides convenient methods to wrap errors with file context,
/// creating more informative error messages.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_read_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            ArchesEtlError::Io(IoError::Read {
                what: what.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }

    fn with_write_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            ArchesEtlError::Io(IoError::Write {
                what: what.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

/// Helper to create `DriverError::NotFound` with available drivers.
#[must_use]
pub fn driver_not_found(name: &str) -> DriverError {
    use crate::drivers::get_driver_names;

    let available = get_driver_names().join(", ");
    DriverError::NotFound {
        name: name.to_string(),
        available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_value_lists_candidates() {
        let err = AuthorityError::UnresolvedValue {
            value: "Shed".to_string(),
            field: "TYPE".to_string(),
            dataset: "barns".to_string(),
            candidates: vec![Concept::new("C1", "Barn"), Concept::new("C2", "Silo")],
        };
        let message = err.to_string();
        assert!(message.contains("'Shed'"));
        assert!(message.contains("dataset: barns"));
        assert!(message.contains("field: TYPE"));
        assert!(message.contains("C1 | Barn"));
        assert!(message.contains("C2 | Silo"));
    }

    #[test]
    fn test_document_not_found_mentions_entity() {
        let err = AuthorityError::DocumentNotFound {
            path: PathBuf::from("/auth/HERITAGE_TYPE_AUTHORITY_DOCUMENT.csv"),
            entity: Some("HERITAGE_TYPE.E55".to_string()),
            reason: "No such file".to_string(),
        };
        assert!(err.to_string().contains("(entity HERITAGE_TYPE.E55)"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err: ArchesEtlError = ConfigError::MissingField {
            field: "TYPE".to_string(),
            dataset: "barns".to_string(),
        }
        .into();
        assert!(err.recovery_suggestion().is_some());
        assert!(err.user_message().starts_with("Conflig error:"));

        let err: ArchesEtlError = driver_not_found("Nope").into();
        assert!(err.to_string().contains("Available drivers:"));
        assert!(err.recovery_suggestion().unwrap().contains("archesetl drivers"));
    }

    #[test]
    fn test_reserved_character_names_field() {
        let err: ArchesEtlError = OutputError::ReservedCharacter {
            value: "two\nlines".to_string(),
            field: "NAME".to_string(),
            dataset: "barns".to_string(),
        }
        .into();
        let message = err.user_message();
        assert!(message.starts_with("Output error:"));
        assert!(message.contains("\"two\\nlines\""));
        assert!(message.contains("field 'NAME' in dataset 'barns'"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_io_error_ext() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("disk full"));
        let err = result.with_write_context("export", "/tmp/out.arches").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to write export '/tmp/out.arches': disk full"
        );
    }
}
