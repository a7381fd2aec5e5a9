//! Controlled vocabulary lookup.
//!
//! Authority documents are six-column CSV files
//! (`conceptid, Preflabel, altlabels, ParentConceptid, ConceptType, Provider`)
//! with a header row. Values mapped to an authority-backed entity are reconciled
//! to a concept id before they are written.
//!
//! Which entities are authority-backed is decided by an [`AuthorityPolicy`]:
//!
//! - [`IndexPolicy`] reads the `ENTITY_TYPE_X_ADOC.csv` index in the authority
//!   directory (the default).
//! - [`SuffixPolicy`] treats every `.E55` entity as backed by
//!   `<ENTITY>_AUTHORITY_DOCUMENT.csv`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::ReaderBuilder;
use log::{debug, info};

use crate::error::{AuthorityError, ConfigError, Result};

/// Name of the entity → authority document index file.
pub const INDEX_FILE_NAME: &str = "ENTITY_TYPE_X_ADOC.csv";

/// Entity code marker used by [`SuffixPolicy`].
pub const TYPE_ENTITY_MARKER: &str = ".E55";

/// File name suffix of authority documents located by [`SuffixPolicy`].
pub const AUTHORITY_DOCUMENT_SUFFIX: &str = "_AUTHORITY_DOCUMENT.csv";

/// One concept of an authority document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    /// Concept id
    pub code: String,
    /// Preferred label
    pub label: String,
}

impl Concept {
    /// Creates a concept.
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

/// Concept id → preferred label table of one authority document.
#[derive(Debug, Clone, Default)]
pub struct AuthorityTable {
    labels: BTreeMap<String, String>,
}

impl AuthorityTable {
    /// Loads an authority document, skipping its header row.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::DocumentNotFound`] if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_for(path, None)
    }

    fn load_for(path: &Path, entity: Option<&str>) -> Result<Self> {
        let not_found = |reason: String| AuthorityError::DocumentNotFound {
            path: path.to_path_buf(),
            entity: entity.map(str::to_string),
            reason,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| not_found(e.to_string()))?;

        let mut labels = BTreeMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| not_found(e.to_string()))?;
            let code = record.get(0).unwrap_or_default().trim();
            if code.is_empty() {
                continue;
            }
            let label = record.get(1).unwrap_or_default();
            labels.insert(code.to_string(), label.to_string());
        }

        debug!("Loaded {} concepts from {}", labels.len(), path.display());
        Ok(Self { labels })
    }

    /// Builds a table from concepts; later duplicates of a code replace earlier ones.
    pub fn from_concepts(concepts: impl IntoIterator<Item = Concept>) -> Self {
        Self {
            labels: concepts.into_iter().map(|c| (c.code, c.label)).collect(),
        }
    }

    /// Number of concepts in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` when the table has no concepts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Preferred label of `code`.
    #[must_use]
    pub fn label(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    /// All concepts, ordered by the numeric suffix of their id.
    #[must_use]
    pub fn candidates(&self) -> Vec<Concept> {
        let mut concepts: Vec<Concept> = self
            .labels
            .iter()
            .map(|(code, label)| Concept::new(code.clone(), label.clone()))
            .collect();
        concepts.sort_by(|a, b| concept_order(&a.code).cmp(&concept_order(&b.code)));
        concepts
    }

    /// Reconciles a raw value to a concept id.
    ///
    /// Precedence is fixed: an ambiguous label fails first, then a value that
    /// already is a concept id is returned as-is, then a unique label match
    /// returns its id. Labels are compared with trailing whitespace removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::AmbiguousLabel`] when several concepts share the
    /// label and [`AuthorityError::UnresolvedValue`] when nothing matches.
    pub fn resolve(&self, raw: &str, field: &str, dataset: &str) -> Result<String> {
        let wanted = raw.trim_end();
        let matching: Vec<&String> = self
            .labels
            .iter()
            .filter(|(_, label)| label.trim_end() == wanted)
            .map(|(code, _)| code)
            .collect();

        if matching.len() > 1 {
            let mut matching: Vec<String> = matching.into_iter().cloned().collect();
            matching.sort_by(|a, b| concept_order(a).cmp(&concept_order(b)));
            return Err(AuthorityError::AmbiguousLabel {
                value: raw.to_string(),
                matching,
                candidates: self.candidates(),
            }
            .into());
        }

        if self.labels.contains_key(raw) {
            return Ok(raw.to_string());
        }

        if let Some(code) = matching.first() {
            return Ok((*code).clone());
        }

        Err(AuthorityError::UnresolvedValue {
            value: raw.to_string(),
            field: field.to_string(),
            dataset: dataset.to_string(),
            candidates: self.candidates(),
        }
        .into())
    }
}

/// Sort key for concept ids like `HERITAGE_TYPE:12`: numeric suffix first.
fn concept_order(code: &str) -> (bool, u64, &str) {
    match code.rsplit(':').next().and_then(|n| n.trim().parse::<u64>().ok()) {
        Some(n) => (false, n, code),
        None => (true, 0, code),
    }
}

/// Strategy deciding whether an entity is authority-backed, and by which document.
pub trait AuthorityPolicy: fmt::Debug {
    /// Short name of the policy, for logging.
    fn name(&self) -> &'static str;

    /// Path of the authority document for `entity`, or `None` when the entity
    /// takes free values.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::DocumentNotFound`] when the entity needs a
    /// document that does not exist.
    fn authority_path_for(&self, entity: &str) -> Result<Option<PathBuf>>;
}

/// Policy backed by the `ENTITY_TYPE_X_ADOC.csv` index file.
///
/// The index has the columns `entitytype, authoritydoc,
/// authoritydocconceptschemename`; document names are relative to the
/// directory holding the index.
#[derive(Debug, Clone)]
pub struct IndexPolicy {
    index: PathBuf,
    documents: HashMap<String, PathBuf>,
}

impl IndexPolicy {
    /// Reads the index in `directory` and checks every document it names exists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::DocumentNotFound`] when the index is missing or
    /// malformed and [`AuthorityError::IndexIncomplete`] listing every named
    /// document that does not exist.
    pub fn open(directory: &Path) -> Result<Self> {
        let index = directory.join(INDEX_FILE_NAME);
        let not_found = |reason: String| AuthorityError::DocumentNotFound {
            path: index.clone(),
            entity: None,
            reason,
        };

        if !index.is_file() {
            return Err(not_found(format!(
                "{INDEX_FILE_NAME} must be present in the authority document directory"
            ))
            .into());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&index)
            .map_err(|e| not_found(e.to_string()))?;

        let mut documents = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| not_found(e.to_string()))?;
            let entity = record.get(0).unwrap_or_default().trim();
            let document = record.get(1).unwrap_or_default().trim();
            if entity.is_empty() || document.is_empty() {
                continue;
            }
            documents.insert(entity.to_string(), directory.join(document));
        }

        let missing: BTreeSet<PathBuf> = documents
            .values()
            .filter(|path| !path.is_file())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(AuthorityError::IndexIncomplete {
                index,
                missing: missing.into_iter().collect(),
            }
            .into());
        }

        info!(
            "Authority index {} maps {} entities",
            index.display(),
            documents.len()
        );
        Ok(Self { index, documents })
    }

    /// Number of authority-backed entities in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` when the index names no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl AuthorityPolicy for IndexPolicy {
    fn name(&self) -> &'static str {
        "index"
    }

    fn authority_path_for(&self, entity: &str) -> Result<Option<PathBuf>> {
        Ok(self.documents.get(entity).cloned())
    }
}

/// Policy treating every entity containing `.E55` as authority-backed.
///
/// `HERITAGE_TYPE.E55` is looked up in `HERITAGE_TYPE_AUTHORITY_DOCUMENT.csv`.
#[derive(Debug, Clone)]
pub struct SuffixPolicy {
    directory: PathBuf,
}

impl SuffixPolicy {
    /// Creates a policy looking for documents in `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// File name of the authority document for `entity`.
    #[must_use]
    pub fn document_name(entity: &str) -> String {
        // Drop the four-character class suffix (".E55").
        let stem = entity
            .char_indices()
            .rev()
            .nth(3)
            .map_or("", |(idx, _)| &entity[..idx]);
        format!("{stem}{AUTHORITY_DOCUMENT_SUFFIX}")
    }
}

impl AuthorityPolicy for SuffixPolicy {
    fn name(&self) -> &'static str {
        "suffix"
    }

    fn authority_path_for(&self, entity: &str) -> Result<Option<PathBuf>> {
        if !entity.contains(TYPE_ENTITY_MARKER) {
            return Ok(None);
        }

        let path = self.directory.join(Self::document_name(entity));
        if !path.is_file() {
            return Err(AuthorityError::DocumentNotFound {
                path,
                entity: Some(entity.to_string()),
                reason: "this entity needs an authority document, yet none was found".to_string(),
            }
            .into());
        }
        Ok(Some(path))
    }
}

/// Selects an [`AuthorityPolicy`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorityPolicyKind {
    /// [`IndexPolicy`]
    #[default]
    Index,
    /// [`SuffixPolicy`]
    Suffix,
}

impl AuthorityPolicyKind {
    /// Builds the policy for `directory`.
    ///
    /// # Errors
    ///
    /// Propagates [`IndexPolicy::open`] failures.
    pub fn build(self, directory: &Path) -> Result<Box<dyn AuthorityPolicy>> {
        Ok(match self {
            Self::Index => Box::new(IndexPolicy::open(directory)?),
            Self::Suffix => Box::new(SuffixPolicy::new(directory)),
        })
    }

    /// Returns the string representation of this policy kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Suffix => "suffix",
        }
    }
}

impl fmt::Display for AuthorityPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorityPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "suffix" => Ok(Self::Suffix),
            other => Err(ConfigError::InvalidOption {
                option: "authority policy".to_string(),
                message: format!("'{other}' (expected 'index' or 'suffix')"),
            }),
        }
    }
}

/// Run-scoped cache of authority tables.
///
/// The policy is consulted once per entity and each document is loaded at most
/// once; entities without a document are remembered as such.
#[derive(Debug, Default)]
pub struct AuthorityCache {
    policy: Option<Box<dyn AuthorityPolicy>>,
    tables: HashMap<String, Option<AuthorityTable>>,
}

impl AuthorityCache {
    /// Creates a cache resolving through `policy`.
    pub fn new(policy: Box<dyn AuthorityPolicy>) -> Self {
        Self {
            policy: Some(policy),
            tables: HashMap::new(),
        }
    }

    /// Creates a cache in which no entity is authority-backed.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Name of the active policy, if any.
    #[must_use]
    pub fn policy_name(&self) -> Option<&'static str> {
        self.policy.as_ref().map(|p| p.name())
    }

    /// Authority table of `entity`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Propagates policy and document loading failures.
    pub fn table_for(&mut self, entity: &str) -> Result<Option<&AuthorityTable>> {
        if !self.tables.contains_key(entity) {
            let table = match &self.policy {
                Some(policy) => match policy.authority_path_for(entity)? {
                    Some(path) => {
                        info!("Loading authority document {} for {entity}", path.display());
                        Some(AuthorityTable::load_for(&path, Some(entity))?)
                    },
                    None => None,
                },
                None => None,
            };
            self.tables.insert(entity.to_string(), table);
        }
        Ok(self.tables.get(entity).and_then(Option::as_ref))
    }

    /// Reconciles `raw` for `entity`; values of free entities pass through unchanged.
    ///
    /// # Errors
    ///
    /// Propagates [`AuthorityTable::resolve`] and loading failures.
    pub fn resolve(&mut self, entity: &str, raw: &str, field: &str, dataset: &str) -> Result<String> {
        match self.table_for(entity)? {
            Some(table) => table.resolve(raw, field, dataset),
            None => Ok(raw.to_string()),
        }
    }

    /// Number of authority documents loaded so far.
    #[must_use]
    pub fn loaded_tables(&self) -> usize {
        self.tables.values().filter(|t| t.is_some()).count()
    }
}
