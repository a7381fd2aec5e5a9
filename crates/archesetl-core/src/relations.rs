//! Relationships between resources sharing a join value.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use log::{debug, info};

use crate::error::Result;
use crate::output::{DelimitedWriter, RELATIONS_HEADER};
use crate::sequence::ResourceId;

/// Relation type used when none is given.
pub const DEFAULT_RELATION_TYPE: &str = "RELATIONSHIP_TYPE:1";

/// Join value → resource ids carrying it, across every dataset of a run.
///
/// Held in memory for the whole run.
#[derive(Debug, Clone, Default)]
pub struct RelationAccumulator {
    keys: BTreeMap<String, Vec<ResourceId>>,
}

impl RelationAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` under `key`. Blank keys are ignored.
    pub fn add(&mut self, key: &str, id: ResourceId) {
        if key.trim().is_empty() {
            return;
        }
        self.keys.entry(key.to_string()).or_default().push(id);
    }

    /// Number of distinct join values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resource ids recorded under `key`, in encounter order.
    #[must_use]
    pub fn ids(&self, key: &str) -> &[ResourceId] {
        self.keys.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

/// One row of a `.relations` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRow {
    pub from: ResourceId,
    pub to: ResourceId,
    pub start_date: String,
    pub end_date: String,
    pub relation_type: String,
    pub notes: String,
}

impl fmt::Display for RelationshipRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}",
            self.from, self.to, self.start_date, self.end_date, self.relation_type, self.notes
        )
    }
}

/// Pairs up resources sharing a join value.
///
/// Keys are visited in sorted order; each key with `n >= 2` ids yields its
/// `n * (n - 1) / 2` unordered pairs, earlier ids first.
#[must_use]
pub fn emit(accumulator: &RelationAccumulator, relation_type: &str) -> Vec<RelationshipRow> {
    let mut rows = Vec::new();
    for (key, ids) in &accumulator.keys {
        if ids.len() < 2 {
            continue;
        }
        debug!("Relating {} resources sharing '{key}'", ids.len());
        for (i, from) in ids.iter().enumerate() {
            for to in &ids[i + 1..] {
                rows.push(RelationshipRow {
                    from: from.clone(),
                    to: to.clone(),
                    start_date: String::new(),
                    end_date: String::new(),
                    relation_type: relation_type.to_string(),
                    notes: String::new(),
                });
            }
        }
    }
    rows
}

/// Writes relationship rows to `path`, appending when `append` is set.
///
/// The file always ends up with a header, even without rows.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_relations(path: &Path, rows: &[RelationshipRow], append: bool) -> Result<usize> {
    let mut writer = if append {
        DelimitedWriter::append(path, RELATIONS_HEADER, "relations")?
    } else {
        DelimitedWriter::create(path, RELATIONS_HEADER, "relations")?
    };

    for row in rows {
        writer.write_line(row)?;
    }
    let written = writer.finish()?;
    info!("Wrote {written} relationships to {}", path.display());
    Ok(written)
}
