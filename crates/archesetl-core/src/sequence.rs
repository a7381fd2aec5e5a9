//! Resource and group id sequencing.
//!
//! Ids only move forward. A run either starts fresh, continues from the
//! persisted [`SequenceState`] next to the output, or, for exports written
//! without a state file, from the trailing row of the existing `.arches` file.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{IoErrorExt, Result, SequenceError};
use crate::output::ARCHES_HEADER;

/// First resource number of a fresh sequence.
pub const DEFAULT_BASE_RESOURCE_ID: u64 = 100_000;

/// First group id of a fresh sequence.
pub const DEFAULT_BASE_GROUP_ID: u64 = 300_000;

/// Suffix appended to the output path to locate its sequence state.
pub const STATE_FILE_SUFFIX: &str = ".seq.json";

/// Identifier of one exported resource, rendered `<dataset>-<number>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    dataset: String,
    number: u64,
}

impl ResourceId {
    pub fn new(dataset: impl Into<String>, number: u64) -> Self {
        Self {
            dataset: dataset.into(),
            number,
        }
    }

    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.dataset, self.number)
    }
}

/// Last ids handed out for an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    pub last_resource_id: u64,
    pub last_group_id: u64,
}

impl SequenceState {
    /// State file belonging to `output`: `<output>.seq.json`.
    #[must_use]
    pub fn path_for(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(STATE_FILE_SUFFIX);
        PathBuf::from(name)
    }

    /// Reads the state at `path`; `Ok(None)` when there is no state file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`SequenceError::InvalidState`] if it does not hold a state record.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }

        let text = fs::read_to_string(path).with_read_context("sequence state", path)?;
        let state = serde_json::from_str(&text).map_err(|e| SequenceError::InvalidState {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Some(state))
    }

    /// Replaces the state at `path`.
    ///
    /// The record is written to a temporary file in the same directory and
    /// renamed over `path`, so readers never see a partial record.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the state cannot be written.
    pub fn store(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let json = serde_json::to_string_pretty(self).with_write_context("sequence state", path)?;
        let mut tmp = NamedTempFile::new_in(dir).with_write_context("sequence state", path)?;
        tmp.write_all(json.as_bytes())
            .with_write_context("sequence state", path)?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_write_context("sequence state", path)?;

        debug!(
            "Stored sequence state {} (resource {}, group {})",
            path.display(),
            self.last_resource_id,
            self.last_group_id
        );
        Ok(())
    }
}

/// Hands out resource numbers and group ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequencer {
    next_resource: u64,
    next_group: u64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::fresh()
    }
}

impl Sequencer {
    /// Starts at [`DEFAULT_BASE_RESOURCE_ID`] and [`DEFAULT_BASE_GROUP_ID`].
    #[must_use]
    pub fn fresh() -> Self {
        Self::with_bases(DEFAULT_BASE_RESOURCE_ID, DEFAULT_BASE_GROUP_ID)
    }

    /// Starts at the given first resource number and group id.
    #[must_use]
    pub fn with_bases(resource: u64, group: u64) -> Self {
        Self {
            next_resource: resource,
            next_group: group,
        }
    }

    /// Continues after a persisted state.
    #[must_use]
    pub fn from_state(state: SequenceState) -> Self {
        Self::with_bases(state.last_resource_id + 1, state.last_group_id + 1)
    }

    /// The later of two sequences, field by field.
    #[must_use]
    pub fn later(self, other: Self) -> Self {
        Self {
            next_resource: self.next_resource.max(other.next_resource),
            next_group: self.next_group.max(other.next_group),
        }
    }

    /// Continues after the trailing row of an existing `.arches` export.
    ///
    /// An empty or header-only file yields a fresh sequence. Otherwise the
    /// number after the last `-` of the resource id and the trailing group id
    /// of the last row are taken as the last ids handed out.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`SequenceError::Corrupt`] if either id is not numeric.
    pub fn resume_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_read_context("export", path)?;

        let Some((index, line)) = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .last()
        else {
            return Ok(Self::fresh());
        };

        let line = line.trim_end();
        if line == ARCHES_HEADER {
            return Ok(Self::fresh());
        }

        let corrupt = |value: &str| SequenceError::Corrupt {
            path: path.to_path_buf(),
            line: index + 1,
            value: value.to_string(),
        };

        let resource_field = line.split('|').next().unwrap_or_default();
        let resource_number = resource_field
            .rsplit_once('-')
            .map_or(resource_field, |(_, n)| n)
            .trim();
        let group_field = line.rsplit('|').next().unwrap_or_default().trim();

        let last_resource: u64 = resource_number.parse().map_err(|_| corrupt(resource_number))?;
        let last_group: u64 = group_field.parse().map_err(|_| corrupt(group_field))?;

        debug!(
            "Resuming {} after resource {last_resource}, group {last_group}",
            path.display()
        );
        Ok(Self::from_state(SequenceState {
            last_resource_id: last_resource,
            last_group_id: last_group,
        }))
    }

    /// Resource number the next feature will receive.
    #[must_use]
    pub fn peek_resource_number(&self) -> u64 {
        self.next_resource
    }

    /// Group id the next group will receive.
    #[must_use]
    pub fn peek_group_id(&self) -> u64 {
        self.next_group
    }

    /// Takes the next group id.
    pub fn next_group_id(&mut self) -> u64 {
        let id = self.next_group;
        self.next_group += 1;
        id
    }

    /// Takes the next resource id, prefixed with `dataset`.
    pub fn next_resource_id(&mut self, dataset: &str) -> ResourceId {
        let id = ResourceId::new(dataset, self.next_resource);
        self.next_resource += 1;
        id
    }

    /// Last ids handed out, in the form persisted next to the output.
    #[must_use]
    pub fn state(&self) -> SequenceState {
        SequenceState {
            last_resource_id: self.next_resource.saturating_sub(1),
            last_group_id: self.next_group.saturating_sub(1),
        }
    }
}
