//! Pipe-delimited `.arches` and `.relations` files.

use std::fmt::{self, Display};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{IoErrorExt, OutputError, Result};
use crate::sequence::ResourceId;

/// Header row of `.arches` files.
pub const ARCHES_HEADER: &str = "RESOURCEID|RESOURCETYPE|ATTRIBUTENAME|ATTRIBUTEVALUE|GROUPID";

/// Header row of `.relations` files.
pub const RELATIONS_HEADER: &str = "RESOURCEID_FROM|RESOURCEID_TO|START_DATE|END_DATE|RELATION_TYPE|NOTES";

/// Row terminator of both files.
pub const LINE_ENDING: &str = "\r\n";

/// Characters that cannot appear inside an attribute value.
pub const RESERVED_CHARACTERS: [char; 3] = ['|', '\r', '\n'];

/// Fails when `value` holds a [`RESERVED_CHARACTERS`] character.
///
/// # Errors
///
/// Returns [`OutputError::ReservedCharacter`] naming `field` and `dataset`.
pub fn check_value(value: &str, field: &str, dataset: &str) -> Result<()> {
    if value.contains(RESERVED_CHARACTERS) {
        return Err(OutputError::ReservedCharacter {
            value: value.to_string(),
            field: field.to_string(),
            dataset: dataset.to_string(),
        }
        .into());
    }
    Ok(())
}

/// One row of an `.arches` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    pub resource_id: ResourceId,
    pub resource_type: String,
    pub entity: String,
    pub value: String,
    pub group_id: u64,
}

impl Display for AttributeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.resource_id, self.resource_type, self.entity, self.value, self.group_id
        )
    }
}

/// Line writer for one pipe-delimited output file.
///
/// Rows are buffered; call [`DelimitedWriter::finish`] to flush them, or
/// [`DelimitedWriter::discard`] to return the file to its state before opening.
#[derive(Debug)]
pub struct DelimitedWriter {
    inner: BufWriter<File>,
    path: PathBuf,
    header: &'static str,
    what: &'static str,
    rows: usize,
    /// File length when opened; 0 for created files
    start_len: u64,
}

impl DelimitedWriter {
    /// Creates (or truncates) `path` and writes `header`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn create(path: &Path, header: &'static str, what: &'static str) -> Result<Self> {
        let file = File::create(path).with_write_context(what, path)?;
        let mut writer = Self::wrap(file, path, header, what, 0);
        writer.write_line(header)?;
        writer.rows = 0;
        debug!("Created {what} {}", path.display());
        Ok(writer)
    }

    /// Opens `path` for appending.
    ///
    /// A missing or empty file gets `header` first. A file whose last line is
    /// unterminated gets a line ending before the first appended row.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn append(path: &Path, header: &'static str, what: &'static str) -> Result<Self> {
        let existing_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if existing_len == 0 {
            return Self::create(path, header, what);
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .with_write_context(what, path)?;

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .with_read_context(what, path)?;

        let mut writer = Self::wrap(file, path, header, what, existing_len);
        if last[0] != b'\n' {
            writer
                .inner
                .write_all(LINE_ENDING.as_bytes())
                .with_write_context(what, path)?;
        }
        debug!("Appending to {what} {}", path.display());
        Ok(writer)
    }

    fn wrap(file: File, path: &Path, header: &'static str, what: &'static str, start_len: u64) -> Self {
        Self {
            inner: BufWriter::new(file),
            path: path.to_path_buf(),
            header,
            what,
            rows: 0,
            start_len,
        }
    }

    /// Writes one row followed by [`LINE_ENDING`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub fn write_line(&mut self, row: impl Display) -> Result<()> {
        write!(self.inner, "{row}{LINE_ENDING}").with_write_context(self.what, &self.path)?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written through this writer, excluding the header.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered rows and returns the row count.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub fn finish(mut self) -> Result<usize> {
        self.inner
            .flush()
            .with_write_context(self.what, &self.path)?;
        Ok(self.rows)
    }

    /// Drops buffered rows and truncates the file to its length when opened.
    ///
    /// Appended files get their previous contents back byte for byte; created
    /// files are left with only the header.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be truncated.
    pub fn discard(self) -> Result<()> {
        let (mut file, _) = self.inner.into_parts();
        file.set_len(self.start_len)
            .with_write_context(self.what, &self.path)?;
        if self.start_len == 0 {
            file.seek(SeekFrom::Start(0))
                .and_then(|_| write!(file, "{}{LINE_ENDING}", self.header))
                .with_write_context(self.what, &self.path)?;
        }
        debug!(
            "Discarded {} rows of {what} {}",
            self.rows,
            self.path.display(),
            what = self.what
        );
        Ok(())
    }
}

/// Writer of `.arches` attribute files.
#[derive(Debug)]
pub struct ArchesWriter {
    inner: DelimitedWriter,
}

impl ArchesWriter {
    /// Creates a new export with its header.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            inner: DelimitedWriter::create(path, ARCHES_HEADER, "export")?,
        })
    }

    /// Opens an existing export for appending, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn append(path: &Path) -> Result<Self> {
        Ok(Self {
            inner: DelimitedWriter::append(path, ARCHES_HEADER, "export")?,
        })
    }

    /// Writes one attribute row.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub fn write_row(&mut self, row: &AttributeRow) -> Result<()> {
        self.inner.write_line(row)
    }

    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.inner.rows_written()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Flushes the export and returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub fn finish(self) -> Result<usize> {
        self.inner.finish()
    }

    /// Undoes every row written through this writer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be truncated.
    pub fn discard(self) -> Result<()> {
        self.inner.discard()
    }
}
