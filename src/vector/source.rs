//! Vector sources: catalog lookup, per-file readers, and the column scan.
//!
//! The core never locates or decodes files itself. A [`ColumnCatalog`] turns a
//! column id into an ordered list of opaque [`FileHandle`]s, and a
//! [`VectorFileReader`] turns one handle into a stream of decoded rows.
//! [`ColumnScan`] stitches those together into a single lazy sequence of
//! [`ScannedVector`]s, stamping each row with its origin and checking it
//! against the column's declared dimension.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};
use crate::vector::core::vector::Vector;

/// Identifier of a vector column, as assigned by the host engine.
pub type ColumnId = u32;

/// Opaque reference to one backing file of a column.
///
/// Only the reader that produced the catalog entry knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(String);

impl FileHandle {
    /// Wrap a location string.
    pub fn new<S: Into<String>>(location: S) -> Self {
        Self(location.into())
    }

    /// The location string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the catalog knows about a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// The column this describes.
    pub column_id: ColumnId,
    /// Declared vector dimension, if the column declares one.
    pub dimension: Option<usize>,
    /// Backing files, in scan order.
    pub files: Vec<FileHandle>,
}

impl ColumnDescriptor {
    /// Create a descriptor.
    pub fn new(column_id: ColumnId, dimension: Option<usize>, files: Vec<FileHandle>) -> Self {
        Self {
            column_id,
            dimension,
            files,
        }
    }
}

/// Resolves column ids to their backing files.
pub trait ColumnCatalog: Send + Sync + fmt::Debug {
    /// Look up a column. Unknown columns fail with [`XiphosError::ColumnNotFound`].
    fn resolve(&self, column_id: ColumnId) -> Result<ColumnDescriptor>;
}

/// One row as decoded by a storage reader.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    /// Row identifier reported by the storage layer.
    pub row_id: u64,
    /// Vector components.
    pub values: Vec<f64>,
}

impl DecodedRow {
    /// Create a decoded row.
    pub fn new(row_id: u64, values: Vec<f64>) -> Self {
        Self { row_id, values }
    }
}

/// Opens backing files for reading.
pub trait VectorFileReader: Send + Sync + fmt::Debug {
    /// Open one file. Failure to open is [`XiphosError::SourceUnavailable`].
    fn open(&self, file: &FileHandle) -> Result<Box<dyn VectorIterator>>;
}

/// Streaming iterator over the rows of one file.
pub trait VectorIterator: Send {
    /// Get the next row, or `None` at end of file.
    fn next(&mut self) -> Result<Option<DecodedRow>>;
}

/// Where a scanned vector came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowOrigin {
    /// The file the row was read from.
    pub file: FileHandle,
    /// Position of that file in the column's file list.
    pub file_index: usize,
    /// Position of the row within the file, counting from zero.
    pub row_index: u64,
    /// Row identifier reported by the storage layer.
    pub row_id: u64,
}

/// A vector produced by a scan, together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedVector {
    /// The vector itself.
    pub vector: Vector,
    /// Where it was read from.
    pub origin: RowOrigin,
}

/// Lazy, single-pass scan over the files of one column.
///
/// Files are opened one at a time, in catalog order, only once the previous
/// file is exhausted. The scan stops at the first error it yields.
pub struct ColumnScan<'a> {
    reader: &'a dyn VectorFileReader,
    descriptor: &'a ColumnDescriptor,
    next_file: usize,
    end_file: usize,
    current: Option<OpenFile>,
    rows_scanned: usize,
    files_opened: usize,
    failed: bool,
}

struct OpenFile {
    index: usize,
    rows: Box<dyn VectorIterator>,
    next_row: u64,
}

impl<'a> ColumnScan<'a> {
    /// Scan every file of the column.
    pub fn new(reader: &'a dyn VectorFileReader, descriptor: &'a ColumnDescriptor) -> Self {
        Self::over_range(reader, descriptor, 0, descriptor.files.len())
    }

    /// Scan a single file of the column, keeping its column-wide file index.
    pub fn for_file(
        reader: &'a dyn VectorFileReader,
        descriptor: &'a ColumnDescriptor,
        file_index: usize,
    ) -> Self {
        let end = (file_index + 1).min(descriptor.files.len());
        Self::over_range(reader, descriptor, file_index, end)
    }

    fn over_range(
        reader: &'a dyn VectorFileReader,
        descriptor: &'a ColumnDescriptor,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            reader,
            descriptor,
            next_file: start,
            end_file: end,
            current: None,
            rows_scanned: 0,
            files_opened: 0,
            failed: false,
        }
    }

    /// Number of rows yielded so far.
    pub fn rows_scanned(&self) -> usize {
        self.rows_scanned
    }

    /// Number of files opened so far.
    pub fn files_opened(&self) -> usize {
        self.files_opened
    }

    /// Get the next vector, or `None` once every file is exhausted.
    pub fn next_vector(&mut self) -> Result<Option<ScannedVector>> {
        loop {
            if self.current.is_none() {
                if self.next_file >= self.end_file {
                    return Ok(None);
                }
                let index = self.next_file;
                self.next_file += 1;

                let handle = &self.descriptor.files[index];
                debug!(
                    "column {}: opening file {} ({})",
                    self.descriptor.column_id, index, handle
                );
                let rows = self.reader.open(handle)?;
                self.files_opened += 1;
                self.current = Some(OpenFile {
                    index,
                    rows,
                    next_row: 0,
                });
            }

            let Some(open) = self.current.as_mut() else {
                continue;
            };
            match open.rows.next()? {
                Some(row) => {
                    let origin = RowOrigin {
                        file: self.descriptor.files[open.index].clone(),
                        file_index: open.index,
                        row_index: open.next_row,
                        row_id: row.row_id,
                    };
                    open.next_row += 1;

                    let vector = Vector::new(row.values);
                    self.check_row(&vector, &origin)?;
                    self.rows_scanned += 1;
                    return Ok(Some(ScannedVector { vector, origin }));
                }
                None => {
                    self.current = None;
                }
            }
        }
    }

    fn check_row(&self, vector: &Vector, origin: &RowOrigin) -> Result<()> {
        if let Some(expected) = self.descriptor.dimension
            && vector.dimension() != expected
        {
            return Err(XiphosError::malformed_vector(format!(
                "{} row {}: expected dimension {}, got {}",
                origin.file,
                origin.row_index,
                expected,
                vector.dimension()
            )));
        }
        if !vector.is_valid() {
            return Err(XiphosError::malformed_vector(format!(
                "{} row {}: non-finite component",
                origin.file, origin.row_index
            )));
        }
        Ok(())
    }
}

impl Iterator for ColumnScan<'_> {
    type Item = Result<ScannedVector>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_vector() {
            Ok(Some(scanned)) => Some(Ok(scanned)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
