//! In-memory column storage for testing and embedding.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, XiphosError};
use crate::vector::source::{
    ColumnCatalog, ColumnDescriptor, ColumnId, DecodedRow, FileHandle, VectorFileReader,
    VectorIterator,
};

#[derive(Debug, Default)]
struct MemoryColumn {
    dimension: Option<usize>,
    files: Vec<FileHandle>,
}

#[derive(Debug, Default)]
struct MemoryState {
    columns: HashMap<ColumnId, MemoryColumn>,
    files: HashMap<FileHandle, Arc<[DecodedRow]>>,
    next_file: u64,
}

/// An in-memory catalog and reader.
///
/// Columns are declared with a dimension and then filled file by file. Rows
/// are stored as given; dimension checks happen during the scan, exactly as
/// they would for on-disk files.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a column, or redeclare its dimension.
    pub fn declare_column(&self, column_id: ColumnId, dimension: usize) {
        let mut state = self.state.write();
        state.columns.entry(column_id).or_default().dimension = Some(dimension);
    }

    /// Append a file whose row ids are the row positions.
    pub fn append_file(&self, column_id: ColumnId, rows: Vec<Vec<f64>>) -> Result<FileHandle> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| DecodedRow::new(i as u64, values))
            .collect();
        self.append_rows(column_id, rows)
    }

    /// Append a file of explicit rows to a declared column.
    pub fn append_rows(&self, column_id: ColumnId, rows: Vec<DecodedRow>) -> Result<FileHandle> {
        let mut state = self.state.write();
        if !state.columns.contains_key(&column_id) {
            return Err(XiphosError::ColumnNotFound(column_id));
        }

        let handle = FileHandle::new(format!("mem://column-{column_id}/{}", state.next_file));
        state.next_file += 1;
        state.files.insert(handle.clone(), Arc::from(rows));
        if let Some(column) = state.columns.get_mut(&column_id) {
            column.files.push(handle.clone());
        }
        Ok(handle)
    }

    /// Drop a file's contents while leaving it listed in its column.
    ///
    /// Subsequent opens of the handle fail with `SourceUnavailable`.
    pub fn remove_file(&self, file: &FileHandle) -> bool {
        self.state.write().files.remove(file).is_some()
    }

    /// Number of files currently held.
    pub fn file_count(&self) -> usize {
        self.state.read().files.len()
    }
}

impl ColumnCatalog for MemoryStorage {
    fn resolve(&self, column_id: ColumnId) -> Result<ColumnDescriptor> {
        let state = self.state.read();
        let column = state
            .columns
            .get(&column_id)
            .ok_or(XiphosError::ColumnNotFound(column_id))?;
        Ok(ColumnDescriptor::new(
            column_id,
            column.dimension,
            column.files.clone(),
        ))
    }
}

impl VectorFileReader for MemoryStorage {
    fn open(&self, file: &FileHandle) -> Result<Box<dyn VectorIterator>> {
        let rows = self
            .state
            .read()
            .files
            .get(file)
            .cloned()
            .ok_or_else(|| XiphosError::source_unavailable(format!("{file}: no such file")))?;
        Ok(Box::new(MemoryRowIterator { rows, position: 0 }))
    }
}

struct MemoryRowIterator {
    rows: Arc<[DecodedRow]>,
    position: usize,
}

impl VectorIterator for MemoryRowIterator {
    fn next(&mut self) -> Result<Option<DecodedRow>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }
}
