//! Directory-backed column catalog.
//!
//! Column `N` lives in `<root>/column-N/`, one `.xvec` file per shard. Files
//! are scanned in file-name order.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, XiphosError};
use crate::storage::column_file::{COLUMN_FILE_EXTENSION, read_header_from_path};
use crate::vector::source::{ColumnCatalog, ColumnDescriptor, ColumnId, FileHandle};

/// Catalog over a directory tree of column files.
///
/// Handles are full file-system paths, so this pairs with a plain
/// [`ColumnFileReader`](crate::storage::column_file::ColumnFileReader).
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    /// Create a catalog rooted at `root`. The directory must exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(XiphosError::source_unavailable(format!(
                "catalog root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// The catalog root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files of `column_id`.
    pub fn column_dir(&self, column_id: ColumnId) -> PathBuf {
        self.root.join(format!("column-{column_id}"))
    }

    /// Path for a new file named `name` in `column_id`, creating the column
    /// directory if needed.
    pub fn file_path(&self, column_id: ColumnId, name: &str) -> Result<PathBuf> {
        let dir = self.column_dir(column_id);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{name}.{COLUMN_FILE_EXTENSION}")))
    }
}

impl ColumnCatalog for DirectoryCatalog {
    fn resolve(&self, column_id: ColumnId) -> Result<ColumnDescriptor> {
        let dir = self.column_dir(column_id);
        if !dir.is_dir() {
            return Err(XiphosError::ColumnNotFound(column_id));
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(COLUMN_FILE_EXTENSION)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let dimension = match paths.first() {
            Some(first) => Some(read_header_from_path(first)?.dimension),
            None => None,
        };
        debug!(
            "column {column_id}: {} files under {}",
            paths.len(),
            dir.display()
        );

        let files = paths
            .iter()
            .map(|p| FileHandle::new(p.to_string_lossy()))
            .collect();
        Ok(ColumnDescriptor::new(column_id, dimension, files))
    }
}
