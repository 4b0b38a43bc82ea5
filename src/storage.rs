//! Storage collaborators for the exact searcher.
//!
//! The search core only talks to the [`ColumnCatalog`] and
//! [`VectorFileReader`] traits. This module ships concrete implementations
//! so the crate is usable end to end; hosts with their own file layout plug
//! in their own.
//!
//! # Backends
//!
//! ## MemoryStorage
//! - In-memory catalog and reader for tests and embedding
//!
//! ## Column files
//! - `.xvec` single-column vector files ([`column_file`])
//! - [`DirectoryCatalog`](directory::DirectoryCatalog) maps column ids to
//!   directories of such files
//!
//! # Example
//!
//! ```
//! use xiphos::storage::memory::MemoryStorage;
//! use xiphos::vector::source::ColumnCatalog;
//!
//! # fn main() -> xiphos::error::Result<()> {
//! let storage = MemoryStorage::new();
//! storage.declare_column(1, 2);
//! storage.append_file(1, vec![vec![0.0, 1.0], vec![1.0, 0.0]])?;
//!
//! let column = storage.resolve(1)?;
//! assert_eq!(column.files.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! [`ColumnCatalog`]: crate::vector::source::ColumnCatalog
//! [`VectorFileReader`]: crate::vector::source::VectorFileReader

pub mod column_file;
pub mod directory;
pub mod memory;
