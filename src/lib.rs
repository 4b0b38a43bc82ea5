//! # Xiphos
//!
//! Exact k-nearest-neighbour search over columns of fixed-dimension vectors.
//!
//! ## Features
//!
//! - Squared Euclidean distance, dot product and cosine similarity
//! - Brute-force scan with a bounded top-k selector
//! - Deterministic tie-breaking by scan position
//! - Optional per-file parallel scan with identical results
//! - Pluggable catalog and file readers, with in-memory and `.xvec` backends
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use xiphos::storage::memory::MemoryStorage;
//! use xiphos::vector::ExactSearcher;
//!
//! # fn main() -> xiphos::error::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! storage.declare_column(1, 2);
//! storage.append_file(1, vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![3.0, 4.0]])?;
//!
//! let searcher = ExactSearcher::new(storage.clone(), storage);
//! let results = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "euc", 2)?;
//! assert_eq!(results.scores(), vec![0.0, 1.0]);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod storage;
pub mod vector;

pub mod prelude {
    pub use crate::error::{Result, XiphosError};
    pub use crate::vector::source::{ColumnCatalog, ColumnId, FileHandle, VectorFileReader};
    pub use crate::vector::{
        DistanceMetric, ExactSearchConfig, ExactSearcher, NnsQuery, SearchHit, SearchResults,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
