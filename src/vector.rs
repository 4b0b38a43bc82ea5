//! Exact vector search over column files.
//!
//! # Module Structure
//!
//! - `core`: vector representation and the metric library
//! - `source`: catalog/reader seams and the lazy column scan
//! - `search`: top-k selection and the exact search orchestrator

pub mod core;
pub mod search;
pub mod source;

pub use self::core::distance::{DistanceMetric, ScoreOrder};
pub use self::core::vector::Vector;
pub use self::search::exact::{ExactSearcher, exact_search};
pub use self::search::{ExactSearchConfig, NnsQuery, SearchHit, SearchResults};
