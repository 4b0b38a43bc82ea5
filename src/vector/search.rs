//! Exact nearest-neighbour search.
//!
//! - [`NnsQuery`]: a validated query bundle
//! - [`topk`]: bounded best-k selection with deterministic tie-breaking
//! - [`exact`]: the brute-force scan driving metric and selector
//! - [`SearchResults`]: the ranked result set handed back to the host

pub mod exact;
pub mod topk;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::core::vector::Vector;
use crate::vector::source::{ColumnId, RowOrigin};

/// Configuration for exact search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactSearchConfig {
    /// Whether hits carry the neighbour vectors themselves.
    pub include_vectors: bool,
    /// Whether to scan files concurrently on the rayon pool.
    pub parallel: bool,
    /// Minimum number of files before a parallel scan is used.
    pub min_parallel_files: usize,
}

impl Default for ExactSearchConfig {
    fn default() -> Self {
        Self {
            include_vectors: true,
            parallel: false,
            min_parallel_files: 2,
        }
    }
}

impl ExactSearchConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// A validated exact-search query.
#[derive(Debug, Clone, PartialEq)]
pub struct NnsQuery {
    vector: Vector,
    column_id: ColumnId,
    metric: DistanceMetric,
    k: usize,
}

impl NnsQuery {
    /// Build a query from typed parts.
    ///
    /// The vector must be non-empty and finite.
    pub fn new(vector: Vec<f64>, column_id: ColumnId, metric: DistanceMetric, k: usize) -> Result<Self> {
        if vector.is_empty() {
            return Err(XiphosError::invalid_input("query vector is empty"));
        }
        let vector = Vector::new(vector);
        if !vector.is_valid() {
            return Err(XiphosError::invalid_input(
                "query vector contains NaN or infinite values",
            ));
        }

        Ok(Self {
            vector,
            column_id,
            metric,
            k,
        })
    }

    /// Validate raw host arguments.
    ///
    /// Checks run in a fixed order and all of them happen before any data is
    /// touched: presence of the vector, its contents, the metric name, `k`,
    /// then the column id.
    pub fn parse(
        vector: Option<Vec<f64>>,
        column_id: i64,
        metric_name: &str,
        k: i64,
    ) -> Result<Self> {
        let vector = vector.ok_or(XiphosError::MissingQueryVector)?;
        if vector.is_empty() {
            return Err(XiphosError::invalid_input("query vector is empty"));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(XiphosError::invalid_input(
                "query vector contains NaN or infinite values",
            ));
        }

        let metric = DistanceMetric::parse_str(metric_name)?;

        if k < 0 {
            return Err(XiphosError::InvalidK(k));
        }
        let k = usize::try_from(k).map_err(|_| XiphosError::InvalidK(k))?;

        let column_id = ColumnId::try_from(column_id).map_err(|_| {
            XiphosError::invalid_input(format!("column id {column_id} is out of range"))
        })?;

        Self::new(vector, column_id, metric, k)
    }

    /// The query vector.
    pub fn vector(&self) -> &Vector {
        &self.vector
    }

    /// The target column.
    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    /// The scoring metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of neighbours requested.
    pub fn k(&self) -> usize {
        self.k
    }
}

/// One ranked neighbour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based rank in the result set.
    pub rank: usize,
    /// Metric score against the query.
    pub score: f64,
    /// Where the vector was read from.
    pub origin: RowOrigin,
    /// The neighbour vector, if requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vector: Option<Vector>,
}

/// Ranked result set of one exact search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Metric used for scoring.
    pub metric: DistanceMetric,
    /// Hits, best first. Never longer than the requested `k`.
    pub hits: Vec<SearchHit>,
    /// Number of vectors scored.
    pub candidates_scanned: usize,
    /// Number of files opened.
    pub files_scanned: usize,
    /// Wall-clock search time in milliseconds. Not serialized, so encoded
    /// results of identical searches are byte-identical.
    #[serde(skip)]
    pub search_time_ms: f64,
}

impl SearchResults {
    /// An empty result set.
    pub fn empty(metric: DistanceMetric) -> Self {
        Self {
            metric,
            hits: Vec::new(),
            candidates_scanned: 0,
            files_scanned: 0,
            search_time_ms: 0.0,
        }
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Scores of all hits, best first.
    pub fn scores(&self) -> Vec<f64> {
        self.hits.iter().map(|h| h.score).collect()
    }
}
