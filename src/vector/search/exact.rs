//! Exact (brute-force) nearest-neighbour search.
//!
//! Every vector of the target column is scored against the query and offered
//! to a [`TopKSelector`]. No index or pruning is involved, so the result is
//! the true top-k. Any error met during the scan aborts the whole query.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use crate::error::{Result, XiphosError};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::search::topk::{Candidate, ScanPosition, TopKSelector};
use crate::vector::search::{ExactSearchConfig, NnsQuery, SearchHit, SearchResults};
use crate::vector::source::{
    ColumnCatalog, ColumnDescriptor, ColumnScan, ScannedVector, VectorFileReader,
};

/// Check that `query` can be scored under `metric` at all.
fn check_query(query: &[f64], metric: DistanceMetric) -> Result<()> {
    if query.is_empty() {
        return Err(XiphosError::invalid_input("query vector is empty"));
    }
    if metric == DistanceMetric::Cosine && query.iter().all(|v| *v == 0.0) {
        return Err(XiphosError::undefined_similarity(
            "cosine similarity requested for a zero-norm query vector",
        ));
    }
    Ok(())
}

/// Score every vector of `source` and offer it to `selector`.
///
/// Returns the number of vectors scored.
fn score_into<I>(
    query: &[f64],
    metric: DistanceMetric,
    source: I,
    selector: &mut TopKSelector<ScannedVector>,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<ScannedVector>>,
{
    let mut scored = 0;
    for item in source {
        let scanned = item?;
        let score = metric.score(query, scanned.vector.as_slice())?;
        let position = ScanPosition::new(scanned.origin.file_index, scanned.origin.row_index);
        selector.offer(Candidate::new(score, position, scanned));
        scored += 1;
    }
    Ok(scored)
}

/// Exact top-k over any sequence of scanned vectors.
///
/// This is the scan loop without catalog lookup, for callers that produce
/// vectors themselves. With `k == 0` the source is not consumed at all.
pub fn exact_search<I>(
    query: &[f64],
    metric: DistanceMetric,
    k: usize,
    source: I,
) -> Result<Vec<Candidate<ScannedVector>>>
where
    I: IntoIterator<Item = Result<ScannedVector>>,
{
    check_query(query, metric)?;
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut selector = TopKSelector::new(k, metric.order());
    score_into(query, metric, source, &mut selector)?;
    Ok(selector.drain())
}

struct ScanOutcome {
    selector: TopKSelector<ScannedVector>,
    candidates: usize,
    files: usize,
}

/// Exact searcher over columns resolved through a catalog.
#[derive(Debug, Clone)]
pub struct ExactSearcher {
    catalog: Arc<dyn ColumnCatalog>,
    reader: Arc<dyn VectorFileReader>,
    config: ExactSearchConfig,
}

impl ExactSearcher {
    /// Create a searcher with the default configuration.
    pub fn new(catalog: Arc<dyn ColumnCatalog>, reader: Arc<dyn VectorFileReader>) -> Self {
        Self::with_config(catalog, reader, ExactSearchConfig::default())
    }

    /// Create a searcher with an explicit configuration.
    pub fn with_config(
        catalog: Arc<dyn ColumnCatalog>,
        reader: Arc<dyn VectorFileReader>,
        config: ExactSearchConfig,
    ) -> Self {
        Self {
            catalog,
            reader,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ExactSearchConfig {
        &self.config
    }

    /// Validate raw host arguments and run the search.
    pub fn exact_nns(
        &self,
        query: Option<Vec<f64>>,
        column_id: i64,
        metric_name: &str,
        k: i64,
    ) -> Result<SearchResults> {
        let query = NnsQuery::parse(query, column_id, metric_name, k)?;
        self.search(&query)
    }

    /// Run one exact search.
    pub fn search(&self, query: &NnsQuery) -> Result<SearchResults> {
        let start = Instant::now();
        let metric = query.metric();
        check_query(query.vector().as_slice(), metric)?;

        if query.k() == 0 {
            debug!("k = 0 for column {}; skipping scan", query.column_id());
            return Ok(SearchResults::empty(metric));
        }

        let descriptor = self.catalog.resolve(query.column_id())?;
        let parallel = self.config.parallel
            && descriptor.files.len() > 1
            && descriptor.files.len() >= self.config.min_parallel_files;
        debug!(
            "exact search: column {}, metric {}, k {}, {} files{}",
            query.column_id(),
            metric,
            query.k(),
            descriptor.files.len(),
            if parallel { " (parallel)" } else { "" }
        );

        let outcome = if parallel {
            self.scan_parallel(query, &descriptor)?
        } else {
            self.scan_sequential(query, &descriptor)?
        };

        let include_vectors = self.config.include_vectors;
        let hits = outcome
            .selector
            .drain()
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| SearchHit {
                rank: i + 1,
                score: candidate.score,
                origin: candidate.payload.origin,
                vector: include_vectors.then_some(candidate.payload.vector),
            })
            .collect::<Vec<_>>();

        let search_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "exact search done: {} hits from {} candidates in {:.3}ms",
            hits.len(),
            outcome.candidates,
            search_time_ms
        );

        Ok(SearchResults {
            metric,
            hits,
            candidates_scanned: outcome.candidates,
            files_scanned: outcome.files,
            search_time_ms,
        })
    }

    fn scan_sequential(&self, query: &NnsQuery, descriptor: &ColumnDescriptor) -> Result<ScanOutcome> {
        let metric = query.metric();
        let mut selector = TopKSelector::new(query.k(), metric.order());
        let mut scan = ColumnScan::new(self.reader.as_ref(), descriptor);
        score_into(query.vector().as_slice(), metric, &mut scan, &mut selector)?;

        Ok(ScanOutcome {
            selector,
            candidates: scan.rows_scanned(),
            files: scan.files_opened(),
        })
    }

    /// Scan each file on the rayon pool, then merge in file order.
    ///
    /// The tie-break key is (file index, row index), so the merged ranking is
    /// identical to the sequential one. When several files fail, the error of
    /// the lowest file index wins.
    fn scan_parallel(&self, query: &NnsQuery, descriptor: &ColumnDescriptor) -> Result<ScanOutcome> {
        let metric = query.metric();
        let reader = self.reader.as_ref();

        let partials: Vec<Result<ScanOutcome>> = (0..descriptor.files.len())
            .into_par_iter()
            .map(|file_index| {
                let mut selector = TopKSelector::new(query.k(), metric.order());
                let mut scan = ColumnScan::for_file(reader, descriptor, file_index);
                score_into(query.vector().as_slice(), metric, &mut scan, &mut selector)?;
                Ok(ScanOutcome {
                    selector,
                    candidates: scan.rows_scanned(),
                    files: scan.files_opened(),
                })
            })
            .collect();

        let mut merged = ScanOutcome {
            selector: TopKSelector::new(query.k(), metric.order()),
            candidates: 0,
            files: 0,
        };
        for partial in partials {
            let partial = partial?;
            merged.selector.merge(partial.selector);
            merged.candidates += partial.candidates;
            merged.files += partial.files;
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::vector::source::{ColumnId, FileHandle, VectorIterator};

    /// Reader wrapper that counts how many files were opened.
    #[derive(Debug)]
    struct CountingReader {
        inner: Arc<MemoryStorage>,
        opened: AtomicUsize,
    }

    impl VectorFileReader for CountingReader {
        fn open(&self, file: &FileHandle) -> Result<Box<dyn VectorIterator>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.inner.open(file)
        }
    }

    fn storage(column: ColumnId, dimension: usize, files: Vec<Vec<Vec<f64>>>) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage.declare_column(column, dimension);
        for rows in files {
            storage.append_file(column, rows).unwrap();
        }
        storage
    }

    fn counting_searcher(storage: Arc<MemoryStorage>) -> (ExactSearcher, Arc<CountingReader>) {
        let reader = Arc::new(CountingReader {
            inner: storage.clone(),
            opened: AtomicUsize::new(0),
        });
        (ExactSearcher::new(storage, reader.clone()), reader)
    }

    fn four_points() -> Arc<MemoryStorage> {
        storage(
            1,
            2,
            vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![3.0, 4.0],
                vec![1.0, 1.0],
            ]],
        )
    }

    #[test]
    fn test_euclidean_top2_breaks_ties_by_scan_order() {
        let storage = four_points();
        let searcher = ExactSearcher::new(storage.clone(), storage);

        let results = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "euc", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.hits[0].score, 0.0);
        assert_eq!(results.hits[0].origin.row_index, 0);
        assert_eq!(results.hits[1].score, 1.0);
        assert_eq!(results.hits[1].origin.row_index, 1);
        assert_eq!(
            results.hits[1].vector.as_ref().unwrap().as_slice(),
            &[1.0, 0.0]
        );
        assert_eq!(results.candidates_scanned, 4);
        assert_eq!(results.files_scanned, 1);
    }

    #[test]
    fn test_dot_and_cosine_rank_descending() {
        let storage = storage(
            1,
            2,
            vec![vec![vec![1.0, 0.0], vec![5.0, 5.0], vec![0.0, 2.0], vec![-1.0, 0.0]]],
        );
        let searcher = ExactSearcher::new(storage.clone(), storage);

        let dot = searcher.exact_nns(Some(vec![1.0, 0.0]), 1, "dot", 4).unwrap();
        let rows: Vec<u64> = dot.hits.iter().map(|h| h.origin.row_index).collect();
        assert_eq!(rows, vec![1, 0, 2, 3]);
        assert_eq!(dot.scores(), vec![5.0, 1.0, 0.0, -1.0]);

        let cos = searcher.exact_nns(Some(vec![1.0, 0.0]), 1, "cos", 2).unwrap();
        assert_eq!(cos.hits[0].origin.row_index, 0);
        assert!((cos.hits[0].score - 1.0).abs() < 1e-12);
        assert_eq!(cos.hits[1].origin.row_index, 1);
    }

    #[test]
    fn test_k_zero_scans_nothing() {
        let (searcher, reader) = counting_searcher(four_points());
        let results = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "euc", 0).unwrap();
        assert!(results.is_empty());
        assert_eq!(reader.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_k_larger_than_column_returns_all() {
        let storage = four_points();
        let searcher = ExactSearcher::new(storage.clone(), storage);
        let results = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "euc", 100).unwrap();
        assert_eq!(results.scores(), vec![0.0, 1.0, 2.0, 25.0]);
        let ranks: Vec<usize> = results.hits.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_inputs_fail_before_scanning() {
        let (searcher, reader) = counting_searcher(four_points());

        let err = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "manhattan", 2).unwrap_err();
        assert!(matches!(err, XiphosError::UnknownMetric(_)));
        let err = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "euc", -2).unwrap_err();
        assert!(matches!(err, XiphosError::InvalidK(-2)));
        let err = searcher.exact_nns(None, 1, "euc", 2).unwrap_err();
        assert!(matches!(err, XiphosError::MissingQueryVector));
        let err = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "cos", 2).unwrap_err();
        assert!(matches!(err, XiphosError::UndefinedSimilarity(_)));

        assert_eq!(reader.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_incompatible_lengths_abort_query() {
        let storage = storage(1, 3, vec![vec![vec![1.0, 2.0, 3.0]]]);
        let searcher = ExactSearcher::new(storage.clone(), storage);
        let err = searcher.exact_nns(Some(vec![1.0, 2.0]), 1, "euc", 1).unwrap_err();
        assert!(matches!(
            err,
            XiphosError::IncompatibleLengths { left: 2, right: 3 }
        ));
    }

    #[test]
    fn test_zero_norm_candidate_aborts_cosine() {
        let storage = storage(1, 2, vec![vec![vec![1.0, 0.0], vec![0.0, 0.0]]]);
        let searcher = ExactSearcher::new(storage.clone(), storage);
        let err = searcher.exact_nns(Some(vec![1.0, 1.0]), 1, "cos", 5).unwrap_err();
        assert!(matches!(err, XiphosError::UndefinedSimilarity(_)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let files: Vec<Vec<Vec<f64>>> = (0..5)
            .map(|f| {
                (0..40)
                    .map(|r| {
                        let x = ((f * 40 + r) % 7) as f64;
                        vec![x + 1.0, (r % 3) as f64]
                    })
                    .collect()
            })
            .collect();
        let storage = storage(2, 2, files);

        let sequential = ExactSearcher::new(storage.clone(), storage.clone());
        let parallel = ExactSearcher::with_config(
            storage.clone(),
            storage,
            ExactSearchConfig {
                parallel: true,
                ..ExactSearchConfig::default()
            },
        );

        for metric in ["euc", "dot", "cos"] {
            let query = NnsQuery::parse(Some(vec![2.0, 1.0]), 2, metric, 17).unwrap();
            let a = sequential.search(&query).unwrap();
            let b = parallel.search(&query).unwrap();
            assert_eq!(a.hits, b.hits, "metric {metric}");
            assert_eq!(a.candidates_scanned, 200);
            assert_eq!(b.candidates_scanned, 200);
            assert_eq!(b.files_scanned, 5);
        }
    }

    #[test]
    fn test_parallel_reports_lowest_failing_file() {
        let storage = storage(
            1,
            1,
            vec![vec![vec![1.0]], vec![vec![2.0]], vec![vec![3.0]]],
        );
        let descriptor = storage.resolve(1).unwrap();
        storage.remove_file(&descriptor.files[1]);
        storage.remove_file(&descriptor.files[2]);

        let searcher = ExactSearcher::with_config(
            storage.clone(),
            storage,
            ExactSearchConfig {
                parallel: true,
                ..ExactSearchConfig::default()
            },
        );
        let err = searcher.exact_nns(Some(vec![1.0]), 1, "euc", 1).unwrap_err();
        match err {
            XiphosError::SourceUnavailable(msg) => assert!(msg.contains("column-1/1")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exclude_vectors() {
        let storage = four_points();
        let searcher = ExactSearcher::with_config(
            storage.clone(),
            storage,
            ExactSearchConfig {
                include_vectors: false,
                ..ExactSearchConfig::default()
            },
        );
        let results = searcher.exact_nns(Some(vec![0.0, 0.0]), 1, "euc", 2).unwrap();
        assert!(results.hits.iter().all(|h| h.vector.is_none()));
    }

    #[test]
    fn test_exact_search_over_plain_iterator() {
        let storage = four_points();
        let descriptor = storage.resolve(1).unwrap();
        let scan = ColumnScan::new(storage.as_ref(), &descriptor);

        let top = exact_search(&[3.0, 3.0], DistanceMetric::Euclidean, 1, scan).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].payload.vector.as_slice(), &[3.0, 4.0]);
        assert_eq!(top[0].score, 1.0);
    }

    #[test]
    fn test_exact_search_k_zero_does_not_consume_source() {
        let mut pulled = 0;
        let source = std::iter::from_fn(|| {
            pulled += 1;
            None
        });
        let top = exact_search(&[1.0], DistanceMetric::DotProduct, 0, source).unwrap();
        assert!(top.is_empty());
        assert_eq!(pulled, 0);
    }
}
