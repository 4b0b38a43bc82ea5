//! Distance and similarity metrics for exact vector search.
//!
//! Every metric maps two equal-length vectors to a real score and declares
//! which direction of that score is "best". Scores are never normalized or
//! clamped; ranking only needs the declared order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};

/// Batches at least this large are scored on the rayon pool.
const PARALLEL_BATCH_THRESHOLD: usize = 1024;

/// Direction in which a metric's scores improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// Smaller scores are better (distances).
    Ascending,
    /// Larger scores are better (similarities).
    Descending,
}

impl ScoreOrder {
    /// Compare two scores so that `Ordering::Less` means `a` ranks ahead of `b`.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self {
            ScoreOrder::Ascending => a.total_cmp(&b),
            ScoreOrder::Descending => b.total_cmp(&a),
        }
    }

    /// Whether score `a` is strictly better than score `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.compare(a, b) == Ordering::Less
    }
}

/// The closed set of metrics understood by the exact searcher.
///
/// `Euclidean` is the *squared* Euclidean distance: the sum of squared
/// component differences, without the final square root. It ranks
/// identically to the true distance but does not satisfy the triangle
/// inequality, so do not use raw scores as a metric space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean distance (host name `euc`).
    #[serde(rename = "euc")]
    Euclidean,
    /// Dot product, higher is more similar (host name `dot`).
    #[serde(rename = "dot")]
    DotProduct,
    /// Cosine similarity in [-1, 1] (host name `cos`).
    #[serde(rename = "cos")]
    Cosine,
}

impl DistanceMetric {
    /// All supported metrics.
    pub const ALL: [DistanceMetric; 3] = [
        DistanceMetric::Euclidean,
        DistanceMetric::DotProduct,
        DistanceMetric::Cosine,
    ];

    /// Score `a` against `b` under this metric.
    pub fn score(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::DotProduct => dot_product(a, b),
            DistanceMetric::Cosine => cosine_similarity(a, b),
        }
    }

    /// Ordering direction of this metric's scores.
    pub fn order(&self) -> ScoreOrder {
        match self {
            DistanceMetric::Euclidean => ScoreOrder::Ascending,
            DistanceMetric::DotProduct | DistanceMetric::Cosine => ScoreOrder::Descending,
        }
    }

    /// Short host-facing name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euc",
            DistanceMetric::DotProduct => "dot",
            DistanceMetric::Cosine => "cos",
        }
    }

    /// Parse a metric from its host name or a long alias.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "euc" | "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot" | "dot_product" | "inner_product" => Ok(DistanceMetric::DotProduct),
            "cos" | "cosine" => Ok(DistanceMetric::Cosine),
            _ => Err(XiphosError::unknown_metric(s)),
        }
    }

    /// Score one query against many vectors, in input order.
    pub fn batch_score(&self, query: &[f64], vectors: &[&[f64]]) -> Result<Vec<f64>> {
        if vectors.len() < PARALLEL_BATCH_THRESHOLD {
            return vectors
                .iter()
                .map(|v| self.score(query, v))
                .collect::<Result<Vec<_>>>();
        }

        vectors
            .par_iter()
            .map(|v| self.score(query, v))
            .collect::<Result<Vec<_>>>()
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = XiphosError;

    fn from_str(s: &str) -> Result<Self> {
        DistanceMetric::parse_str(s)
    }
}

fn check_lengths(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(XiphosError::incompatible_lengths(a.len(), b.len()));
    }
    Ok(())
}

/// Pass `score` through if finite; overflowing sums are an error, never a rank.
fn finite_score(metric: DistanceMetric, score: f64) -> Result<f64> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(XiphosError::score_overflow(format!(
            "{metric} score is not representable ({score})"
        )))
    }
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0f64, |m, x| m.max(x.abs()))
}

/// Squared Euclidean distance between `a` and `b`.
///
/// Fails with [`XiphosError::ScoreOverflow`] when the sum exceeds `f64::MAX`.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    check_lengths(a, b)?;
    let sum = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    finite_score(DistanceMetric::Euclidean, sum)
}

/// Dot product of `a` and `b`.
///
/// Fails with [`XiphosError::ScoreOverflow`] when the sum exceeds `f64::MAX`.
pub fn dot_product(a: &[f64], b: &[f64]) -> Result<f64> {
    check_lengths(a, b)?;
    let sum = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    finite_score(DistanceMetric::DotProduct, sum)
}

/// Cosine similarity of `a` and `b`.
///
/// Each vector is scaled by its largest absolute component first, so the
/// sums stay bounded by the dimension whatever the input magnitude.
///
/// Fails with [`XiphosError::UndefinedSimilarity`] when either vector has a
/// zero L2 norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    check_lengths(a, b)?;

    let (scale_a, scale_b) = (max_abs(a), max_abs(b));
    if scale_a == 0.0 || scale_b == 0.0 {
        return Err(XiphosError::undefined_similarity(
            "cosine similarity with a zero-norm vector",
        ));
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (x, y)| {
            let (x, y) = (x / scale_a, y / scale_b);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    finite_score(DistanceMetric::Cosine, dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn samples() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 2.0, 3.0],
            vec![-4.5, 0.25, 8.0],
            vec![1e3, -1e-3, 7.0],
            vec![0.1, 0.2, -0.3],
        ]
    }

    #[test]
    fn test_euclidean_properties() {
        let vs = samples();
        for a in &vs {
            assert_eq!(euclidean_distance(a, a).unwrap(), 0.0);
            for b in &vs {
                let ab = euclidean_distance(a, b).unwrap();
                let ba = euclidean_distance(b, a).unwrap();
                assert!(ab >= 0.0);
                assert_eq!(ab, ba);
            }
        }
    }

    #[test]
    fn test_euclidean_is_squared() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert_eq!(d, 25.0);
    }

    #[test]
    fn test_dot_product_symmetric() {
        let vs = samples();
        for a in &vs {
            for b in &vs {
                assert_eq!(dot_product(a, b).unwrap(), dot_product(b, a).unwrap());
            }
        }
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
    }

    #[test]
    fn test_cosine_bounds() {
        let vs: Vec<Vec<f64>> = samples().into_iter().skip(1).collect();
        for a in &vs {
            assert!((cosine_similarity(a, a).unwrap() - 1.0).abs() < EPS);
            for b in &vs {
                let c = cosine_similarity(a, b).unwrap();
                assert!((-1.0 - EPS..=1.0 + EPS).contains(&c), "{c} out of range");
            }
        }

        let opposite = cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]).unwrap();
        assert!((opposite + 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_zero_norm() {
        let err = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, XiphosError::UndefinedSimilarity(_)));

        let err = cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, XiphosError::UndefinedSimilarity(_)));
    }

    #[test]
    fn test_cosine_large_magnitudes_stay_finite() {
        let query = [1e200, 1.0];
        let rows = [[1e200, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let scores: Vec<f64> = rows
            .iter()
            .map(|r| cosine_similarity(&query, r).unwrap())
            .collect();

        for s in &scores {
            assert!(s.is_finite());
            assert!((-1.0 - EPS..=1.0 + EPS).contains(s));
        }
        assert!((scores[0] - 1.0).abs() < EPS);
        assert!(scores[0] >= scores[1]);
        assert!(scores[2] < 1e-100);

        let tiny = cosine_similarity(&[1e-300, 2e-300], &[2e-300, 4e-300]).unwrap();
        assert!((tiny - 1.0).abs() < EPS);
    }

    #[test]
    fn test_overflowing_scores_are_rejected() {
        let err = dot_product(&[1e200, -1e200], &[1e200, 1.0]).unwrap_err();
        assert!(matches!(err, XiphosError::ScoreOverflow(_)));

        let err = euclidean_distance(&[1e300], &[-1e300]).unwrap_err();
        assert!(matches!(err, XiphosError::ScoreOverflow(_)));

        // Large but representable stays a score.
        assert_eq!(dot_product(&[1e200, -1e200], &[1.0, 0.0]).unwrap(), 1e200);
    }

    #[test]
    fn test_scores_are_finite_for_finite_inputs() {
        let vs = samples();
        for metric in DistanceMetric::ALL {
            for a in &vs {
                for b in &vs {
                    match metric.score(a, b) {
                        Ok(score) => assert!(score.is_finite(), "{metric}: {score}"),
                        Err(e) => assert!(matches!(e, XiphosError::UndefinedSimilarity(_))),
                    }
                }
            }
        }
    }

    #[test]
    fn test_incompatible_lengths() {
        for metric in DistanceMetric::ALL {
            let err = metric.score(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
            match err {
                XiphosError::IncompatibleLengths { left, right } => {
                    assert_eq!((left, right), (3, 2));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_parse_metric_names() {
        assert_eq!(DistanceMetric::parse_str("euc").unwrap(), DistanceMetric::Euclidean);
        assert_eq!(DistanceMetric::parse_str("DOT").unwrap(), DistanceMetric::DotProduct);
        assert_eq!(DistanceMetric::parse_str("cos").unwrap(), DistanceMetric::Cosine);
        assert_eq!(
            "cosine".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Cosine
        );

        let err = DistanceMetric::parse_str("manhattan").unwrap_err();
        assert!(matches!(err, XiphosError::UnknownMetric(ref name) if name == "manhattan"));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_name_round_trips() {
        for metric in DistanceMetric::ALL {
            assert_eq!(DistanceMetric::parse_str(metric.name()).unwrap(), metric);
            assert_eq!(metric.to_string(), metric.name());
        }
    }

    #[test]
    fn test_score_order() {
        assert_eq!(DistanceMetric::Euclidean.order(), ScoreOrder::Ascending);
        assert_eq!(DistanceMetric::DotProduct.order(), ScoreOrder::Descending);
        assert_eq!(DistanceMetric::Cosine.order(), ScoreOrder::Descending);

        assert!(ScoreOrder::Ascending.is_better(1.0, 2.0));
        assert!(ScoreOrder::Descending.is_better(2.0, 1.0));
        assert!(!ScoreOrder::Ascending.is_better(1.0, 1.0));
        assert!(!ScoreOrder::Descending.is_better(1.0, 1.0));
    }

    #[test]
    fn test_batch_score_matches_single() {
        let query = vec![0.5; 8];
        let vectors: Vec<Vec<f64>> = (0..2000)
            .map(|i| (0..8).map(|j| ((i * 8 + j) as f64 * 0.01).sin()).collect())
            .collect();
        let refs: Vec<&[f64]> = vectors.iter().map(|v| v.as_slice()).collect();

        for metric in DistanceMetric::ALL {
            let batch = metric.batch_score(&query, &refs).unwrap();
            assert_eq!(batch.len(), refs.len());
            for (score, v) in batch.iter().zip(refs.iter()) {
                assert_eq!(*score, metric.score(&query, v).unwrap());
            }
        }
    }
}
