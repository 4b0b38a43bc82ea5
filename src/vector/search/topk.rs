//! Bounded best-k selection.
//!
//! [`TopKSelector`] keeps the best `k` candidates seen so far in a max-heap
//! whose top is the worst candidate held, so each offer costs `O(log k)`.
//!
//! Ties on score are broken by [`ScanPosition`]: the candidate that appears
//! earlier in the scan ranks first. Because the position is part of the
//! comparison key, the selected set and its order do not depend on the order
//! in which candidates are offered. Merging per-file selectors therefore
//! yields exactly the result of a sequential scan.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::vector::core::distance::ScoreOrder;

/// Position of a candidate in the column scan: file first, then row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanPosition {
    /// Index of the file in the column's file list.
    pub file_index: usize,
    /// Row index within that file.
    pub row_index: u64,
}

impl ScanPosition {
    /// Create a position.
    pub fn new(file_index: usize, row_index: u64) -> Self {
        Self {
            file_index,
            row_index,
        }
    }
}

/// A scored candidate carrying an arbitrary payload.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    /// Metric score against the query.
    pub score: f64,
    /// Tie-break key.
    pub position: ScanPosition,
    /// Whatever the caller wants back (vector, origin, ...).
    pub payload: T,
}

impl<T> Candidate<T> {
    /// Create a candidate.
    pub fn new(score: f64, position: ScanPosition, payload: T) -> Self {
        Self {
            score,
            position,
            payload,
        }
    }
}

/// Heap entry; `Ordering::Greater` means "ranks worse".
struct Ranked<T> {
    order: ScoreOrder,
    candidate: Candidate<T>,
}

impl<T> Ranked<T> {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.order
            .compare(self.candidate.score, other.candidate.score)
            .then_with(|| self.candidate.position.cmp(&other.candidate.position))
    }
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank_cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank_cmp(other)
    }
}

/// Keeps the best `k` candidates under a score order.
pub struct TopKSelector<T> {
    k: usize,
    order: ScoreOrder,
    heap: BinaryHeap<Ranked<T>>,
}

impl<T> TopKSelector<T> {
    /// Create a selector holding at most `k` candidates.
    pub fn new(k: usize, order: ScoreOrder) -> Self {
        Self {
            k,
            order,
            // Avoid reserving for absurd k values supplied by the host.
            heap: BinaryHeap::with_capacity(k.min(4096)),
        }
    }

    /// Maximum number of candidates held.
    pub fn capacity(&self) -> usize {
        self.k
    }

    /// Score order used for ranking.
    pub fn order(&self) -> ScoreOrder {
        self.order
    }

    /// Number of candidates currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no candidate is held.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Score of the worst candidate held, if any.
    pub fn worst_score(&self) -> Option<f64> {
        self.heap.peek().map(|r| r.candidate.score)
    }

    /// Offer a candidate. Returns whether it was kept.
    ///
    /// While fewer than `k` candidates are held the candidate is always kept.
    /// Afterwards it replaces the worst held candidate only if it is strictly
    /// better under (score, scan position).
    pub fn offer(&mut self, candidate: Candidate<T>) -> bool {
        if self.k == 0 {
            return false;
        }

        let entry = Ranked {
            order: self.order,
            candidate,
        };

        if self.heap.len() < self.k {
            self.heap.push(entry);
            return true;
        }

        let Some(mut worst) = self.heap.peek_mut() else {
            return false;
        };
        if entry.rank_cmp(&worst) == Ordering::Less {
            trace!(
                "replacing score {} with {}",
                worst.candidate.score, entry.candidate.score
            );
            *worst = entry;
            true
        } else {
            false
        }
    }

    /// Offer every candidate held by `other`.
    pub fn merge(&mut self, other: TopKSelector<T>) {
        for ranked in other.heap.into_vec() {
            self.offer(ranked.candidate);
        }
    }

    /// Consume the selector, returning its candidates best-first.
    pub fn drain(self) -> Vec<Candidate<T>> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| r.candidate)
            .collect()
    }
}

impl<T> std::fmt::Debug for TopKSelector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopKSelector")
            .field("k", &self.k)
            .field("order", &self.order)
            .field("len", &self.heap.len())
            .finish()
    }
}
