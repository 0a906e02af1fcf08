//! Bounded Top-K Selection
//!
//! Fixed-capacity min-selection over `(tuple id, distance)` pairs: after
//! any number of admissions the heap holds the k smallest distances seen,
//! with ties broken in favour of the earlier admission.
//!
//! Internally a max-heap of capacity k: a candidate only displaces the
//! current maximum, so admission is O(log k) and the common reject path
//! (candidate worse than the k-th best) is a single comparison.

use crate::record::TupleId;
use std::collections::BinaryHeap;

/// Wrapper for f64 that implements Ord for use in `BinaryHeap`.
/// NaN values are treated as greater than all other values, so a NaN
/// distance is always the first candidate displaced.
#[derive(Clone, Copy, PartialEq)]
struct OrdDistance(f64);

impl Eq for OrdDistance {}

impl PartialOrd for OrdDistance {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdDistance {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or_else(|| match (self.0.is_nan(), other.0.is_nan()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => unreachable!(),
            })
    }
}

/// One admitted pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnMatch {
    pub tuple_id: TupleId,
    pub distance: f64,
}

/// Heap entry ordered by (distance, admission sequence); the sequence
/// makes later arrivals compare greater on distance ties, so the earlier
/// admission survives eviction.
struct HeapEntry {
    distance: OrdDistance,
    seq: u64,
    tuple_id: TupleId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Bounded min-selection structure retaining the k smallest-distance pairs
/// admitted so far.
pub struct BoundedKnnHeap {
    capacity: usize,
    inner: BinaryHeap<HeapEntry>,
    admitted: u64,
}

impl BoundedKnnHeap {
    /// Create a heap retaining the `k` smallest pairs. `k` must be > 0.
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "top-k capacity must be positive");
        BoundedKnnHeap {
            capacity: k,
            inner: BinaryHeap::with_capacity(k + 1),
            admitted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Offer a pair. Amortised O(log k).
    pub fn insert(&mut self, tuple_id: TupleId, distance: f64) {
        let entry = HeapEntry {
            distance: OrdDistance(distance),
            seq: self.admitted,
            tuple_id,
        };
        self.admitted += 1;

        if self.inner.len() < self.capacity {
            self.inner.push(entry);
            return;
        }
        // The new entry carries the largest sequence number, so on a
        // distance tie it compares greater and is rejected, keeping the
        // earlier admission.
        if let Some(max) = self.inner.peek() {
            if entry.cmp(max) == std::cmp::Ordering::Less {
                self.inner.pop();
                self.inner.push(entry);
            }
        }
    }

    /// Current k-th best distance: candidates at or above this cannot be
    /// admitted once the heap is full.
    pub fn threshold(&self) -> Option<f64> {
        if self.inner.len() < self.capacity {
            None
        } else {
            self.inner.peek().map(|e| e.distance.0)
        }
    }

    /// Drain into ascending-distance order (index 0 is the closest match).
    pub fn into_sorted(self) -> Vec<KnnMatch> {
        self.inner
            .into_sorted_vec()
            .into_iter()
            .map(|e| KnnMatch {
                tuple_id: e.tuple_id,
                distance: e.distance.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: BoundedKnnHeap) -> Vec<(TupleId, f64)> {
        heap.into_sorted()
            .into_iter()
            .map(|m| (m.tuple_id, m.distance))
            .collect()
    }

    #[test]
    fn test_under_capacity_retains_everything() {
        let mut heap = BoundedKnnHeap::new(5);
        heap.insert(1, 3.0);
        heap.insert(2, 1.0);
        assert_eq!(heap.len(), 2);
        assert_eq!(drain(heap), vec![(2, 1.0), (1, 3.0)]);
    }

    #[test]
    fn test_keeps_exactly_k_smallest() {
        let mut heap = BoundedKnnHeap::new(3);
        for (id, d) in [(1, 5.0), (2, 1.0), (3, 4.0), (4, 2.0), (5, 3.0)] {
            heap.insert(id, d);
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(drain(heap), vec![(2, 1.0), (4, 2.0), (5, 3.0)]);
    }

    #[test]
    fn test_min_is_true_kth_smallest() {
        let mut heap = BoundedKnnHeap::new(2);
        let distances = [9.0, 7.0, 8.0, 1.0, 6.0, 2.0];
        for (i, d) in distances.iter().enumerate() {
            heap.insert(i as TupleId, *d);
        }
        let sorted = drain(heap);
        assert_eq!(sorted[0].1, 1.0);
        assert_eq!(sorted[1].1, 2.0);
    }

    #[test]
    fn test_tie_break_earlier_admission_wins() {
        let mut heap = BoundedKnnHeap::new(1);
        heap.insert(10, 2.0);
        heap.insert(20, 2.0);
        assert_eq!(drain(heap), vec![(10, 2.0)]);
    }

    #[test]
    fn test_tie_break_on_eviction_boundary() {
        let mut heap = BoundedKnnHeap::new(2);
        heap.insert(1, 1.0);
        heap.insert(2, 5.0);
        heap.insert(3, 5.0); // ties with 2, must not displace it
        assert_eq!(drain(heap), vec![(1, 1.0), (2, 5.0)]);
    }

    #[test]
    fn test_threshold_tracks_kth_best() {
        let mut heap = BoundedKnnHeap::new(2);
        assert_eq!(heap.threshold(), None);
        heap.insert(1, 4.0);
        assert_eq!(heap.threshold(), None);
        heap.insert(2, 2.0);
        assert_eq!(heap.threshold(), Some(4.0));
        heap.insert(3, 1.0);
        assert_eq!(heap.threshold(), Some(2.0));
    }

    #[test]
    fn test_nan_is_displaced_first() {
        let mut heap = BoundedKnnHeap::new(2);
        heap.insert(1, f64::NAN);
        heap.insert(2, 3.0);
        heap.insert(3, 1.0);
        assert_eq!(drain(heap), vec![(3, 1.0), (2, 3.0)]);
    }

    #[test]
    fn test_large_stream_matches_full_sort() {
        let mut heap = BoundedKnnHeap::new(10);
        let mut all: Vec<(TupleId, f64)> = (0..1000)
            .map(|i| (i as TupleId, ((i * 7919) % 1000) as f64))
            .collect();
        for (id, d) in &all {
            heap.insert(*id, *d);
        }
        all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let expected: Vec<f64> = all.iter().take(10).map(|(_, d)| *d).collect();
        let got: Vec<f64> = drain(heap).iter().map(|(_, d)| *d).collect();
        assert_eq!(got, expected);
    }
}
