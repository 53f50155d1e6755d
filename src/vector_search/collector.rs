//! Bounded top-k collection of scored candidates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A candidate with its distance (smaller is better).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoredCandidate {
    pub(crate) distance: f32,
    pub(crate) id: u64,
    pub(crate) position: usize,
}

impl PartialEq for ScoredCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredCandidate {}

impl PartialOrd for ScoredCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Best-first: smaller distance, then smaller id.
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keeps the best `capacity` candidates seen so far.
///
/// The heap's top is the worst retained candidate, so an incoming
/// candidate either evicts it or is dropped in O(log capacity) without
/// sorting the whole frontier.
#[derive(Debug)]
pub(crate) struct TopKCollector {
    capacity: usize,
    heap: BinaryHeap<ScoredCandidate>,
    total_seen: usize,
}

impl TopKCollector {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(4096) + 1),
            total_seen: 0,
        }
    }

    /// Offer a candidate.
    #[inline]
    pub(crate) fn collect(&mut self, distance: f32, id: u64, position: usize) {
        self.total_seen += 1;
        if self.capacity == 0 {
            return;
        }

        let candidate = ScoredCandidate {
            distance,
            id,
            position,
        };

        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek()
            && candidate < *worst
        {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    /// Number of candidates offered so far.
    pub(crate) fn total_seen(&self) -> usize {
        self.total_seen
    }

    /// Retained candidates, best first.
    pub(crate) fn into_sorted(self) -> Vec<ScoredCandidate> {
        self.heap.into_sorted_vec()
    }
}
