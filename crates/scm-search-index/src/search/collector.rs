//! Permission-aware top-k collection.
//!
//! Each candidate's permission tag is read from the `_permission` fast column and checked
//! while collecting, so unpermitted documents never count and never occupy the window.
//! Checks are cached per distinct tag and segment. Only the best `window` candidates are
//! kept, ordered by score and then by document address.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
    sync::Arc,
};

use tantivy::{
    DocAddress, DocId, Score, SegmentOrdinal, SegmentReader,
    collector::{Collector, SegmentCollector},
    columnar::StrColumn,
};

use crate::{engine::PermissionCheck, schema::PERMISSION_FIELD, search::result::CountMode};

/// A retained candidate.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Relevance score.
    pub score: Score,
    /// Segment of the document.
    segment: SegmentOrdinal,
    /// Document within the segment.
    doc: DocId,
}

impl Candidate {
    /// Returns the document address.
    pub fn address(&self) -> DocAddress {
        DocAddress::new(self.segment, self.doc)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Greater means better: higher score, then earlier document.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| (other.segment, other.doc).cmp(&(self.segment, self.doc)))
    }
}

/// What the collector produced.
#[derive(Debug, Clone, Default)]
pub struct CollectedHits {
    /// Number of permitted matches.
    pub total: u64,
    /// Whether `total` is exact.
    pub exact: bool,
    /// Best permitted candidates, best first.
    pub top: Vec<Candidate>,
}

/// Collects the best permitted candidates.
pub struct PermissionCollector {
    /// Permission capability of the searching principal.
    permission: Arc<dyn PermissionCheck>,
    /// Number of candidates to keep.
    window: usize,
    /// Counting strictness.
    mode: CountMode,
}

impl PermissionCollector {
    /// Creates a collector keeping the best `window` candidates.
    pub fn new(permission: Arc<dyn PermissionCheck>, window: usize, mode: CountMode) -> Self {
        Self {
            permission,
            window,
            mode,
        }
    }
}

impl Collector for PermissionCollector {
    type Fruit = CollectedHits;
    type Child = PermissionSegmentCollector;

    fn for_segment(
        &self,
        segment_local_id: SegmentOrdinal,
        reader: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        let column = reader.fast_fields().str(PERMISSION_FIELD)?;
        Ok(PermissionSegmentCollector {
            segment: segment_local_id,
            column,
            permission: Arc::clone(&self.permission),
            cache: HashMap::new(),
            window: self.window,
            lower_bound: self.mode == CountMode::LowerBound && self.window > 0,
            heap: BinaryHeap::with_capacity(self.window + 1),
            total: 0,
            exact: true,
            scratch: String::new(),
        })
    }

    fn requires_scoring(&self) -> bool {
        true
    }

    fn merge_fruits(&self, fruits: Vec<CollectedHits>) -> tantivy::Result<CollectedHits> {
        let mut merged = CollectedHits {
            total: 0,
            exact: true,
            top: Vec::new(),
        };
        for fruit in fruits {
            merged.total += fruit.total;
            merged.exact &= fruit.exact;
            merged.top.extend(fruit.top);
        }
        merged.top.sort_by(|a, b| b.cmp(a));
        merged.top.truncate(self.window);
        Ok(merged)
    }
}

/// Per-segment state of [`PermissionCollector`].
pub struct PermissionSegmentCollector {
    /// Segment being collected.
    segment: SegmentOrdinal,
    /// Permission tags; `None` when no document of the segment has one.
    column: Option<StrColumn>,
    /// Permission capability.
    permission: Arc<dyn PermissionCheck>,
    /// Check results by tag ordinal.
    cache: HashMap<u64, bool>,
    /// Number of candidates to keep.
    window: usize,
    /// Whether hopeless candidates skip the permission check.
    lower_bound: bool,
    /// Best candidates so far, worst on top.
    heap: BinaryHeap<Reverse<Candidate>>,
    /// Permitted matches counted.
    total: u64,
    /// Whether every match was checked.
    exact: bool,
    /// Buffer for tag lookups.
    scratch: String,
}

impl PermissionSegmentCollector {
    /// Checks whether the principal may see `doc`.
    fn is_permitted(&mut self, doc: DocId) -> bool {
        let Some(column) = &self.column else {
            return true;
        };
        let Some(ord) = column.term_ords(doc).next() else {
            return true;
        };
        if let Some(&permitted) = self.cache.get(&ord) {
            return permitted;
        }
        self.scratch.clear();
        let permitted = match column.ord_to_str(ord, &mut self.scratch) {
            Ok(true) => self.permission.is_permitted(&self.scratch),
            _ => false,
        };
        self.cache.insert(ord, permitted);
        permitted
    }

    /// Whether a candidate can no longer enter a full window.
    fn is_hopeless(&self, candidate: &Candidate) -> bool {
        self.heap.len() >= self.window
            && self
                .heap
                .peek()
                .is_some_and(|Reverse(worst)| candidate <= worst)
    }
}

impl SegmentCollector for PermissionSegmentCollector {
    type Fruit = CollectedHits;

    fn collect(&mut self, doc: DocId, score: Score) {
        let candidate = Candidate {
            score,
            segment: self.segment,
            doc,
        };
        if self.lower_bound && self.is_hopeless(&candidate) {
            self.exact = false;
            return;
        }
        if !self.is_permitted(doc) {
            return;
        }
        self.total += 1;
        if self.window == 0 {
            return;
        }
        self.heap.push(Reverse(candidate));
        if self.heap.len() > self.window {
            self.heap.pop();
        }
    }

    fn harvest(self) -> CollectedHits {
        let mut top: Vec<Candidate> = self.heap.into_iter().map(|Reverse(c)| c).collect();
        top.sort_by(|a, b| b.cmp(a));
        CollectedHits {
            total: self.total,
            exact: self.exact,
            top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: Score, doc: DocId) -> Candidate {
        Candidate {
            score,
            segment: 0,
            doc,
        }
    }

    #[test]
    fn higher_score_ranks_first() {
        assert!(candidate(2.0, 5) > candidate(1.0, 1));
    }

    #[test]
    fn ties_prefer_earlier_documents() {
        assert!(candidate(1.0, 1) > candidate(1.0, 2));
        let later_segment = Candidate {
            score: 1.0,
            segment: 1,
            doc: 0,
        };
        assert!(candidate(1.0, 9) > later_segment);
    }

    #[test]
    fn merge_keeps_best_window() {
        let collector = PermissionCollector::new(Arc::new(|_: &str| true), 2, CountMode::Exact);
        let fruits = vec![
            CollectedHits {
                total: 2,
                exact: true,
                top: vec![candidate(3.0, 0), candidate(1.0, 1)],
            },
            CollectedHits {
                total: 1,
                exact: false,
                top: vec![Candidate {
                    score: 2.0,
                    segment: 1,
                    doc: 0,
                }],
            },
        ];
        let merged = collector.merge_fruits(fruits).unwrap();
        assert_eq!(merged.total, 3);
        assert!(!merged.exact);
        let scores: Vec<Score> = merged.top.iter().map(|c| c.score).collect();
        assert_eq!(scores, [3.0, 2.0]);
    }
}
