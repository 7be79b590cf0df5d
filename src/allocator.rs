//! Schema index allocation.
//!
//! New columns draw their schema index from three sources, tried in a fixed
//! order: removed indexes (when reuse is on), the reserved range, and
//! finally a split of the open tail. The last one needs the ordering list,
//! so the allocator only reports that the tail has to be split and the
//! column manager does the splitting.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Where a new schema index comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Reclaimed,
    Reserved,
    TailSplit,
}

/// Allocation order.
pub const PRIORITY: [IndexSource; 3] = [
    IndexSource::Reclaimed,
    IndexSource::Reserved,
    IndexSource::TailSplit,
];

/// Result of [`IndexAllocator::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    Index(IndexSource, i64),
    /// Nothing left in the cheaper sources; split the open tail.
    SplitTail,
}

/// `[next, end)` of the reserved range still to hand out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedRange {
    pub next: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default)]
pub struct IndexAllocator {
    reuse_removed: bool,
    removed: BTreeSet<i64>,
    reserved: ReservedRange,
}

impl IndexAllocator {
    pub fn new(reuse_removed: bool) -> Self {
        Self {
            reuse_removed,
            removed: BTreeSet::new(),
            reserved: ReservedRange::default(),
        }
    }

    pub fn with_state(reuse_removed: bool, removed: BTreeSet<i64>, reserved: ReservedRange) -> Self {
        Self {
            reuse_removed,
            removed,
            reserved,
        }
    }

    pub fn removed(&self) -> &BTreeSet<i64> {
        &self.removed
    }

    pub fn reserved(&self) -> ReservedRange {
        self.reserved
    }

    pub fn is_removed(&self, schema: i64) -> bool {
        self.removed.contains(&schema)
    }

    /// Extend the reserved range by `count` indexes starting at `start`.
    /// The range must stay contiguous.
    pub fn reserve(&mut self, start: i64, count: i64) -> bool {
        if count <= 0 {
            return false;
        }
        if self.reserved.end == 0 && self.reserved.next == 0 {
            self.reserved = ReservedRange {
                next: start,
                end: start,
            };
        }
        if self.reserved.end != start {
            return false;
        }
        self.reserved.end += count;
        true
    }

    /// Peek the source the next allocation would use.
    pub fn next_source(&self) -> IndexSource {
        PRIORITY
            .into_iter()
            .find(|source| self.available(*source))
            .unwrap_or(IndexSource::TailSplit)
    }

    fn available(&self, source: IndexSource) -> bool {
        match source {
            IndexSource::Reclaimed => self.reuse_removed && !self.removed.is_empty(),
            IndexSource::Reserved => self.reserved.next < self.reserved.end,
            IndexSource::TailSplit => true,
        }
    }

    /// Take the next index, or ask for a tail split.
    pub fn allocate(&mut self) -> Allocation {
        match self.next_source() {
            IndexSource::Reclaimed => match self.removed.pop_first() {
                Some(schema) => Allocation::Index(IndexSource::Reclaimed, schema),
                None => Allocation::SplitTail,
            },
            IndexSource::Reserved => {
                let schema = self.reserved.next;
                self.reserved.next += 1;
                Allocation::Index(IndexSource::Reserved, schema)
            }
            IndexSource::TailSplit => Allocation::SplitTail,
        }
    }

    /// Record a removed index.
    pub fn release(&mut self, schema: i64) {
        self.removed.insert(schema);
    }

    /// Take a specific removed index back out of the free list.
    pub fn reclaim(&mut self, schema: i64) -> bool {
        self.removed.remove(&schema)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut alloc = IndexAllocator::new(true);
        assert_eq!(alloc.allocate(), Allocation::SplitTail);

        assert!(alloc.reserve(0, 2));
        alloc.release(40);
        alloc.release(7);
        assert_eq!(alloc.allocate(), Allocation::Index(IndexSource::Reclaimed, 7));
        assert_eq!(alloc.allocate(), Allocation::Index(IndexSource::Reclaimed, 40));
        assert_eq!(alloc.allocate(), Allocation::Index(IndexSource::Reserved, 0));
        assert_eq!(alloc.allocate(), Allocation::Index(IndexSource::Reserved, 1));
        assert_eq!(alloc.allocate(), Allocation::SplitTail);
    }

    #[test]
    fn test_no_reuse_abandons_removed() {
        let mut alloc = IndexAllocator::new(false);
        alloc.release(3);
        assert_eq!(alloc.next_source(), IndexSource::TailSplit);
        assert!(alloc.is_removed(3));
        assert!(alloc.reclaim(3));
        assert!(!alloc.reclaim(3));
    }

    #[test]
    fn test_reserve_must_stay_contiguous() {
        let mut alloc = IndexAllocator::new(true);
        assert!(alloc.reserve(0, 10));
        assert!(alloc.reserve(10, 5));
        assert!(!alloc.reserve(20, 5));
        assert!(!alloc.reserve(15, 0));
        assert_eq!(alloc.reserved(), ReservedRange { next: 0, end: 15 });
    }
}
