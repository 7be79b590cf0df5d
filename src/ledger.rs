//! Run-length ledger of hidden columns.
//!
//! Each entry says "`count` columns are hidden right after visible column
//! `after`" (`after = -1` means before the first column). Entries are kept
//! sorted by `after`, one per anchor, with positive counts. The ledger also
//! tracks the visible/hidden aggregates and a one-slot cache for cumulative
//! "hidden before view index" queries.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// One hidden run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenRange {
    /// View index of the visible column the run follows.
    pub after: i64,
    /// Number of hidden columns in the run.
    pub count: i64,
}

/// Serializable form of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub all: i64,
    pub visible: i64,
    pub hidden: i64,
    pub ranges: Vec<HiddenRange>,
}

/// Last answer of [`HiddenLedger::hidden_before`]: `entry` ranges lie
/// strictly before `view` and hold `count` columns.
#[derive(Debug, Clone, Copy)]
struct CountCache {
    view: i64,
    entry: usize,
    count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct HiddenLedger {
    ranges: Vec<HiddenRange>,
    visible: i64,
    hidden: i64,
    cache: Cell<Option<CountCache>>,
}

impl HiddenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> i64 {
        self.visible
    }

    pub fn hidden(&self) -> i64 {
        self.hidden
    }

    pub fn all(&self) -> i64 {
        self.visible + self.hidden
    }

    pub fn ranges(&self) -> &[HiddenRange] {
        &self.ranges
    }

    /// Length of the run after `after`, 0 when there is none.
    pub fn run_at(&self, after: i64) -> i64 {
        self.position(after)
            .ok()
            .and_then(|idx| self.ranges.get(idx))
            .map_or(0, |r| r.count)
    }

    fn position(&self, after: i64) -> std::result::Result<usize, usize> {
        self.ranges.binary_search_by_key(&after, |r| r.after)
    }

    /// Index of the first range whose anchor is `>= after`.
    fn lower_bound(&self, after: i64) -> usize {
        self.ranges.partition_point(|r| r.after < after)
    }

    /// Forget the cached count if it covers views past `bound`; ranges
    /// anchored at or after `bound` are about to change.
    fn invalidate_after(&self, bound: i64) {
        if let Some(cache) = self.cache.get() {
            if cache.view > bound {
                self.cache.set(None);
            }
        }
    }

    /// Grow the visible count to include `view_index`. Returns the growth.
    pub fn extend(&mut self, view_index: i64) -> i64 {
        let grown = (view_index + 1 - self.visible).max(0);
        self.visible += grown;
        grown
    }

    /// Shrink the visible count to `visible`, dropping runs that follow a
    /// truncated column. Returns the number of hidden columns dropped.
    pub fn truncate(&mut self, visible: i64) -> i64 {
        let visible = visible.clamp(0, self.visible);
        self.invalidate_after(visible);
        let cut = self.lower_bound(visible);
        let dropped: i64 = self.ranges.drain(cut..).map(|r| r.count).sum();
        self.visible = visible;
        self.hidden -= dropped;
        dropped
    }

    /// Hide up to `count` visible columns after `after`, merging every run
    /// they touch. Returns the number of visible columns hidden, or `None`
    /// when `count <= 0`.
    pub fn hide(&mut self, after: i64, count: i64) -> Option<i64> {
        if count <= 0 {
            return None;
        }
        let after = after.max(-1);
        let count = count.min((self.visible - 1 - after).max(0));
        if count == 0 {
            return Some(0);
        }
        self.invalidate_after(after);

        let lo = self.lower_bound(after);
        let hi = self.lower_bound(after + count + 1);
        let merged: i64 = self
            .ranges
            .get(lo..hi)
            .map_or(0, |runs| runs.iter().map(|r| r.count).sum());
        self.ranges.splice(
            lo..hi,
            std::iter::once(HiddenRange {
                after,
                count: merged + count,
            }),
        );
        for range in self.ranges.iter_mut().skip(lo + 1) {
            range.after -= count;
        }

        self.visible -= count;
        self.hidden += count;
        Some(count)
    }

    /// Unhide `count` columns starting `offset` into the run after `after`.
    /// Columns before the slice stay hidden at `after`; columns past it
    /// become a run after the last unhidden column. Returns the number
    /// unhidden, or `None` when there is no such run or slice.
    pub fn unhide(&mut self, after: i64, offset: i64, count: i64) -> Option<i64> {
        if count <= 0 || offset < 0 {
            return None;
        }
        let idx = self.position(after).ok()?;
        let run = self.ranges.get(idx)?.count;
        if offset >= run {
            return None;
        }
        let count = count.min(run - offset);
        let right = run - offset - count;
        self.invalidate_after(after);

        for range in self.ranges.iter_mut().skip(idx + 1) {
            range.after += count;
        }
        let mut next = idx + 1;
        if offset > 0 {
            if let Some(range) = self.ranges.get_mut(idx) {
                range.count = offset;
            }
        } else {
            self.ranges.remove(idx);
            next = idx;
        }
        if right > 0 {
            self.ranges.insert(
                next,
                HiddenRange {
                    after: after + count,
                    count: right,
                },
            );
        }

        self.visible += count;
        self.hidden -= count;
        Some(count)
    }

    /// Account for one new column placed after visible column `after`.
    ///
    /// A hidden column joins the run at `after`. A visible one takes view
    /// index `after + 1`; the first `run_offset` columns of the run at
    /// `after` stay there and the rest now follow the new column.
    pub fn insert(&mut self, after: i64, hidden: bool, run_offset: i64) {
        self.invalidate_after(after);
        if hidden {
            match self.position(after) {
                Ok(idx) => {
                    if let Some(range) = self.ranges.get_mut(idx) {
                        range.count += 1;
                    }
                }
                Err(idx) => self.ranges.insert(idx, HiddenRange { after, count: 1 }),
            }
            self.hidden += 1;
            return;
        }

        let later = self.lower_bound(after + 1);
        for range in self.ranges.iter_mut().skip(later) {
            range.after += 1;
        }
        if let Ok(idx) = self.position(after) {
            let run = self.ranges.get(idx).map_or(0, |r| r.count);
            let keep = run_offset.clamp(0, run);
            let moved = run - keep;
            if keep == 0 {
                if let Some(range) = self.ranges.get_mut(idx) {
                    range.after = after + 1;
                }
            } else if moved > 0 {
                if let Some(range) = self.ranges.get_mut(idx) {
                    range.count = keep;
                }
                self.ranges.insert(
                    idx + 1,
                    HiddenRange {
                        after: after + 1,
                        count: moved,
                    },
                );
            }
        }
        self.visible += 1;
    }

    /// Account for one removed column. For a hidden column `at` is the
    /// anchor of its run; for a visible one it is the column's view index,
    /// and its trailing run merges into the previous column's.
    pub fn remove(&mut self, at: i64, hidden: bool) -> bool {
        if hidden {
            let Ok(idx) = self.position(at) else {
                return false;
            };
            self.invalidate_after(at);
            let emptied = self.ranges.get_mut(idx).is_some_and(|range| {
                range.count -= 1;
                range.count == 0
            });
            if emptied {
                self.ranges.remove(idx);
            }
            self.hidden -= 1;
            return true;
        }

        if at < 0 || at >= self.visible {
            return false;
        }
        self.invalidate_after(at - 1);
        let own = match self.position(at) {
            Ok(idx) => self.ranges.remove(idx).count,
            Err(_) => 0,
        };
        let later = self.lower_bound(at + 1);
        for range in self.ranges.iter_mut().skip(later) {
            range.after -= 1;
        }
        if own > 0 {
            match self.position(at - 1) {
                Ok(idx) => {
                    if let Some(range) = self.ranges.get_mut(idx) {
                        range.count += own;
                    }
                }
                Err(idx) => self.ranges.insert(
                    idx,
                    HiddenRange {
                        after: at - 1,
                        count: own,
                    },
                ),
            }
        }
        self.visible -= 1;
        true
    }

    /// Move the visible span `[view, view + count)` so it follows column
    /// `after`. Runs anchored inside the span travel with it; runs between
    /// the span and the target shift by `count`.
    pub fn reorder(&mut self, view: i64, count: i64, after: i64) -> bool {
        if count <= 0 || view < 0 || view + count > self.visible {
            return false;
        }
        if after < -1 || after >= self.visible {
            return false;
        }
        let end = view + count - 1;
        if (view - 1..=end).contains(&after) {
            return false;
        }

        let forward = after > end;
        let (lo, hi) = if forward { (view, after) } else { (after + 1, end) };
        let shift = if forward { after - end } else { after + 1 - view };
        self.invalidate_after(lo);

        let first = self.lower_bound(lo);
        let last = self.lower_bound(hi + 1);
        if let Some(window) = self.ranges.get_mut(first..last) {
            for range in window.iter_mut() {
                if (view..=end).contains(&range.after) {
                    range.after += shift;
                } else if forward {
                    range.after -= count;
                } else {
                    range.after += count;
                }
            }
            window.sort_by_key(|r| r.after);
        }
        true
    }

    /// Hidden columns strictly before visible column `view`. Walks from
    /// the cached position of the previous query.
    pub fn hidden_before(&self, view: i64) -> i64 {
        let start = self.cache.get().unwrap_or(CountCache {
            view: -1,
            entry: 0,
            count: 0,
        });
        let (mut entry, mut count) = (start.entry, start.count);
        if view >= start.view {
            while let Some(range) = self.ranges.get(entry) {
                if range.after >= view {
                    break;
                }
                count += range.count;
                entry += 1;
            }
        } else {
            while let Some(range) = entry.checked_sub(1).and_then(|i| self.ranges.get(i)) {
                if range.after < view {
                    break;
                }
                count -= range.count;
                entry -= 1;
            }
        }
        if entry.abs_diff(start.entry) > 0 {
            tracing::trace!(
                from = start.view,
                to = view,
                stepped = entry.abs_diff(start.entry),
                "hidden_before walk"
            );
        }
        self.cache.set(Some(CountCache { view, entry, count }));
        count
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            all: self.all(),
            visible: self.visible,
            hidden: self.hidden,
            ranges: self.ranges.clone(),
        }
    }

    /// Rebuild from a snapshot, rejecting unsorted, empty or out-of-range
    /// runs and aggregates that do not add up.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Option<Self> {
        let LedgerSnapshot {
            all,
            visible,
            hidden,
            ranges,
        } = snapshot;
        if *visible < 0 || *all != visible + hidden {
            return None;
        }
        let mut prev = i64::MIN;
        let mut sum = 0;
        for range in ranges {
            if range.after <= prev || range.after < -1 || range.after >= *visible {
                return None;
            }
            if range.count <= 0 {
                return None;
            }
            prev = range.after;
            sum += range.count;
        }
        (sum == *hidden).then(|| Self {
            ranges: ranges.clone(),
            visible: *visible,
            hidden: *hidden,
            cache: Cell::new(None),
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ledger(visible: i64) -> HiddenLedger {
        let mut ledger = HiddenLedger::new();
        ledger.extend(visible - 1);
        ledger
    }

    fn runs(ledger: &HiddenLedger) -> Vec<(i64, i64)> {
        ledger.ranges().iter().map(|r| (r.after, r.count)).collect()
    }

    #[test]
    fn test_hide_clamps_and_counts() {
        let mut l = ledger(10);
        assert_eq!(l.hide(7, 5), Some(2));
        assert_eq!(runs(&l), vec![(7, 2)]);
        assert_eq!((l.visible(), l.hidden(), l.all()), (8, 2, 10));
        assert_eq!(l.hide(7, 1), Some(0));
        assert_eq!(l.hide(0, 0), None);
    }

    #[test]
    fn test_hide_merges_touched_runs() {
        let mut l = ledger(10);
        l.hide(2, 1); // column 3
        l.hide(4, 2); // views 5 and 6
        assert_eq!(runs(&l), vec![(2, 1), (4, 2)]);
        // hide columns at views 3 and 4: both runs merge into the one at 2
        assert_eq!(l.hide(2, 2), Some(2));
        assert_eq!(runs(&l), vec![(2, 5)]);
        assert_eq!((l.visible(), l.hidden()), (5, 5));
    }

    #[test]
    fn test_hide_shifts_later_runs() {
        let mut l = ledger(10);
        l.hide(8, 1);
        l.hide(1, 3);
        assert_eq!(runs(&l), vec![(1, 3), (5, 1)]);
    }

    #[test]
    fn test_unhide_splits_run() {
        let mut l = ledger(10);
        l.hide(1, 5);
        l.hide(3, 1);
        assert_eq!(runs(&l), vec![(1, 5), (3, 1)]);
        assert_eq!(l.unhide(1, 1, 2), Some(2));
        assert_eq!(runs(&l), vec![(1, 1), (3, 2), (5, 1)]);
        assert_eq!((l.visible(), l.hidden()), (6, 4));
    }

    #[test]
    fn test_unhide_whole_run_removes_entry() {
        let mut l = ledger(100);
        l.hide(-1, 100);
        assert_eq!(runs(&l), vec![(-1, 100)]);
        assert_eq!(l.unhide(-1, 0, 100), Some(100));
        assert!(l.ranges().is_empty());
        assert_eq!(l.hidden(), 0);
    }

    #[test_case(4, 0, 1 ; "no run at anchor")]
    #[test_case(1, 3, 1 ; "offset past run")]
    #[test_case(1, 0, 0 ; "empty count")]
    #[test_case(1, -1, 1 ; "negative offset")]
    fn test_unhide_invalid(after: i64, offset: i64, count: i64) {
        let mut l = ledger(10);
        l.hide(1, 3);
        assert_eq!(l.unhide(after, offset, count), None);
        assert_eq!(runs(&l), vec![(1, 3)]);
    }

    #[test]
    fn test_insert_visible_splits_run() {
        let mut l = ledger(6);
        l.hide(1, 3);
        l.insert(1, false, 1);
        assert_eq!(runs(&l), vec![(1, 1), (2, 2)]);
        l.insert(-1, false, 0);
        assert_eq!(runs(&l), vec![(2, 1), (3, 2)]);
        assert_eq!((l.visible(), l.hidden()), (5, 3));
    }

    #[test]
    fn test_insert_visible_moves_whole_run() {
        let mut l = ledger(6);
        l.hide(1, 2);
        l.insert(1, false, 0);
        assert_eq!(runs(&l), vec![(2, 2)]);
        l.insert(2, false, 2);
        assert_eq!(runs(&l), vec![(2, 2)]);
    }

    #[test]
    fn test_insert_and_remove_hidden() {
        let mut l = ledger(4);
        l.insert(0, true, 0);
        l.insert(0, true, 0);
        assert_eq!(runs(&l), vec![(0, 2)]);
        assert!(l.remove(0, true));
        assert!(l.remove(0, true));
        assert!(l.ranges().is_empty());
        assert!(!l.remove(0, true));
        assert_eq!(l.all(), 4);
    }

    #[test]
    fn test_remove_visible_merges_runs() {
        let mut l = ledger(8);
        l.hide(0, 1); // run at 0
        l.hide(1, 1); // run at 1
        assert_eq!(runs(&l), vec![(0, 1), (1, 1)]);
        assert!(l.remove(1, false));
        assert_eq!(runs(&l), vec![(0, 2)]);
        assert_eq!((l.visible(), l.hidden()), (5, 2));
        assert!(!l.remove(5, false));
    }

    #[test]
    fn test_reorder_forward_and_back() {
        let mut l = ledger(10);
        l.hide(1, 1); // after 1
        l.hide(3, 1); // after 3
        l.hide(6, 1); // after 6
        let before = runs(&l);
        assert_eq!(before, vec![(1, 1), (3, 1), (6, 1)]);

        // move views 2..=3 after 5
        assert!(l.reorder(2, 2, 5));
        assert_eq!(runs(&l), vec![(1, 1), (5, 1), (6, 1)]);

        // and back: the span now starts at 4, put it after 1
        assert!(l.reorder(4, 2, 1));
        assert_eq!(runs(&l), before);
    }

    #[test]
    fn test_reorder_backward() {
        let mut l = ledger(8);
        l.hide(0, 1); // after 0
        l.hide(4, 1); // after 4
        assert!(l.reorder(4, 2, 0));
        assert_eq!(runs(&l), vec![(0, 1), (1, 1)]);
    }

    #[test_case(2, 2, 1 ; "target right before span")]
    #[test_case(2, 2, 3 ; "target inside span")]
    #[test_case(2, 0, 5 ; "empty span")]
    #[test_case(5, 2, 1 ; "span past visible")]
    fn test_reorder_rejects(view: i64, count: i64, after: i64) {
        let mut l = ledger(6);
        assert!(!l.reorder(view, count, after));
    }

    #[test]
    fn test_hidden_before_is_monotonic_and_cached() {
        let mut l = ledger(20);
        l.hide(-1, 2);
        l.hide(3, 1);
        l.hide(6, 4);
        let counts: Vec<i64> = (0..l.visible()).map(|v| l.hidden_before(v)).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(l.hidden_before(0), 2);
        assert_eq!(l.hidden_before(4), 3);
        assert_eq!(l.hidden_before(7), 7);
        // walking backwards from a warm cache
        assert_eq!(l.hidden_before(3), 2);
        assert_eq!(l.hidden_before(12), 7);
    }

    #[test]
    fn test_cache_survives_mutation_above_it() {
        let mut l = ledger(20);
        l.hide(2, 1);
        assert_eq!(l.hidden_before(3), 1);
        l.hide(10, 2);
        assert_eq!(l.hidden_before(3), 1);
        assert_eq!(l.hidden_before(11), 3);
        l.remove(0, false);
        assert_eq!(l.hidden_before(2), 1);
    }

    #[test]
    fn test_truncate_drops_runs_past_visible() {
        let mut l = ledger(10);
        l.hide(2, 1);
        l.hide(5, 1);
        l.hide(6, 1);
        assert_eq!(runs(&l), vec![(2, 1), (5, 1), (6, 1)]);
        assert_eq!(l.truncate(6), 1);
        assert_eq!(runs(&l), vec![(2, 1), (5, 1)]);
        assert_eq!((l.visible(), l.hidden()), (6, 2));
    }

    #[test]
    fn test_snapshot_validation() {
        let mut l = ledger(5);
        l.hide(1, 2);
        let snap = l.snapshot();
        let restored = HiddenLedger::from_snapshot(&snap).unwrap();
        assert_eq!(restored.ranges(), l.ranges());

        let mut broken = snap.clone();
        broken.hidden = 3;
        assert!(HiddenLedger::from_snapshot(&broken).is_none());

        let mut broken = snap;
        broken.ranges.push(HiddenRange { after: 0, count: 1 });
        broken.hidden += 1;
        broken.all += 1;
        assert!(HiddenLedger::from_snapshot(&broken).is_none());
    }
}
