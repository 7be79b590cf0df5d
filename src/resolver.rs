//! View index to schema index resolution.
//!
//! A walk along the visible chain, started from whichever is closer: the
//! head or the node reached by the previous resolution. Anything at or past
//! the open tail is plain arithmetic.
//!
//! The cache has no hooks into the list. Whoever mutates the list structure
//! must call [`Resolver::invalidate`] before the next resolution.

use std::cell::Cell;

use crate::list::{NodeId, NodeKind, OrderingList};

/// Outcome of resolving one view index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub schema_index: i64,
    /// The node standing at the view index; the open tail when the index
    /// falls inside its run, the head for negative indexes.
    pub node: NodeId,
    /// Position inside the open tail run, when `node` is the open tail.
    pub tail_offset: Option<i64>,
}

/// A visible node and its view index (the first view of the run for the
/// open tail).
#[derive(Debug, Clone, Copy)]
struct Cursor {
    view: i64,
    node: NodeId,
}

#[derive(Debug, Default)]
pub struct Resolver {
    last: Cell<Option<Cursor>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached position. Required after any structural change.
    pub fn invalidate(&self) {
        self.last.set(None);
    }

    pub fn resolve(&self, list: &OrderingList, view_index: i64) -> Resolved {
        if view_index < 0 {
            return Resolved {
                schema_index: -1,
                node: list.head(),
                tail_offset: None,
            };
        }
        let first = list.first();
        if list.kind(first) == NodeKind::OpenTail {
            return Self::finish(list, Cursor { view: 0, node: first }, view_index);
        }
        let cursor = self.walk(list, view_index);
        Self::finish(list, cursor, view_index)
    }

    /// Schema indexes of `count` consecutive columns from `view_index`.
    pub fn resolve_multi(&self, list: &OrderingList, view_index: i64, count: i64) -> Vec<i64> {
        let mut out = Vec::new();
        if count <= 0 {
            return out;
        }
        let start = self.resolve(list, view_index);
        out.push(start.schema_index);

        let mut cursor = Cursor {
            view: (view_index - start.tail_offset.unwrap_or(0)).max(-1),
            node: start.node,
        };
        for view in view_index + 1..view_index + count {
            if view < 0 {
                out.push(-1);
                continue;
            }
            if list.kind(cursor.node) != NodeKind::OpenTail {
                if let Some(next) = list.next(cursor.node) {
                    cursor = Cursor {
                        view: cursor.view + 1,
                        node: next,
                    };
                }
            }
            out.push(Self::finish(list, cursor, view).schema_index);
        }
        if view_index >= 0 {
            self.last.set(Some(cursor));
        }
        out
    }

    /// Walk to `target` from the cheaper of the head and the cached cursor.
    fn walk(&self, list: &OrderingList, target: i64) -> Cursor {
        let head = Cursor {
            view: -1,
            node: list.head(),
        };
        let mut cur = match self.last.get() {
            Some(last) if list.kind(last.node) == NodeKind::OpenTail && target >= last.view => last,
            Some(last) if last.view.abs_diff(target) < head.view.abs_diff(target) => last,
            _ => head,
        };
        let from = cur.view;

        while cur.view < target && list.kind(cur.node) != NodeKind::OpenTail {
            let Some(next) = list.next(cur.node) else {
                break;
            };
            cur = Cursor {
                view: cur.view + 1,
                node: next,
            };
        }
        while cur.view > target {
            let Some(prev) = list.prev(cur.node) else {
                break;
            };
            cur = Cursor {
                view: cur.view - 1,
                node: prev,
            };
        }

        tracing::trace!(from, to = cur.view, target, "resolver walk");
        self.last.set(Some(cur));
        cur
    }

    fn finish(list: &OrderingList, cursor: Cursor, view_index: i64) -> Resolved {
        if list.kind(cursor.node) == NodeKind::OpenTail {
            let offset = view_index - cursor.view;
            Resolved {
                schema_index: list.tail_base() + offset,
                node: cursor.node,
                tail_offset: Some(offset),
            }
        } else {
            Resolved {
                schema_index: list.schema(cursor.node),
                node: cursor.node,
                tail_offset: None,
            }
        }
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

    /// `[-1, 5, 3, 9, 20+]`
    fn sample() -> OrderingList {
        let mut list = OrderingList::new(20);
        for schema in [5, 3, 9] {
            let id = list.create(schema);
            list.append(id);
        }
        list
    }

    #[test]
    fn test_untouched_list_is_arithmetic() {
        let list = OrderingList::new(100);
        let resolver = Resolver::new();
        let r = resolver.resolve(&list, 42);
        assert_eq!(r.schema_index, 142);
        assert_eq!(r.tail_offset, Some(42));
        assert_eq!(resolver.resolve(&list, -1).schema_index, -1);
    }

    #[test]
    fn test_walks_concrete_nodes_then_tail() {
        let list = sample();
        let resolver = Resolver::new();
        let got: Vec<i64> = (0..6).map(|v| resolver.resolve(&list, v).schema_index).collect();
        assert_eq!(got, vec![5, 3, 9, 20, 21, 22]);
        assert_eq!(resolver.resolve(&list, 5).tail_offset, Some(2));
    }

    #[test]
    fn test_random_order_matches_fresh_resolver() {
        let list = sample();
        let warm = Resolver::new();
        for v in [4, 0, 2, 1, 7, 3, 0, 2] {
            let fresh = Resolver::new().resolve(&list, v);
            assert_eq!(warm.resolve(&list, v), fresh, "view {v}");
        }
    }

    #[test]
    fn test_resolve_multi_crosses_into_tail() {
        let list = sample();
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_multi(&list, 1, 5), vec![3, 9, 20, 21, 22]);
        assert_eq!(resolver.resolve_multi(&list, 10, 2), vec![27, 28]);
        assert!(resolver.resolve_multi(&list, 0, 0).is_empty());
        // cursor left on the tail must still answer earlier views
        assert_eq!(resolver.resolve(&list, 0).schema_index, 5);
    }

    #[test]
    fn test_invalidate_after_structural_change() {
        let mut list = sample();
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve(&list, 2).schema_index, 9);
        let first = list.first();
        list.unlink(first);
        list.release(first);
        resolver.invalidate();
        assert_eq!(resolver.resolve(&list, 2).schema_index, 20);
        assert_eq!(resolver.resolve(&list, 0).schema_index, 3);
    }
}
