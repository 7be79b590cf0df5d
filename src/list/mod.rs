//! Compressed ordering list.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The visible
//! chain runs from the head sentinel (schema index -1) to the open tail, a
//! single node standing for the unbounded run `base, base + 1, ...` of
//! columns nobody has touched individually. Hidden columns hang off the
//! visible node that precedes them, in a private side chain, so they keep
//! their place without occupying a view index.
//!
//! Operations never panic on bad offsets; they return `None` (or do
//! nothing) and leave validation to the column manager.

mod tokens;

pub use tokens::{ListToken, NodeFlags};

use std::cell::Cell;
use std::collections::HashMap;

/// Arena slot of a list node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Sentinel at view index -1. Never removed.
    Head,
    /// A single materialized column.
    Column,
    /// The unbounded run of untouched columns. Always last.
    OpenTail,
}

/// Where a schema index currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// A node of the visible chain (the head for schema index -1).
    Visible(NodeId),
    /// A hidden node, `offset` positions into the chain of `owner`.
    Hidden {
        owner: NodeId,
        node: NodeId,
        offset: usize,
    },
    /// Implicit column `offset` positions into the open tail.
    Tail { offset: i64 },
}

#[derive(Debug, Clone)]
struct Node {
    schema: i64,
    kind: NodeKind,
    /// Visible chain links, or side-chain links for hidden nodes.
    prev: Option<NodeId>,
    next: Option<NodeId>,
    /// First node of this node's hide chain.
    hide: Option<NodeId>,
    /// Visible node whose hide chain holds this node.
    owner: Option<NodeId>,
    /// Last node of `hide`, trusted only while the generation matches.
    hide_tail: Cell<Option<(u64, NodeId)>>,
}

impl Node {
    fn new(schema: i64, kind: NodeKind) -> Self {
        Self {
            schema,
            kind,
            prev: None,
            next: None,
            hide: None,
            owner: None,
            hide_tail: Cell::new(None),
        }
    }
}

/// Doubly-linked column order with hidden side chains and an open tail.
#[derive(Debug, Clone)]
pub struct OrderingList {
    nodes: Vec<Node>,
    vacant: Vec<NodeId>,
    head: NodeId,
    tail: NodeId,
    by_schema: HashMap<i64, NodeId>,
    /// Bumped on every structural change.
    generation: u64,
}

impl OrderingList {
    /// Create `[-1, base+]`: the head followed directly by the open tail.
    pub fn new(base: i64) -> Self {
        let mut list = Self {
            nodes: Vec::new(),
            vacant: Vec::new(),
            head: NodeId(0),
            tail: NodeId(0),
            by_schema: HashMap::new(),
            generation: 0,
        };
        list.head = list.alloc(-1, NodeKind::Head);
        list.tail = list.alloc(base, NodeKind::OpenTail);
        let (head, tail) = (list.head, list.tail);
        list.node_mut(head).next = Some(tail);
        list.node_mut(tail).prev = Some(head);
        list
    }

    #[allow(clippy::indexing_slicing)]
    fn node(&self, id: NodeId) -> &Node {
        // ids are only minted by `alloc`
        &self.nodes[id.0]
    }

    #[allow(clippy::indexing_slicing)]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn alloc(&mut self, schema: i64, kind: NodeKind) -> NodeId {
        let node = Node::new(schema, kind);
        let id = match self.vacant.pop() {
            Some(id) => {
                *self.node_mut(id) = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        if kind == NodeKind::Column {
            self.by_schema.insert(schema, id);
        }
        id
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Create a detached column node for `schema`.
    pub fn create(&mut self, schema: i64) -> NodeId {
        self.alloc(schema, NodeKind::Column)
    }

    /// Return a detached node's slot to the arena.
    pub fn release(&mut self, id: NodeId) {
        let schema = self.node(id).schema;
        if self.by_schema.get(&schema) == Some(&id) {
            self.by_schema.remove(&schema);
        }
        *self.node_mut(id) = Node::new(i64::MIN, NodeKind::Column);
        self.vacant.push(id);
        self.bump();
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn open_tail(&self) -> NodeId {
        self.tail
    }

    /// First schema index of the open tail run.
    pub fn tail_base(&self) -> i64 {
        self.node(self.tail).schema
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn schema(&self, id: NodeId) -> i64 {
        self.node(id).schema
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev
    }

    /// Visible node whose hide chain holds `id`, if `id` is hidden.
    pub fn owner(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).owner
    }

    /// First node after the head.
    pub fn first(&self) -> NodeId {
        self.node(self.head).next.unwrap_or(self.tail)
    }

    /// True when nothing has been materialized: `[-1, base+]`.
    pub fn is_pristine(&self) -> bool {
        self.first() == self.tail && self.node(self.head).hide.is_none()
    }

    /// Number of materialized column nodes, visible and hidden.
    pub fn materialized(&self) -> usize {
        self.by_schema.len()
    }

    // ------------------------------------------------------------------
    // Visible chain
    // ------------------------------------------------------------------

    /// Splice a detached node into the visible chain right after `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, id: NodeId) {
        let next = self.node(anchor).next;
        {
            let node = self.node_mut(id);
            node.prev = Some(anchor);
            node.next = next;
            node.owner = None;
        }
        self.node_mut(anchor).next = Some(id);
        if let Some(next) = next {
            self.node_mut(next).prev = Some(id);
        }
        self.bump();
    }

    /// Splice a detached node just before the open tail.
    pub fn append(&mut self, id: NodeId) {
        let last = self.node(self.tail).prev.unwrap_or(self.head);
        self.insert_after(last, id);
    }

    /// Detach a visible node. Its hide chain stays attached to it.
    pub fn unlink(&mut self, id: NodeId) {
        let (prev, next) = {
            let node = self.node(id);
            (node.prev, node.next)
        };
        if let Some(prev) = prev {
            self.node_mut(prev).next = next;
        }
        if let Some(next) = next {
            self.node_mut(next).prev = prev;
        }
        let node = self.node_mut(id);
        node.prev = None;
        node.next = None;
        self.bump();
    }

    /// Move the visible segment `first..=last` right after `target`.
    ///
    /// Hide chains travel with their nodes. `target` must not lie inside
    /// the segment.
    pub fn move_span(&mut self, first: NodeId, last: NodeId, target: NodeId) {
        let before = self.node(first).prev;
        let after = self.node(last).next;
        if let Some(before) = before {
            self.node_mut(before).next = after;
        }
        if let Some(after) = after {
            self.node_mut(after).prev = before;
        }

        let next = self.node(target).next;
        self.node_mut(target).next = Some(first);
        self.node_mut(first).prev = Some(target);
        self.node_mut(last).next = next;
        if let Some(next) = next {
            self.node_mut(next).prev = Some(last);
        }
        self.bump();
    }

    /// View index of a visible node: -1 for the head, the first view of the
    /// run for the open tail. `None` for hidden or detached nodes.
    pub fn view_index_of(&self, id: NodeId) -> Option<i64> {
        if self.node(id).owner.is_some() {
            return None;
        }
        let mut view = -1;
        let mut cur = id;
        while cur != self.head {
            cur = self.node(cur).prev?;
            view += 1;
        }
        Some(view)
    }

    /// Visible nodes from the head to the open tail, inclusive.
    pub fn visible(&self) -> Visible<'_> {
        Visible {
            list: self,
            cur: Some(self.head),
        }
    }

    // ------------------------------------------------------------------
    // Open tail
    // ------------------------------------------------------------------

    /// Materialize `length` concrete nodes from the front of the open tail
    /// and return the last one created. The tail keeps standing for every
    /// integer after them.
    pub fn expand(&mut self, length: i64) -> Option<NodeId> {
        if length <= 0 {
            return None;
        }
        let base = self.tail_base();
        let mut last = None;
        for schema in base..base + length {
            let id = self.alloc(schema, NodeKind::Column);
            self.append(id);
            last = Some(id);
        }
        let tail = self.tail;
        self.node_mut(tail).schema = base + length;
        last
    }

    /// Skip `count` schema indexes at the front of the open tail without
    /// materializing them.
    pub fn skip_tail(&mut self, count: i64) {
        let tail = self.tail;
        self.node_mut(tail).schema += count.max(0);
        self.bump();
    }

    /// Fold trailing nodes that continue the tail's sequence back into it.
    /// The tail base never drops below `floor`.
    pub fn compact_tail(&mut self, floor: i64) -> i64 {
        let mut folded = 0;
        while let Some(prev) = self.node(self.tail).prev {
            let node = self.node(prev);
            if node.kind != NodeKind::Column
                || node.hide.is_some()
                || node.schema < floor
                || node.schema + 1 != self.tail_base()
            {
                break;
            }
            self.unlink(prev);
            self.release(prev);
            let tail = self.tail;
            self.node_mut(tail).schema -= 1;
            folded += 1;
        }
        folded
    }

    // ------------------------------------------------------------------
    // Hide chains
    // ------------------------------------------------------------------

    /// Nodes of `anchor`'s hide chain, in order.
    pub fn chain(&self, anchor: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.node(anchor).hide;
        while let Some(id) = cur {
            out.push(id);
            cur = self.node(id).next;
        }
        out
    }

    pub fn chain_schemas(&self, anchor: NodeId) -> Vec<i64> {
        self.chain(anchor)
            .into_iter()
            .map(|id| self.schema(id))
            .collect()
    }

    pub fn chain_len(&self, anchor: NodeId) -> usize {
        let mut len = 0;
        let mut cur = self.node(anchor).hide;
        while let Some(id) = cur {
            len += 1;
            cur = self.node(id).next;
        }
        len
    }

    /// Last node of `anchor`'s hide chain, memoized per generation.
    pub fn chain_tail(&self, anchor: NodeId) -> Option<NodeId> {
        let node = self.node(anchor);
        let first = node.hide?;
        if let Some((generation, tail)) = node.hide_tail.get() {
            if generation == self.generation {
                return Some(tail);
            }
        }
        let mut tail = first;
        while let Some(next) = self.node(tail).next {
            tail = next;
        }
        node.hide_tail.set(Some((self.generation, tail)));
        Some(tail)
    }

    /// Replace `anchor`'s hide chain with `ids`, in order.
    fn set_chain(&mut self, anchor: NodeId, ids: &[NodeId]) {
        let mut prev: Option<NodeId> = None;
        for &id in ids {
            {
                let node = self.node_mut(id);
                node.owner = Some(anchor);
                node.prev = prev;
                node.next = None;
            }
            if let Some(prev) = prev {
                self.node_mut(prev).next = Some(id);
            }
            prev = Some(id);
        }
        self.bump();
        let generation = self.generation;
        let node = self.node_mut(anchor);
        node.hide = ids.first().copied();
        node.hide_tail.set(prev.map(|tail| (generation, tail)));
    }

    /// Append a detached node to the end of `anchor`'s hide chain.
    pub fn push_hidden(&mut self, anchor: NodeId, id: NodeId) {
        let last = self.chain_tail(anchor);
        {
            let node = self.node_mut(id);
            node.owner = Some(anchor);
            node.prev = last;
            node.next = None;
        }
        match last {
            Some(last) => self.node_mut(last).next = Some(id),
            None => self.node_mut(anchor).hide = Some(id),
        }
        self.bump();
        let generation = self.generation;
        self.node(anchor).hide_tail.set(Some((generation, id)));
    }

    /// Insert a detached node at `position` of `owner`'s hide chain.
    pub fn insert_hidden(&mut self, owner: NodeId, position: usize, id: NodeId) {
        let mut ids = self.chain(owner);
        let at = position.min(ids.len());
        ids.insert(at, id);
        self.set_chain(owner, &ids);
    }

    /// Detach a hidden node from its chain; returns its former owner and
    /// offset.
    pub fn remove_hidden(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let owner = self.node(id).owner?;
        let mut ids = self.chain(owner);
        let offset = ids.iter().position(|&x| x == id)?;
        ids.remove(offset);
        self.set_chain(owner, &ids);
        let node = self.node_mut(id);
        node.owner = None;
        node.prev = None;
        node.next = None;
        Some((owner, offset))
    }

    /// Position of a hidden node inside its owner's chain.
    pub fn hidden_offset(&self, id: NodeId) -> Option<usize> {
        self.node(id).owner?;
        let mut offset = 0;
        let mut cur = self.node(id).prev;
        while let Some(prev) = cur {
            offset += 1;
            cur = self.node(prev).prev;
        }
        Some(offset)
    }

    /// Move `from`'s chain, starting at position `keep`, to the end of
    /// `to`'s chain.
    pub fn split_chain(&mut self, from: NodeId, keep: usize, to: NodeId) {
        let chain = self.chain(from);
        let keep = keep.min(chain.len());
        let (left, right) = chain.split_at(keep);
        if right.is_empty() {
            return;
        }
        let mut ids = self.chain(to);
        ids.extend_from_slice(right);
        self.set_chain(from, left);
        self.set_chain(to, &ids);
    }

    /// Detach up to `count` visible nodes following `anchor` into its hide
    /// chain, flattening their own chains behind them. Returns how many
    /// nodes moved, nested ones included. Stops at the open tail.
    pub fn hide_next(&mut self, anchor: NodeId, count: i64) -> i64 {
        let mut moved = 0;
        let mut last = self.chain_tail(anchor);
        for _ in 0..count {
            let Some(next) = self.node(anchor).next else {
                break;
            };
            if self.node(next).kind != NodeKind::Column {
                break;
            }
            let mut nested = self.node(next).hide;
            self.unlink(next);
            {
                let node = self.node_mut(next);
                node.hide = None;
                node.hide_tail.set(None);
            }
            self.link_hidden(anchor, last, next);
            last = Some(next);
            moved += 1;
            while let Some(id) = nested {
                nested = self.node(id).next;
                self.link_hidden(anchor, last, id);
                last = Some(id);
                moved += 1;
            }
        }
        self.bump();
        let generation = self.generation;
        self.node(anchor)
            .hide_tail
            .set(last.map(|tail| (generation, tail)));
        moved
    }

    /// Hook `id` into `anchor`'s chain right after `last` (first when
    /// `None`). The caller owns the tail memo.
    fn link_hidden(&mut self, anchor: NodeId, last: Option<NodeId>, id: NodeId) {
        {
            let node = self.node_mut(id);
            node.owner = Some(anchor);
            node.prev = last;
            node.next = None;
        }
        match last {
            Some(last) => self.node_mut(last).next = Some(id),
            None => self.node_mut(anchor).hide = Some(id),
        }
    }

    /// Make `count` nodes of `anchor`'s chain, starting at `offset`,
    /// visible again right after `anchor`. Nodes before the slice stay on
    /// `anchor`; nodes after it move to the last unhidden node, which is
    /// now their visible predecessor. Returns the unhidden nodes.
    pub fn unhide_slice(
        &mut self,
        anchor: NodeId,
        offset: usize,
        count: usize,
    ) -> Option<Vec<NodeId>> {
        let chain = self.chain(anchor);
        if count == 0 || offset >= chain.len() {
            return None;
        }
        let end = offset.saturating_add(count).min(chain.len());
        let left = chain.get(..offset)?.to_vec();
        let slice = chain.get(offset..end)?.to_vec();
        let right = chain.get(end..)?.to_vec();

        self.set_chain(anchor, &left);
        let mut at = anchor;
        for &id in &slice {
            self.insert_after(at, id);
            at = id;
        }
        self.set_chain(at, &right);
        Some(slice)
    }

    /// Unhide the whole chain of `anchor`.
    pub fn unhide_all(&mut self, anchor: NodeId) -> Option<Vec<NodeId>> {
        self.unhide_slice(anchor, 0, usize::MAX)
    }

    /// Drop `anchor`'s hide chain entirely; returns the released schemas.
    pub fn discard_chain(&mut self, anchor: NodeId) -> Vec<i64> {
        let ids = self.chain(anchor);
        self.set_chain(anchor, &[]);
        ids.into_iter()
            .map(|id| {
                let schema = self.schema(id);
                self.release(id);
                schema
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Find the node (or open-tail slot) holding `schema`.
    pub fn locate(&self, schema: i64) -> Option<Location> {
        if schema == -1 {
            return Some(Location::Visible(self.head));
        }
        if let Some(&id) = self.by_schema.get(&schema) {
            return Some(match self.node(id).owner {
                Some(owner) => Location::Hidden {
                    owner,
                    node: id,
                    offset: self.hidden_offset(id)?,
                },
                None => Location::Visible(id),
            });
        }
        let base = self.tail_base();
        (schema >= base).then_some(Location::Tail {
            offset: schema - base,
        })
    }

    /// Render the list as `[-1, 4 hide[5, 6], 7+]`.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .visible()
            .map(|id| {
                let node = self.node(id);
                let mut part = if node.kind == NodeKind::OpenTail {
                    format!("{}+", node.schema)
                } else {
                    node.schema.to_string()
                };
                let hidden = self.chain_schemas(id);
                if !hidden.is_empty() {
                    part.push_str(&format!(" hide{hidden:?}"));
                }
                part
            })
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Iterator over the visible chain.
pub struct Visible<'a> {
    list: &'a OrderingList,
    cur: Option<NodeId>,
}

impl Iterator for Visible<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        self.cur = self.list.next(id);
        Some(id)
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

    fn list_with(schemas: &[i64], base: i64) -> (OrderingList, Vec<NodeId>) {
        let mut list = OrderingList::new(base);
        let ids = schemas
            .iter()
            .map(|&s| {
                let id = list.create(s);
                list.append(id);
                id
            })
            .collect();
        (list, ids)
    }

    #[test]
    fn test_new_list_is_head_and_tail() {
        let list = OrderingList::new(0);
        assert_eq!(list.describe(), "[-1, 0+]");
        assert!(list.is_pristine());
        assert_eq!(list.view_index_of(list.open_tail()), Some(0));
    }

    #[test]
    fn test_expand_materializes_from_tail() {
        let mut list = OrderingList::new(100);
        let last = list.expand(3).unwrap();
        assert_eq!(list.schema(last), 102);
        assert_eq!(list.tail_base(), 103);
        assert_eq!(list.describe(), "[-1, 100, 101, 102, 103+]");
        assert_eq!(list.expand(0), None);
    }

    #[test]
    fn test_hide_next_flattens_nested_chains() {
        let (mut list, ids) = list_with(&[0, 1, 2, 3], 4);
        list.hide_next(ids[1], 1);
        assert_eq!(list.describe(), "[-1, 0, 1 hide[2], 3, 4+]");

        let moved = list.hide_next(ids[0], 1);
        assert_eq!(moved, 2);
        assert_eq!(list.describe(), "[-1, 0 hide[1, 2], 3, 4+]");
        assert_eq!(list.owner(ids[2]), Some(ids[0]));
    }

    #[test]
    fn test_hide_next_stops_at_open_tail() {
        let (mut list, ids) = list_with(&[0, 1], 2);
        assert_eq!(list.hide_next(ids[0], 10), 1);
        assert_eq!(list.describe(), "[-1, 0 hide[1], 2+]");
    }

    #[test]
    fn test_unhide_slice_moves_remainder_to_last_unhidden() {
        let (mut list, ids) = list_with(&[0, 1, 2, 3, 4], 5);
        list.hide_next(ids[0], 4);
        let shown = list.unhide_slice(ids[0], 1, 2).unwrap();
        assert_eq!(shown, vec![ids[2], ids[3]]);
        assert_eq!(list.describe(), "[-1, 0 hide[1], 2, 3 hide[4], 5+]");
    }

    #[test]
    fn test_unhide_out_of_range_is_none() {
        let (mut list, ids) = list_with(&[0, 1], 2);
        assert!(list.unhide_slice(ids[0], 0, 1).is_none());
        list.hide_next(ids[0], 1);
        assert!(list.unhide_slice(ids[0], 1, 1).is_none());
        assert!(list.unhide_slice(ids[0], 0, 0).is_none());
        assert_eq!(list.unhide_all(ids[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_chain_tail_memo_tracks_generation() {
        let (mut list, ids) = list_with(&[0, 1, 2, 3], 4);
        list.hide_next(ids[0], 2);
        assert_eq!(list.chain_tail(ids[0]), Some(ids[2]));
        list.remove_hidden(ids[2]);
        assert_eq!(list.chain_tail(ids[0]), Some(ids[1]));
        list.push_hidden(ids[0], ids[2]);
        assert_eq!(list.chain_tail(ids[0]), Some(ids[2]));
    }

    #[test]
    fn test_move_span_carries_chains() {
        let (mut list, ids) = list_with(&[0, 1, 2, 3, 4], 5);
        list.hide_next(ids[1], 1);
        // [-1, 0, 1 hide[2], 3, 4, 5+] -> move 1 after 4
        list.move_span(ids[1], ids[1], ids[4]);
        assert_eq!(list.describe(), "[-1, 0, 3, 4, 1 hide[2], 5+]");
        assert_eq!(list.view_index_of(ids[1]), Some(3));
    }

    #[test]
    fn test_locate_covers_every_kind() {
        let (mut list, ids) = list_with(&[7, 3], 10);
        list.hide_next(ids[0], 1);
        assert_eq!(list.locate(-1), Some(Location::Visible(list.head())));
        assert_eq!(list.locate(7), Some(Location::Visible(ids[0])));
        assert_eq!(
            list.locate(3),
            Some(Location::Hidden {
                owner: ids[0],
                node: ids[1],
                offset: 0
            })
        );
        assert_eq!(list.locate(12), Some(Location::Tail { offset: 2 }));
        assert_eq!(list.locate(5), None);
    }

    #[test]
    fn test_compact_tail_folds_sequential_nodes() {
        let mut list = OrderingList::new(0);
        list.expand(5);
        assert_eq!(list.compact_tail(0), 5);
        assert_eq!(list.describe(), "[-1, 0+]");
        assert_eq!(list.materialized(), 0);
    }

    #[test]
    fn test_compact_tail_stops_at_hidden_chain() {
        let mut list = OrderingList::new(0);
        list.expand(3);
        let first = list.next(list.head()).unwrap();
        list.hide_next(first, 1);
        assert_eq!(list.compact_tail(0), 1);
        assert_eq!(list.describe(), "[-1, 0 hide[1], 2+]");
        assert_eq!(list.locate(2), Some(Location::Tail { offset: 0 }));
    }

    #[test]
    fn test_compact_tail_respects_floor() {
        let mut list = OrderingList::new(0);
        list.expand(4);
        assert_eq!(list.compact_tail(2), 2);
        assert_eq!(list.describe(), "[-1, 0, 1, 2+]");
        assert_eq!(list.compact_tail(2), 0);
    }

    #[test]
    fn test_hide_next_flattens_in_order_and_keeps_tail() {
        let (mut list, ids) = list_with(&[0, 1, 2, 3, 4, 5], 6);
        list.hide_next(ids[2], 1);
        list.hide_next(ids[4], 1);
        // [-1, 0, 1, 2 hide[3], 4 hide[5], 6+]
        assert_eq!(list.hide_next(ids[0], 3), 5);
        assert_eq!(list.chain_schemas(ids[0]), vec![1, 2, 3, 4, 5]);
        assert_eq!(list.chain_tail(ids[0]), Some(ids[5]));
        assert_eq!(list.chain_len(ids[2]), 0);
        let extra = list.create(9);
        list.push_hidden(ids[0], extra);
        assert_eq!(list.chain_schemas(ids[0]), vec![1, 2, 3, 4, 5, 9]);
        assert_eq!(list.describe(), "[-1, 0 hide[1, 2, 3, 4, 5, 9], 6+]");
    }

    #[test]
    fn test_released_slots_are_reused() {
        let (mut list, ids) = list_with(&[0], 1);
        list.unlink(ids[0]);
        list.release(ids[0]);
        let again = list.create(9);
        assert_eq!(again, ids[0]);
        assert_eq!(list.locate(0), None);
    }
}
