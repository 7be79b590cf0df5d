//! Column manager.
//!
//! Owns the ordering list, the hidden ledger, the resolver cache, schema
//! records and the index allocator. It is the only mutator: every action
//! updates list and ledger together and drops the resolver cache before
//! returning, so readers never see the two disagree.
//!
//! The ledger is the authority on how many columns are visible. The list
//! may hold concrete nodes past that count (left behind by an untouch);
//! they stand for columns that are not live until touched again.

mod actions;
mod snapshot;

pub use actions::{Action, Applied, HideTarget, Outcome, UnhideTarget};
pub use snapshot::Snapshot;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::allocator::{Allocation, IndexAllocator, ReservedRange};
use crate::config::ColumnConfig;
use crate::error::{ColumnError, Result};
use crate::ledger::{HiddenLedger, HiddenRange};
use crate::list::{Location, NodeId, NodeKind, OrderingList};
use crate::resolver::Resolver;
use crate::schema::{DefaultSchemaGetter, SchemaRecord, SchemaSlot, SchemaStore};

/// Aggregate column counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCount {
    pub all: i64,
    pub visible: i64,
    pub hidden: i64,
}

/// One visible column as handed to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub schema_index: i64,
    pub view_index: i64,
    #[serde(flatten)]
    pub fields: SchemaRecord,
}

/// Where a live column sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Visible at `view` (-1 for the head). May still be inside the open
    /// tail.
    Visible { view: i64 },
    Hidden {
        owner: NodeId,
        owner_view: i64,
        node: NodeId,
        offset: usize,
    },
}

/// What [`ColumnManager::detach`] took out.
#[derive(Debug)]
struct Detached {
    schema_index: i64,
    /// Column right before it in full (visible and hidden) order.
    after_schema_index: i64,
    hidden: bool,
    view_index: Option<i64>,
    slot: SchemaSlot,
}

pub(crate) fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub struct ColumnManager {
    list: OrderingList,
    ledger: HiddenLedger,
    resolver: Resolver,
    records: SchemaStore,
    allocator: IndexAllocator,
    config: ColumnConfig,
    default_schema: DefaultSchemaGetter,
}

impl std::fmt::Debug for ColumnManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnManager")
            .field("list", &self.list.describe())
            .field("count", &self.count())
            .field("details", &self.ledger.ranges())
            .finish_non_exhaustive()
    }
}

impl ColumnManager {
    /// Create an empty manager. `default_schema` produces the record of a
    /// column nobody has written to, from its schema and view index.
    pub fn new(
        default_schema: impl Fn(i64, i64) -> SchemaRecord + 'static,
        config: ColumnConfig,
    ) -> Self {
        let mut manager = Self {
            list: OrderingList::new(0),
            ledger: HiddenLedger::new(),
            resolver: Resolver::new(),
            records: SchemaStore::new(),
            allocator: IndexAllocator::new(config.reuse_removed_indexes),
            config,
            default_schema: Box::new(default_schema),
        };
        let reserved = manager.config.reserved_indexes;
        if reserved > 0 {
            if let Err(e) = manager.reserve_indexes(reserved) {
                tracing::warn!(reserved, error = %e, "ignoring reserved indexes from config");
            }
        }
        manager
    }

    pub fn config(&self) -> &ColumnConfig {
        &self.config
    }

    /// Set aside the next `count` schema indexes for inserts, ahead of the
    /// open tail. Only allowed before any column exists.
    ///
    /// # Errors
    /// `InvalidArgument` for a non-positive count or a manager that already
    /// has columns.
    pub fn reserve_indexes(&mut self, count: i64) -> Result<ReservedRange> {
        if count <= 0 {
            return Err(ColumnError::invalid(format!(
                "cannot reserve {count} indexes"
            )));
        }
        if self.ledger.all() != 0 || !self.list.is_pristine() {
            return Err(ColumnError::invalid(
                "indexes can only be reserved before any column exists",
            ));
        }
        let start = self.list.tail_base();
        if !self.allocator.reserve(start, count) {
            return Err(ColumnError::invalid(format!(
                "reserved range cannot grow from {start}"
            )));
        }
        self.list.skip_tail(count);
        self.resolver.invalidate();
        tracing::debug!(start, count, "reserved schema indexes");
        Ok(self.allocator.reserved())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn count(&self) -> ColumnCount {
        ColumnCount {
            all: self.ledger.all(),
            visible: self.ledger.visible(),
            hidden: self.ledger.hidden(),
        }
    }

    /// Hidden runs, ascending by anchor.
    pub fn details(&self) -> &[HiddenRange] {
        self.ledger.ranges()
    }

    pub fn hidden_before(&self, view_index: i64) -> i64 {
        self.ledger.hidden_before(view_index)
    }

    /// Removed schema indexes awaiting reuse or restore.
    pub fn removed(&self) -> &BTreeSet<i64> {
        self.allocator.removed()
    }

    pub fn schema_index_at(&self, view_index: i64) -> Option<i64> {
        (0..self.ledger.visible())
            .contains(&view_index)
            .then(|| self.resolver.resolve(&self.list, view_index).schema_index)
    }

    /// View index of a live visible column.
    pub fn view_index_of(&self, schema_index: i64) -> Option<i64> {
        match self.placement(schema_index)? {
            Placement::Visible { view } => Some(view),
            Placement::Hidden { .. } => None,
        }
    }

    /// Schema indexes hidden right after visible column `after_view_index`.
    pub fn hidden_after(&self, after_view_index: i64) -> Vec<i64> {
        if !(-1..self.ledger.visible()).contains(&after_view_index)
            || self.ledger.run_at(after_view_index) == 0
        {
            return Vec::new();
        }
        let node = self.resolver.resolve(&self.list, after_view_index).node;
        self.list.chain_schemas(node)
    }

    /// Compact rendering of the ordering list, e.g. `[-1, 0 hide[1], 2+]`.
    pub fn describe(&self) -> String {
        self.list.describe()
    }

    /// Up to `count` visible columns from `begin`, with their records.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative start or count.
    pub fn get_schemas(&self, begin: i64, count: i64) -> Result<Vec<ColumnSchema>> {
        if begin < 0 || count < 0 {
            return Err(ColumnError::invalid(format!(
                "bad schema range {begin}+{count}"
            )));
        }
        let end = begin.saturating_add(count).min(self.ledger.visible());
        if end <= begin {
            return Ok(Vec::new());
        }
        let schemas = self.resolver.resolve_multi(&self.list, begin, end - begin);
        Ok((begin..end)
            .zip(schemas)
            .map(|(view_index, schema_index)| ColumnSchema {
                schema_index,
                view_index,
                fields: self
                    .records
                    .resolve(schema_index, view_index, &self.default_schema),
            })
            .collect())
    }

    /// Check that the ledger agrees with the hidden chains and that the
    /// removed and reserved index sets are disjoint from live columns.
    ///
    /// # Errors
    /// `Inconsistent` naming the first disagreement found.
    pub fn verify(&self) -> Result<()> {
        let visible = self.ledger.visible();
        let sum: i64 = self.ledger.ranges().iter().map(|r| r.count).sum();
        if sum != self.ledger.hidden() {
            return Err(ColumnError::inconsistent(format!(
                "ledger runs hold {sum} columns, total says {}",
                self.ledger.hidden()
            )));
        }

        let mut anchored = 0;
        for (view, node) in (-1i64..).zip(self.list.visible()) {
            let len = to_i64(self.list.chain_len(node));
            if self.list.kind(node) == NodeKind::OpenTail {
                if len != 0 {
                    return Err(ColumnError::inconsistent(
                        "open tail carries hidden columns",
                    ));
                }
                break;
            }
            let run = if view < visible {
                self.ledger.run_at(view)
            } else {
                0
            };
            if len != run {
                return Err(ColumnError::inconsistent(format!(
                    "view {view}: chain holds {len} columns, ledger says {run}"
                )));
            }
            if len > 0 {
                anchored += 1;
            }
        }
        if anchored != self.ledger.ranges().len() {
            return Err(ColumnError::inconsistent(
                "ledger has runs with no concrete anchor",
            ));
        }

        if let Some(schema) = self
            .allocator
            .removed()
            .iter()
            .find(|&&schema| self.list.locate(schema).is_some())
        {
            return Err(ColumnError::inconsistent(format!(
                "removed index {schema} is still in the list"
            )));
        }
        let reserved = self.allocator.reserved();
        if reserved.next > reserved.end || reserved.end > self.list.tail_base() {
            return Err(ColumnError::inconsistent(format!(
                "reserved range {}..{} overlaps the open tail at {}",
                reserved.next,
                reserved.end,
                self.list.tail_base()
            )));
        }
        if self
            .allocator
            .removed()
            .range(reserved.next..reserved.end)
            .next()
            .is_some()
        {
            return Err(ColumnError::inconsistent(
                "unassigned reserved index marked removed",
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals shared by the actions
    // ------------------------------------------------------------------

    /// Locate a live column. Removed indexes, unassigned ones and columns
    /// past the visible count are not live.
    fn placement(&self, schema_index: i64) -> Option<Placement> {
        if schema_index < 0 || self.allocator.is_removed(schema_index) {
            return None;
        }
        let visible = self.ledger.visible();
        match self.list.locate(schema_index)? {
            Location::Visible(node) => {
                let view = self.list.view_index_of(node)?;
                (view < visible).then_some(Placement::Visible { view })
            }
            Location::Hidden {
                owner,
                node,
                offset,
            } => Some(Placement::Hidden {
                owner,
                owner_view: self.list.view_index_of(owner)?,
                node,
                offset,
            }),
            Location::Tail { offset } => {
                let view = self.list.view_index_of(self.list.open_tail())? + offset;
                (view < visible).then_some(Placement::Visible { view })
            }
        }
    }

    /// Like [`Self::placement`], with -1 naming the front.
    fn anchor(&self, after_schema_index: i64) -> Result<Placement> {
        if after_schema_index == -1 {
            return Ok(Placement::Visible { view: -1 });
        }
        self.placement(after_schema_index).ok_or_else(|| {
            ColumnError::not_found(format!("no live column {after_schema_index}"))
        })
    }

    /// Live column addressed by schema index or by view index.
    fn target(&self, index: i64, is_schema_index: bool) -> Result<Placement> {
        if is_schema_index {
            return self
                .placement(index)
                .ok_or_else(|| ColumnError::not_found(format!("no live column {index}")));
        }
        if (0..self.ledger.visible()).contains(&index) {
            Ok(Placement::Visible { view: index })
        } else {
            Err(ColumnError::not_found(format!(
                "view {index} is outside {} visible columns",
                self.ledger.visible()
            )))
        }
    }

    /// Concrete node at `view`, cutting it out of the open tail if needed.
    /// The head for negative views.
    fn materialize(&mut self, view: i64) -> NodeId {
        let resolved = self.resolver.resolve(&self.list, view);
        match resolved.tail_offset {
            Some(offset) => {
                let node = self.list.expand(offset + 1).unwrap_or(resolved.node);
                self.resolver.invalidate();
                node
            }
            None => resolved.node,
        }
    }

    /// Take a fresh schema index from the open tail: the first one that is
    /// not a live column.
    fn split_tail(&mut self) -> Result<NodeId> {
        let tail_view = self
            .list
            .view_index_of(self.list.open_tail())
            .unwrap_or(0);
        let length = (self.ledger.visible() - tail_view).max(0) + 1;
        let node = self
            .list
            .expand(length)
            .ok_or_else(|| ColumnError::inconsistent("open tail could not be split"))?;
        self.list.unlink(node);
        self.resolver.invalidate();
        Ok(node)
    }

    fn allocate_node(&mut self) -> Result<NodeId> {
        match self.allocator.allocate() {
            Allocation::Index(source, schema) => {
                tracing::trace!(schema, ?source, "allocated schema index");
                Ok(self.list.create(schema))
            }
            Allocation::SplitTail => self.split_tail(),
        }
    }

    /// Put a detached node right after `anchor` in full order. Returns the
    /// view index it lands on when visible.
    fn place(&mut self, node: NodeId, anchor: Placement, hidden: bool) -> Option<i64> {
        let view = match (anchor, hidden) {
            (Placement::Visible { view }, false) => {
                let at = self.materialize(view);
                self.list.insert_after(at, node);
                self.list.split_chain(at, 0, node);
                self.ledger.insert(view, false, 0);
                Some(view + 1)
            }
            (Placement::Visible { view }, true) => {
                let at = self.materialize(view);
                self.list.insert_hidden(at, 0, node);
                self.ledger.insert(view, true, 0);
                None
            }
            (
                Placement::Hidden {
                    owner,
                    owner_view,
                    offset,
                    ..
                },
                true,
            ) => {
                self.list.insert_hidden(owner, offset + 1, node);
                self.ledger.insert(owner_view, true, 0);
                None
            }
            (
                Placement::Hidden {
                    owner,
                    owner_view,
                    offset,
                    ..
                },
                false,
            ) => {
                self.list.insert_after(owner, node);
                self.list.split_chain(owner, offset + 1, node);
                self.ledger.insert(owner_view, false, to_i64(offset + 1));
                Some(owner_view + 1)
            }
        };
        self.resolver.invalidate();
        view
    }

    /// Take a live column out of the list and free its schema index.
    fn detach(&mut self, placement: Placement) -> Detached {
        let (node, anchor, hidden, view_index) = match placement {
            Placement::Visible { view } => {
                let node = self.materialize(view);
                let prev = self.list.prev(node).unwrap_or(self.list.head());
                let anchor = self.list.chain_tail(prev).unwrap_or(prev);
                self.list.split_chain(node, 0, prev);
                self.list.unlink(node);
                let removed = self.ledger.remove(view, false);
                debug_assert!(removed, "ledger rejected visible removal at {view}");
                (node, anchor, false, Some(view))
            }
            Placement::Hidden {
                owner,
                owner_view,
                node,
                ..
            } => {
                let anchor = self.list.prev(node).unwrap_or(owner);
                self.list.remove_hidden(node);
                let removed = self.ledger.remove(owner_view, true);
                debug_assert!(removed, "ledger has no run after {owner_view}");
                (node, anchor, true, None)
            }
        };
        let schema_index = self.list.schema(node);
        let after_schema_index = self.list.schema(anchor);
        self.list.release(node);
        self.allocator.release(schema_index);
        let slot = self.records.take(schema_index);
        self.resolver.invalidate();
        Detached {
            schema_index,
            after_schema_index,
            hidden,
            view_index,
            slot,
        }
    }

    /// Drop the last `count` visible columns along with the hidden runs
    /// behind them. Returns the discarded hidden schema indexes.
    fn shrink(&mut self, count: i64) -> Vec<i64> {
        let keep = self.ledger.visible() - count;
        let anchors: Vec<i64> = self
            .ledger
            .ranges()
            .iter()
            .map(|r| r.after)
            .filter(|&after| after >= keep)
            .collect();
        let mut discarded = Vec::new();
        for after in anchors {
            let node = self.resolver.resolve(&self.list, after).node;
            for schema in self.list.discard_chain(node) {
                self.allocator.release(schema);
                self.records.take(schema);
                discarded.push(schema);
            }
        }
        let dropped = self.ledger.truncate(keep);
        debug_assert_eq!(dropped, to_i64(discarded.len()));
        let folded = self.list.compact_tail(self.allocator.reserved().end);
        self.resolver.invalidate();
        tracing::trace!(keep, folded, discarded = discarded.len(), "shrunk");
        discarded
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
    use serde_json::json;

    fn manager() -> ColumnManager {
        ColumnManager::new(|_, _| SchemaRecord::new(), ColumnConfig::default())
    }

    #[test]
    fn test_new_manager_is_empty() {
        let m = manager();
        assert_eq!(
            m.count(),
            ColumnCount {
                all: 0,
                visible: 0,
                hidden: 0
            }
        );
        assert_eq!(m.describe(), "[-1, 0+]");
        assert!(m.get_schemas(0, 10).unwrap().is_empty());
        m.verify().unwrap();
    }

    #[test]
    fn test_reserve_only_when_pristine() {
        let mut m = manager();
        let range = m.reserve_indexes(5).unwrap();
        assert_eq!(range, ReservedRange { next: 0, end: 5 });
        assert_eq!(m.describe(), "[-1, 5+]");
        assert_eq!(m.reserve_indexes(3).unwrap().end, 8);

        m.touch(0).unwrap();
        assert!(m.reserve_indexes(1).is_err());
        assert!(m.reserve_indexes(0).is_err());
    }

    #[test]
    fn test_config_reserves_at_construction() {
        let config = ColumnConfig {
            reserved_indexes: 10,
            ..ColumnConfig::default()
        };
        let m = ColumnManager::new(|_, _| SchemaRecord::new(), config);
        assert_eq!(m.describe(), "[-1, 10+]");
    }

    #[test]
    fn test_queries_on_hidden_columns() {
        let mut m = manager();
        m.touch(5).unwrap();
        m.hide(HideTarget::Range {
            view_index: 2,
            count: 2,
        })
        .unwrap();
        assert_eq!(m.hidden_after(1), vec![2, 3]);
        assert!(m.hidden_after(0).is_empty());
        assert_eq!(m.view_index_of(4), Some(2));
        assert_eq!(m.view_index_of(2), None);
        assert_eq!(m.schema_index_at(3), Some(5));
        assert_eq!(m.schema_index_at(4), None);
        assert_eq!(m.hidden_before(2), 2);
    }

    #[test]
    fn test_get_schemas_uses_getter_and_records() {
        let mut m = ColumnManager::new(
            |schema, view| {
                let mut r = SchemaRecord::new();
                r.insert("id".into(), json!(format!("{schema}@{view}")));
                r
            },
            ColumnConfig::default(),
        );
        m.touch(2).unwrap();
        let mut payload = SchemaRecord::new();
        payload.insert("title".into(), json!("B"));
        m.update_schema(&payload, 1, false).unwrap();

        let got = m.get_schemas(0, 5).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].fields["id"], json!("0@0"));
        assert_eq!(got[1].fields["title"], json!("B"));
        assert_eq!(got[1].fields["id"], json!("1@1"));
        assert!(m.get_schemas(-1, 1).is_err());

        let value = serde_json::to_value(&got[1]).unwrap();
        assert_eq!(
            value,
            json!({"schema_index": 1, "view_index": 1, "id": "1@1", "title": "B"})
        );
    }

    #[test]
    fn test_split_tail_skips_live_tail_columns() {
        let mut m = manager();
        m.touch(3).unwrap();
        let node = m.split_tail().unwrap();
        assert_eq!(m.list.schema(node), 4);
        assert_eq!(m.describe(), "[-1, 0, 1, 2, 3, 5+]");
        m.list.release(node);
    }
}
