//! Elementary reversible actions.
//!
//! Each action either fails with the manager untouched or returns its
//! result together with the action that undoes it. Undo descriptors are
//! plain [`Action`] values, so they serialize and replay like any other.

use serde::{Deserialize, Serialize};

use super::{to_i64, ColumnManager, Detached, Placement};
use crate::error::{ColumnError, Result};
use crate::list::NodeId;
use crate::schema::{SchemaRecord, SchemaSlot};

/// Which visible columns to hide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HideTarget {
    /// `count` columns from `view_index`; a negative start clamps to 0 and
    /// the count clamps to the visible columns left.
    Range { view_index: i64, count: i64 },
    /// Consecutive visible columns, in view order.
    Schemas(Vec<i64>),
}

/// Which hidden columns to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnhideTarget {
    /// The first `count` columns hidden after `after_view_index`.
    After { after_view_index: i64, count: i64 },
    /// `count` columns of a hidden run, starting at `schema_index`.
    Schema { schema_index: i64, count: i64 },
    /// Columns of one hidden run, in run order. Unlisted columns between
    /// them stay hidden behind the listed column before them.
    Schemas(Vec<i64>),
}

/// Every mutation the manager accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum Action {
    Touch {
        view_index: i64,
    },
    Untouch {
        count: i64,
    },
    Insert {
        after_schema_index: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<SchemaRecord>,
    },
    UndoInsert {
        schema_index: i64,
    },
    Remove {
        index: i64,
        #[serde(default)]
        is_schema_index: bool,
    },
    Restore {
        schema_index: i64,
        after_schema_index: i64,
        #[serde(default)]
        hidden: bool,
        #[serde(default)]
        schema: SchemaSlot,
    },
    Hide(HideTarget),
    Unhide(UnhideTarget),
    Reorder {
        view_index: i64,
        count: i64,
        after_view_index: i64,
        /// Visible columns to drop from the end once the move is done.
        #[serde(default)]
        shrink: i64,
    },
    UpdateSchema {
        payload: SchemaRecord,
        index: i64,
        #[serde(default)]
        is_schema_index: bool,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Touch { .. } => "touch",
            Self::Untouch { .. } => "untouch",
            Self::Insert { .. } => "insert",
            Self::UndoInsert { .. } => "undo_insert",
            Self::Remove { .. } => "remove",
            Self::Restore { .. } => "restore",
            Self::Hide(_) => "hide",
            Self::Unhide(_) => "unhide",
            Self::Reorder { .. } => "reorder",
            Self::UpdateSchema { .. } => "update_schema",
        }
    }
}

/// Result payload of a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Touched {
        grown: i64,
    },
    Untouched {
        count: i64,
        /// Hidden columns that lived behind the dropped ones.
        discarded: Vec<i64>,
    },
    Inserted {
        schema_index: i64,
        view_index: Option<i64>,
    },
    Removed {
        schema_index: i64,
        view_index: Option<i64>,
        hidden: bool,
    },
    Restored {
        schema_index: i64,
        view_index: Option<i64>,
    },
    Hidden {
        schema_indexes: Vec<i64>,
        /// Columns that joined the hidden chain, nested ones included.
        moved: i64,
    },
    Unhidden {
        schema_indexes: Vec<i64>,
    },
    Reordered {
        new_view_index: i64,
        grown: i64,
        discarded: Vec<i64>,
    },
    Updated {
        schema_index: i64,
    },
}

/// A successful action and its inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applied {
    pub result: Outcome,
    pub undo: Action,
}

impl ColumnManager {
    /// Run one action.
    ///
    /// # Errors
    /// `InvalidArgument` or `NotFound` when the action does not apply to
    /// the current state; nothing is changed in that case.
    pub fn apply(&mut self, action: Action) -> Result<Applied> {
        let name = action.name();
        tracing::debug!(?action, "apply");
        let applied = match action {
            Action::Touch { view_index } => self.touch(view_index),
            Action::Untouch { count } => self.untouch(count),
            Action::Insert {
                after_schema_index,
                schema,
            } => self.insert(after_schema_index, schema),
            Action::UndoInsert { schema_index } => self.undo_insert(schema_index),
            Action::Remove {
                index,
                is_schema_index,
            } => self.remove(index, is_schema_index),
            Action::Restore {
                schema_index,
                after_schema_index,
                hidden,
                schema,
            } => self.restore(schema_index, after_schema_index, hidden, schema),
            Action::Hide(target) => self.hide(target),
            Action::Unhide(target) => self.unhide(target),
            Action::Reorder {
                view_index,
                count,
                after_view_index,
                shrink,
            } => self.reorder(view_index, count, after_view_index, shrink),
            Action::UpdateSchema {
                payload,
                index,
                is_schema_index,
            } => self.update_schema(&payload, index, is_schema_index),
        };
        match &applied {
            Ok(applied) => tracing::debug!(action = name, result = ?applied.result, "applied"),
            Err(e) => tracing::debug!(action = name, error = %e, "rejected"),
        }
        debug_assert!(self.verify().is_ok(), "{name} left list and ledger apart");
        applied
    }

    /// Grow the visible count so it covers `view_index`.
    ///
    /// # Errors
    /// `InvalidArgument` when the view is already visible.
    pub fn touch(&mut self, view_index: i64) -> Result<Applied> {
        let visible = self.ledger.visible();
        if view_index < visible {
            return Err(ColumnError::invalid(format!(
                "view {view_index} is already within {visible} visible columns"
            )));
        }
        let grown = self.ledger.extend(view_index);
        Ok(Applied {
            result: Outcome::Touched { grown },
            undo: Action::Untouch { count: grown },
        })
    }

    /// Drop the last `count` visible columns. Hidden runs behind them are
    /// discarded and their indexes freed.
    ///
    /// # Errors
    /// `InvalidArgument` unless `0 < count <= visible`.
    pub fn untouch(&mut self, count: i64) -> Result<Applied> {
        let visible = self.ledger.visible();
        if count <= 0 || count > visible {
            return Err(ColumnError::invalid(format!(
                "cannot untouch {count} of {visible} visible columns"
            )));
        }
        let discarded = self.shrink(count);
        Ok(Applied {
            result: Outcome::Untouched { count, discarded },
            undo: Action::Touch {
                view_index: visible - 1,
            },
        })
    }

    /// Add a column right after `after_schema_index` (-1 for the front).
    /// A column inserted inside a hidden run is hidden too.
    ///
    /// # Errors
    /// `NotFound` when the anchor is not a live column.
    pub fn insert(
        &mut self,
        after_schema_index: i64,
        schema: Option<SchemaRecord>,
    ) -> Result<Applied> {
        let anchor = self.anchor(after_schema_index)?;
        let hidden = matches!(anchor, Placement::Hidden { .. });
        let node = self.allocate_node()?;
        let schema_index = self.list.schema(node);
        let view_index = self.place(node, anchor, hidden);
        self.records
            .put(schema_index, schema.map_or(SchemaSlot::Absent, SchemaSlot::Record));
        Ok(Applied {
            result: Outcome::Inserted {
                schema_index,
                view_index,
            },
            undo: Action::UndoInsert { schema_index },
        })
    }

    /// Remove a column added by [`Self::insert`].
    ///
    /// # Errors
    /// `NotFound` when the column is not live.
    pub fn undo_insert(&mut self, schema_index: i64) -> Result<Applied> {
        self.remove(schema_index, true)
    }

    /// Remove a column by view index, or by schema index when
    /// `is_schema_index` is set.
    ///
    /// # Errors
    /// `NotFound` when the index addresses no live column.
    pub fn remove(&mut self, index: i64, is_schema_index: bool) -> Result<Applied> {
        let placement = self.target(index, is_schema_index)?;
        let Detached {
            schema_index,
            after_schema_index,
            hidden,
            view_index,
            slot,
        } = self.detach(placement);
        Ok(Applied {
            result: Outcome::Removed {
                schema_index,
                view_index,
                hidden,
            },
            undo: Action::Restore {
                schema_index,
                after_schema_index,
                hidden,
                schema: slot,
            },
        })
    }

    /// Bring a removed column back right after `after_schema_index`, in
    /// full order, with the given hidden state and record.
    ///
    /// # Errors
    /// `NotFound` when the index is not removed or the anchor is not live.
    pub fn restore(
        &mut self,
        schema_index: i64,
        after_schema_index: i64,
        hidden: bool,
        schema: SchemaSlot,
    ) -> Result<Applied> {
        if !self.allocator.is_removed(schema_index) {
            return Err(ColumnError::not_found(format!(
                "column {schema_index} is not removed"
            )));
        }
        let anchor = self.anchor(after_schema_index)?;
        self.allocator.reclaim(schema_index);
        let node = self.list.create(schema_index);
        let view_index = self.place(node, anchor, hidden);
        self.records.put(schema_index, schema);
        Ok(Applied {
            result: Outcome::Restored {
                schema_index,
                view_index,
            },
            undo: Action::Remove {
                index: schema_index,
                is_schema_index: true,
            },
        })
    }

    /// Hide visible columns into the hidden run of the column before them.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty or non-consecutive target, `NotFound`
    /// when nothing visible is addressed.
    pub fn hide(&mut self, target: HideTarget) -> Result<Applied> {
        let visible = self.ledger.visible();
        let (start, count) = match target {
            HideTarget::Range { view_index, count } => {
                if count <= 0 {
                    return Err(ColumnError::invalid(format!("cannot hide {count} columns")));
                }
                let start = view_index.max(0);
                if start >= visible {
                    return Err(ColumnError::not_found(format!(
                        "view {start} is outside {visible} visible columns"
                    )));
                }
                (start, count.min(visible - start))
            }
            HideTarget::Schemas(schemas) => self.consecutive_visible(&schemas)?,
        };

        let schema_indexes = self.resolver.resolve_multi(&self.list, start, count);
        self.materialize(start + count - 1);
        let anchor = self.materialize(start - 1);
        let moved = self.list.hide_next(anchor, count);
        let hidden = self.ledger.hide(start - 1, count);
        debug_assert_eq!(hidden, Some(count));
        self.resolver.invalidate();

        Ok(Applied {
            result: Outcome::Hidden {
                schema_indexes: schema_indexes.clone(),
                moved,
            },
            undo: Action::Unhide(UnhideTarget::Schemas(schema_indexes)),
        })
    }

    /// Show hidden columns again.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty target or one that is not a single
    /// run, `NotFound` when there is no hidden run at the anchor.
    pub fn unhide(&mut self, target: UnhideTarget) -> Result<Applied> {
        let shown = match target {
            UnhideTarget::After {
                after_view_index,
                count,
            } => {
                if count <= 0 {
                    return Err(ColumnError::invalid(format!("cannot unhide {count} columns")));
                }
                if !(-1..self.ledger.visible()).contains(&after_view_index)
                    || self.ledger.run_at(after_view_index) == 0
                {
                    return Err(ColumnError::not_found(format!(
                        "no hidden run after view {after_view_index}"
                    )));
                }
                let anchor = self.materialize(after_view_index);
                self.unhide_run(anchor, after_view_index, 0, count)?
            }
            UnhideTarget::Schema {
                schema_index,
                count,
            } => {
                if count <= 0 {
                    return Err(ColumnError::invalid(format!("cannot unhide {count} columns")));
                }
                let Some(Placement::Hidden {
                    owner,
                    owner_view,
                    offset,
                    ..
                }) = self.placement(schema_index)
                else {
                    return Err(ColumnError::not_found(format!(
                        "column {schema_index} is not hidden"
                    )));
                };
                self.unhide_run(owner, owner_view, offset, count)?
            }
            UnhideTarget::Schemas(schemas) => self.unhide_listed(&schemas)?,
        };
        Ok(Applied {
            result: Outcome::Unhidden {
                schema_indexes: shown.clone(),
            },
            undo: Action::Hide(HideTarget::Schemas(shown)),
        })
    }

    /// Move the visible span `[view_index, view_index + count)` right after
    /// column `after_view_index`, growing the visible count first when
    /// either end lies past it. `shrink` visible columns are dropped from
    /// the end afterwards.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty span, a target inside the span or a
    /// shrink larger than the visible count.
    pub fn reorder(
        &mut self,
        view_index: i64,
        count: i64,
        after_view_index: i64,
        shrink: i64,
    ) -> Result<Applied> {
        if count <= 0 || view_index < 0 || after_view_index < -1 || shrink < 0 {
            return Err(ColumnError::invalid(format!(
                "bad reorder {view_index}+{count} after {after_view_index}"
            )));
        }
        let end = view_index + count - 1;
        if (view_index - 1..=end).contains(&after_view_index) {
            return Err(ColumnError::invalid(format!(
                "target {after_view_index} lies inside the span {view_index}..={end}"
            )));
        }
        let visible = self.ledger.visible();
        let need = (view_index + count).max(after_view_index + 1);
        let grown = (need - visible).max(0);
        if shrink > visible + grown {
            return Err(ColumnError::invalid(format!(
                "cannot shrink {shrink} of {} columns",
                visible + grown
            )));
        }

        self.ledger.extend(need - 1);
        self.materialize(end.max(after_view_index));
        let first = self.resolver.resolve(&self.list, view_index).node;
        let last = self.resolver.resolve(&self.list, end).node;
        let target = self.resolver.resolve(&self.list, after_view_index).node;
        self.list.move_span(first, last, target);
        let moved = self.ledger.reorder(view_index, count, after_view_index);
        debug_assert!(moved, "ledger rejected a validated reorder");
        self.resolver.invalidate();

        let (new_view_index, back_after) = if after_view_index > end {
            (after_view_index - count + 1, view_index - 1)
        } else {
            (after_view_index + 1, end)
        };
        let discarded = if shrink > 0 {
            self.shrink(shrink)
        } else {
            self.list.compact_tail(self.allocator.reserved().end);
            self.resolver.invalidate();
            Vec::new()
        };

        Ok(Applied {
            result: Outcome::Reordered {
                new_view_index,
                grown,
                discarded,
            },
            undo: Action::Reorder {
                view_index: new_view_index,
                count,
                after_view_index: back_after,
                shrink: grown,
            },
        })
    }

    /// Merge `payload` into a column's record; `null` fields are removed.
    ///
    /// # Errors
    /// `NotFound` when the index addresses no live column.
    pub fn update_schema(
        &mut self,
        payload: &SchemaRecord,
        index: i64,
        is_schema_index: bool,
    ) -> Result<Applied> {
        let (schema_index, view) = match self.target(index, is_schema_index)? {
            Placement::Visible { view } => (
                self.resolver.resolve(&self.list, view).schema_index,
                view,
            ),
            Placement::Hidden {
                node,
                owner_view,
                offset,
                ..
            } => (self.list.schema(node), owner_view + 1 + to_i64(offset)),
        };
        let prior = self
            .records
            .merge(schema_index, view, payload, &self.default_schema);
        Ok(Applied {
            result: Outcome::Updated { schema_index },
            undo: Action::UpdateSchema {
                payload: prior,
                index: schema_index,
                is_schema_index: true,
            },
        })
    }

    /// Start and length of a list of consecutive visible columns.
    fn consecutive_visible(&self, schemas: &[i64]) -> Result<(i64, i64)> {
        let Some(&first) = schemas.first() else {
            return Err(ColumnError::invalid("empty column list"));
        };
        let Some(Placement::Visible { view }) = self.placement(first) else {
            return Err(ColumnError::not_found(format!(
                "column {first} is not visible"
            )));
        };
        let count = to_i64(schemas.len());
        if view + count > self.ledger.visible()
            || self.resolver.resolve_multi(&self.list, view, count) != schemas
        {
            return Err(ColumnError::invalid(format!(
                "columns {schemas:?} are not consecutive visible columns"
            )));
        }
        Ok((view, count))
    }

    /// Unhide `count` columns `offset` into `anchor`'s run.
    fn unhide_run(
        &mut self,
        anchor: NodeId,
        anchor_view: i64,
        offset: usize,
        count: i64,
    ) -> Result<Vec<i64>> {
        let wanted = usize::try_from(count).unwrap_or(usize::MAX);
        let nodes = self
            .list
            .unhide_slice(anchor, offset, wanted)
            .ok_or_else(|| {
                ColumnError::not_found(format!("no hidden columns after view {anchor_view}"))
            })?;
        let shown = to_i64(nodes.len());
        let unhidden = self.ledger.unhide(anchor_view, to_i64(offset), shown);
        debug_assert_eq!(unhidden, Some(shown));
        self.resolver.invalidate();
        Ok(nodes.into_iter().map(|id| self.list.schema(id)).collect())
    }

    /// Unhide exactly the listed columns of one run.
    fn unhide_listed(&mut self, schemas: &[i64]) -> Result<Vec<i64>> {
        let Some(&first) = schemas.first() else {
            return Err(ColumnError::invalid("empty column list"));
        };
        let Some(Placement::Hidden {
            owner,
            owner_view,
            offset,
            ..
        }) = self.placement(first)
        else {
            return Err(ColumnError::not_found(format!("column {first} is not hidden")));
        };

        let chain = self.list.chain_schemas(owner);
        let mut positions = Vec::with_capacity(schemas.len());
        let mut from = offset;
        for &schema in schemas {
            let Some(at) = chain
                .iter()
                .skip(from)
                .position(|&s| s == schema)
                .map(|p| p + from)
            else {
                return Err(ColumnError::invalid(format!(
                    "columns {schemas:?} are not one hidden run in order"
                )));
            };
            positions.push(at);
            from = at + 1;
        }

        let span = from - offset;
        self.unhide_run(owner, owner_view, offset, to_i64(span))?;

        // columns skipped by the list go back behind the listed one before them
        for pair in positions.windows(2).rev() {
            let &[left, right] = pair else {
                continue;
            };
            let gap = to_i64(right - left - 1);
            if gap == 0 {
                continue;
            }
            let view = owner_view + 1 + to_i64(left - offset);
            let node = self.resolver.resolve(&self.list, view).node;
            self.list.hide_next(node, gap);
            let hidden = self.ledger.hide(view, gap);
            debug_assert_eq!(hidden, Some(gap));
            self.resolver.invalidate();
        }
        Ok(schemas.to_vec())
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
    use crate::config::ColumnConfig;
    use serde_json::json;
    use test_case::test_case;

    fn manager(visible: i64) -> ColumnManager {
        let mut m = ColumnManager::new(|_, _| SchemaRecord::new(), ColumnConfig::default());
        if visible > 0 {
            m.touch(visible - 1).unwrap();
        }
        m
    }

    fn visible_schemas(m: &ColumnManager) -> Vec<i64> {
        m.get_schemas(0, m.count().visible)
            .unwrap()
            .into_iter()
            .map(|c| c.schema_index)
            .collect()
    }

    #[test]
    fn test_update_hidden_column_reads_default_at_unhide_view() {
        let mut m = ColumnManager::new(
            |schema, view| {
                SchemaRecord::from_iter([
                    ("schema".to_string(), json!(schema)),
                    ("view".to_string(), json!(view)),
                ])
            },
            ColumnConfig::default(),
        );
        m.touch(5).unwrap();
        m.hide(HideTarget::Range {
            view_index: 2,
            count: 2,
        })
        .unwrap();

        let payload = SchemaRecord::from_iter([("width".to_string(), json!(80))]);
        m.update_schema(&payload, 3, true).unwrap();
        m.unhide(UnhideTarget::After {
            after_view_index: 1,
            count: 2,
        })
        .unwrap();
        let shown = &m.get_schemas(3, 1).unwrap()[0];
        assert_eq!(shown.schema_index, 3);
        assert_eq!(shown.fields["view"], json!(3));
        assert_eq!(shown.fields["width"], json!(80));
    }

    #[test]
    fn test_action_wire_format() {
        let action: Action = serde_json::from_value(json!({
            "type": "hide",
            "args": {"view_index": 2, "count": 3}
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Hide(HideTarget::Range {
                view_index: 2,
                count: 3
            })
        );

        let undo = Action::Unhide(UnhideTarget::Schemas(vec![4, 5]));
        assert_eq!(
            serde_json::to_value(&undo).unwrap(),
            json!({"type": "unhide", "args": [4, 5]})
        );

        let action: Action =
            serde_json::from_value(json!({"type": "remove", "args": {"index": 3}})).unwrap();
        assert_eq!(
            action,
            Action::Remove {
                index: 3,
                is_schema_index: false
            }
        );
    }

    #[test]
    fn test_unhide_target_variants_decode() {
        let after: UnhideTarget =
            serde_json::from_value(json!({"after_view_index": -1, "count": 2})).unwrap();
        assert!(matches!(after, UnhideTarget::After { .. }));
        let schema: UnhideTarget =
            serde_json::from_value(json!({"schema_index": 7, "count": 1})).unwrap();
        assert!(matches!(schema, UnhideTarget::Schema { .. }));
    }

    #[test]
    fn test_touch_then_untouch() {
        let mut m = manager(0);
        let applied = m.touch(9).unwrap();
        assert_eq!(applied.undo, Action::Untouch { count: 10 });
        assert!(m.touch(3).is_err());
        m.apply(applied.undo).unwrap();
        assert_eq!(m.count().all, 0);
    }

    #[test]
    fn test_untouch_discards_runs_behind_dropped_columns() {
        let mut m = manager(6);
        m.hide(HideTarget::Range {
            view_index: 4,
            count: 1,
        })
        .unwrap();
        // [0, 1, 2, 3 hide[4], 5]
        let applied = m.untouch(2).unwrap();
        assert_eq!(
            applied.result,
            Outcome::Untouched {
                count: 2,
                discarded: vec![4]
            }
        );
        assert_eq!(m.count().all, 3);
        assert!(m.removed().contains(&4));
        assert_eq!(m.describe(), "[-1, 0, 1, 2, 3, 5+]");
    }

    #[test]
    fn test_untouch_compacts_tail() {
        let mut m = manager(5);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 1,
        })
        .unwrap();
        m.unhide(UnhideTarget::After {
            after_view_index: 0,
            count: 1,
        })
        .unwrap();
        m.untouch(5).unwrap();
        assert_eq!(m.describe(), "[-1, 0+]");
    }

    #[test]
    fn test_insert_takes_tail_index_past_visible() {
        let mut m = manager(4);
        let applied = m.insert(1, None).unwrap();
        assert_eq!(
            applied.result,
            Outcome::Inserted {
                schema_index: 4,
                view_index: Some(2)
            }
        );
        assert_eq!(visible_schemas(&m), vec![0, 1, 4, 2, 3]);
        m.touch(5).unwrap();
        assert_eq!(visible_schemas(&m), vec![0, 1, 4, 2, 3, 5]);
    }

    #[test]
    fn test_insert_inside_hidden_run_stays_hidden() {
        let mut m = manager(5);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 2,
        })
        .unwrap();
        let applied = m.insert(1, None).unwrap();
        let Outcome::Inserted {
            schema_index,
            view_index,
        } = applied.result
        else {
            panic!("unexpected outcome");
        };
        assert_eq!(view_index, None);
        assert_eq!(m.hidden_after(0), vec![1, schema_index, 2]);
        assert_eq!(m.count().hidden, 3);
    }

    #[test]
    fn test_insert_unknown_anchor_fails_cleanly() {
        let mut m = manager(3);
        let before = m.describe();
        assert!(matches!(m.insert(42, None), Err(ColumnError::NotFound(_))));
        assert_eq!(m.describe(), before);
    }

    #[test]
    fn test_remove_and_restore_visible_with_run() {
        let mut m = manager(6);
        m.hide(HideTarget::Range {
            view_index: 3,
            count: 2,
        })
        .unwrap();
        // [0, 1, 2 hide[3, 4], 5]
        let applied = m.remove(2, false).unwrap();
        assert_eq!(
            applied.undo,
            Action::Restore {
                schema_index: 2,
                after_schema_index: 1,
                hidden: false,
                schema: SchemaSlot::Absent
            }
        );
        assert_eq!(m.hidden_after(1), vec![3, 4]);
        m.apply(applied.undo).unwrap();
        assert_eq!(m.hidden_after(2), vec![3, 4]);
        assert!(m.hidden_after(1).is_empty());
        assert_eq!(visible_schemas(&m), vec![0, 1, 2, 5]);
    }

    #[test]
    fn test_remove_after_hidden_run_restores_behind_it() {
        let mut m = manager(5);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 1,
        })
        .unwrap();
        // [0 hide[1], 2, 3, 4]: removing 2 anchors the restore on 1
        let applied = m.remove(2, true).unwrap();
        let Action::Restore {
            after_schema_index,
            hidden,
            ..
        } = &applied.undo
        else {
            panic!("expected restore");
        };
        assert_eq!((*after_schema_index, *hidden), (1, false));
        m.apply(applied.undo).unwrap();
        assert_eq!(visible_schemas(&m), vec![0, 2, 3, 4]);
        assert_eq!(m.hidden_after(0), vec![1]);
    }

    #[test]
    fn test_remove_hidden_and_restore() {
        let mut m = manager(5);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 3,
        })
        .unwrap();
        let applied = m.remove(2, true).unwrap();
        assert_eq!(m.hidden_after(0), vec![1, 3]);
        m.apply(applied.undo).unwrap();
        assert_eq!(m.hidden_after(0), vec![1, 2, 3]);
    }

    #[test]
    fn test_removed_index_is_reused() {
        let mut m = manager(3);
        m.remove(0, false).unwrap();
        let applied = m.insert(-1, None).unwrap();
        assert_eq!(
            applied.result,
            Outcome::Inserted {
                schema_index: 0,
                view_index: Some(0)
            }
        );
    }

    #[test]
    fn test_removed_index_abandoned_without_reuse() {
        let config = ColumnConfig {
            reuse_removed_indexes: false,
            ..ColumnConfig::default()
        };
        let mut m = ColumnManager::new(|_, _| SchemaRecord::new(), config);
        m.touch(2).unwrap();
        m.remove(0, false).unwrap();
        let applied = m.insert(-1, None).unwrap();
        assert_eq!(
            applied.result,
            Outcome::Inserted {
                schema_index: 3,
                view_index: Some(0)
            }
        );
    }

    #[test]
    fn test_restore_requires_removed_index() {
        let mut m = manager(3);
        let err = m.restore(1, -1, false, SchemaSlot::Absent).unwrap_err();
        assert!(matches!(err, ColumnError::NotFound(_)));
    }

    #[test_case(HideTarget::Range { view_index: 0, count: 0 } ; "zero count")]
    #[test_case(HideTarget::Range { view_index: 5, count: 1 } ; "past visible")]
    #[test_case(HideTarget::Schemas(vec![]) ; "empty list")]
    #[test_case(HideTarget::Schemas(vec![1, 3]) ; "not consecutive")]
    fn test_hide_rejects(target: HideTarget) {
        let mut m = manager(5);
        assert!(m.hide(target).is_err());
        assert_eq!(m.count().hidden, 0);
    }

    #[test]
    fn test_hide_negative_start_clamps() {
        let mut m = manager(5);
        let applied = m
            .hide(HideTarget::Range {
                view_index: -3,
                count: 2,
            })
            .unwrap();
        assert_eq!(
            applied.result,
            Outcome::Hidden {
                schema_indexes: vec![0, 1],
                moved: 2
            }
        );
        assert_eq!(m.hidden_after(-1), vec![0, 1]);
    }

    #[test]
    fn test_hide_reports_nested_columns() {
        let mut m = manager(6);
        m.hide(HideTarget::Range {
            view_index: 2,
            count: 1,
        })
        .unwrap();
        let applied = m
            .hide(HideTarget::Range {
                view_index: 1,
                count: 1,
            })
            .unwrap();
        assert_eq!(
            applied.result,
            Outcome::Hidden {
                schema_indexes: vec![1],
                moved: 2
            }
        );
        assert_eq!(m.hidden_after(0), vec![1, 2]);
        m.apply(applied.undo).unwrap();
        assert_eq!(m.hidden_after(1), vec![2]);
        assert!(m.hidden_after(0).is_empty());
    }

    #[test]
    fn test_unhide_schema_splits_run() {
        let mut m = manager(6);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 4,
        })
        .unwrap();
        let applied = m
            .unhide(UnhideTarget::Schema {
                schema_index: 2,
                count: 2,
            })
            .unwrap();
        assert_eq!(
            applied.result,
            Outcome::Unhidden {
                schema_indexes: vec![2, 3]
            }
        );
        assert_eq!(m.hidden_after(0), vec![1]);
        assert_eq!(m.hidden_after(2), vec![4]);
        m.apply(applied.undo).unwrap();
        assert_eq!(m.hidden_after(0), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unhide_listed_keeps_skipped_hidden() {
        let mut m = manager(6);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 4,
        })
        .unwrap();
        m.unhide(UnhideTarget::Schemas(vec![1, 3])).unwrap();
        assert_eq!(visible_schemas(&m), vec![0, 1, 3, 5]);
        assert_eq!(m.hidden_after(1), vec![2]);
        assert_eq!(m.hidden_after(2), vec![4]);
        assert!(m.unhide(UnhideTarget::Schemas(vec![4, 2])).is_err());
    }

    #[test]
    fn test_unhide_without_run_is_not_found() {
        let mut m = manager(3);
        let err = m
            .unhide(UnhideTarget::After {
                after_view_index: 0,
                count: 1,
            })
            .unwrap_err();
        assert!(matches!(err, ColumnError::NotFound(_)));
    }

    #[test]
    fn test_reorder_forward_reports_new_view() {
        let mut m = manager(6);
        let applied = m.reorder(1, 2, 4, 0).unwrap();
        assert_eq!(visible_schemas(&m), vec![0, 3, 4, 1, 2, 5]);
        assert_eq!(
            applied.result,
            Outcome::Reordered {
                new_view_index: 3,
                grown: 0,
                discarded: vec![]
            }
        );
        m.apply(applied.undo).unwrap();
        assert_eq!(visible_schemas(&m), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_reorder_past_visible_grows_then_shrinks_back() {
        let mut m = manager(3);
        let applied = m.reorder(0, 1, 5, 0).unwrap();
        assert_eq!(m.count().visible, 6);
        assert_eq!(visible_schemas(&m), vec![1, 2, 3, 4, 5, 0]);
        assert_eq!(
            applied.undo,
            Action::Reorder {
                view_index: 5,
                count: 1,
                after_view_index: -1,
                shrink: 3
            }
        );
        m.apply(applied.undo).unwrap();
        assert_eq!(visible_schemas(&m), vec![0, 1, 2]);
        assert_eq!(m.describe(), "[-1, 0+]");
    }

    #[test_case(2, 2, 1 ; "right before span")]
    #[test_case(2, 2, 3 ; "inside span")]
    #[test_case(2, 0, 5 ; "empty span")]
    #[test_case(-1, 1, 3 ; "negative start")]
    fn test_reorder_rejects(view: i64, count: i64, after: i64) {
        let mut m = manager(6);
        assert!(m.reorder(view, count, after, 0).is_err());
        assert_eq!(m.count().visible, 6);
    }

    #[test]
    fn test_update_schema_undo_restores_fields() {
        let mut m = manager(2);
        let mut payload = SchemaRecord::new();
        payload.insert("title".into(), json!("Name"));
        let applied = m.update_schema(&payload, 1, false).unwrap();
        assert_eq!(m.get_schemas(1, 1).unwrap()[0].fields["title"], json!("Name"));
        m.apply(applied.undo).unwrap();
        assert!(m.get_schemas(1, 1).unwrap()[0].fields.is_empty());
    }

    #[test]
    fn test_update_schema_on_hidden_column() {
        let mut m = manager(3);
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 1,
        })
        .unwrap();
        let mut payload = SchemaRecord::new();
        payload.insert("width".into(), json!(80));
        m.update_schema(&payload, 1, true).unwrap();
        assert!(m.update_schema(&payload, 2, false).is_err());
        m.unhide(UnhideTarget::After {
            after_view_index: 0,
            count: 1,
        })
        .unwrap();
        assert_eq!(m.get_schemas(1, 1).unwrap()[0].fields["width"], json!(80));
    }
}
