//! Behaviour of the column manager through its public actions.
//!
//! Covers the reference scenarios (touch + hide, reserved indexes, a full
//! hide/unhide of a wide range) and the addressing rules of each action.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

mod common;

use common::{assert_consistent, id_schema, manager, manager_with, observe, visible_schemas};
use serde_json::json;
use test_case::test_case;
use xlcols::{
    Action, ColumnConfig, ColumnCount, ColumnError, ColumnManager, HideTarget, Outcome,
    SchemaRecord, UnhideTarget,
};

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn test_touch_then_hide_first_column() {
    let mut m = manager(0);
    m.apply(Action::Touch { view_index: 9 }).unwrap();
    assert_eq!(
        m.count(),
        ColumnCount {
            all: 10,
            visible: 10,
            hidden: 0
        }
    );

    m.apply(Action::Hide(HideTarget::Range {
        view_index: 0,
        count: 1,
    }))
    .unwrap();
    assert_eq!(m.details().len(), 1);
    assert_eq!(m.details()[0].after, -1);
    assert_eq!(m.details()[0].count, 1);
    assert_eq!(m.get_schemas(0, 1).unwrap()[0].schema_index, 1);
    assert_consistent(&m);
}

#[test]
fn test_reserved_indexes_serve_inserts_first() {
    let mut m = manager(0);
    m.reserve_indexes(100).unwrap();
    m.touch(9).unwrap();
    assert_eq!(m.describe(), "[-1, 100+]");

    let anchor = m.schema_index_at(5).unwrap();
    assert_eq!(anchor, 105);
    let applied = m
        .apply(Action::Insert {
            after_schema_index: anchor,
            schema: Some(SchemaRecord::from_iter([("title".to_string(), json!("New"))])),
        })
        .unwrap();
    assert_eq!(
        applied.result,
        Outcome::Inserted {
            schema_index: 0,
            view_index: Some(6)
        }
    );
    let inserted = &m.get_schemas(6, 1).unwrap()[0];
    assert_eq!(inserted.schema_index, 0);
    assert_eq!(inserted.fields["title"], json!("New"));
    assert_eq!(m.count().visible, 11);
    assert_consistent(&m);
}

#[test]
fn test_hide_and_unhide_hundred_columns() {
    let mut m = manager(100);
    m.apply(Action::Hide(HideTarget::Range {
        view_index: -1,
        count: 100,
    }))
    .unwrap();
    assert_eq!(m.count().hidden, 100);
    assert_eq!(m.count().visible, 0);

    m.apply(Action::Unhide(UnhideTarget::After {
        after_view_index: -1,
        count: 100,
    }))
    .unwrap();
    assert_eq!(m.count().hidden, 0);
    assert!(m.details().is_empty());
    assert_eq!(visible_schemas(&m), (0..100).collect::<Vec<_>>());
    assert_consistent(&m);
}

fn reserving(count: i64) -> ColumnManager {
    manager_with(ColumnConfig {
        reserved_indexes: count,
        ..ColumnConfig::default()
    })
}

#[test]
fn test_untouch_keeps_reserved_columns_concrete() {
    let mut m = reserving(2);
    m.insert(-1, None).unwrap();
    m.insert(0, None).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1]);

    m.untouch(2).unwrap();
    assert_consistent(&m);
    assert_eq!(m.describe(), "[-1, 0, 1, 2+]");

    let restored =
        ColumnManager::from_snapshot(id_schema, m.config().clone(), &m.snapshot()).unwrap();
    assert_eq!(observe(&restored), observe(&m));

    m.touch(2).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1, 2]);
}

#[test]
fn test_reorder_undo_shrink_stops_at_reserved_range() {
    let mut m = reserving(3);
    m.touch(2).unwrap();
    m.insert(-1, None).unwrap();
    m.insert(0, None).unwrap();
    m.insert(1, None).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1, 2, 3, 4, 5]);

    let applied = m.reorder(0, 1, 8, 0).unwrap();
    assert_eq!(m.count().visible, 9);
    m.apply(applied.undo).unwrap();
    assert_consistent(&m);
    assert_eq!(visible_schemas(&m), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(m.describe(), "[-1, 0, 1, 2, 3+]");
}

// ============================================================================
// Insert / remove
// ============================================================================

#[test]
fn test_insert_at_front_shifts_everything() {
    let mut m = manager(3);
    let applied = m.insert(-1, None).unwrap();
    assert_eq!(
        applied.result,
        Outcome::Inserted {
            schema_index: 3,
            view_index: Some(0)
        }
    );
    assert_eq!(visible_schemas(&m), vec![3, 0, 1, 2]);
    assert_eq!(m.view_index_of(0), Some(1));
}

#[test]
fn test_insert_undo_frees_index_for_reuse() {
    let mut m = manager(3);
    let applied = m.insert(0, None).unwrap();
    let undone = m.apply(applied.undo).unwrap();
    assert!(matches!(undone.undo, Action::Restore { schema_index: 3, .. }));
    assert_eq!(visible_schemas(&m), vec![0, 1, 2]);
    assert!(m.removed().contains(&3));

    let again = m.insert(2, None).unwrap();
    assert_eq!(
        again.result,
        Outcome::Inserted {
            schema_index: 3,
            view_index: Some(3)
        }
    );
    assert!(m.removed().is_empty());
    assert_consistent(&m);
}

#[test]
fn test_remove_keeps_record_in_undo() {
    let mut m = manager(4);
    let payload = SchemaRecord::from_iter([("title".to_string(), json!("Price"))]);
    m.update_schema(&payload, 2, false).unwrap();

    let applied = m.remove(2, false).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1, 3]);
    let undo_json = serde_json::to_value(&applied.undo).unwrap();
    assert_eq!(undo_json["type"], json!("restore"));
    assert_eq!(undo_json["args"]["schema"]["record"]["title"], json!("Price"));

    m.apply(applied.undo).unwrap();
    let restored = &m.get_schemas(2, 1).unwrap()[0];
    assert_eq!(restored.schema_index, 2);
    assert_eq!(restored.fields["title"], json!("Price"));
    assert_eq!(restored.fields["id"], json!("c2"));
}

#[test]
fn test_remove_twice_is_not_found() {
    let mut m = manager(4);
    m.remove(1, true).unwrap();
    let err = m.remove(1, true).unwrap_err();
    assert!(matches!(err, ColumnError::NotFound(_)));
    assert_eq!(m.count().visible, 3);
}

#[test_case(-1, false ; "negative view")]
#[test_case(4, false ; "view past visible")]
#[test_case(9, true ; "schema past visible")]
#[test_case(-1, true ; "head schema")]
fn test_remove_rejects(index: i64, is_schema_index: bool) {
    let mut m = manager(4);
    assert!(m.remove(index, is_schema_index).is_err());
    assert_eq!(m.count().all, 4);
    assert_eq!(m.describe(), "[-1, 0+]");
}

#[test]
fn test_insert_after_hidden_column_is_hidden() {
    let mut m = manager(5);
    m.hide(HideTarget::Range {
        view_index: 2,
        count: 2,
    })
    .unwrap();
    let applied = m.insert(3, None).unwrap();
    let Outcome::Inserted {
        schema_index,
        view_index: None,
    } = applied.result
    else {
        panic!("insert after a hidden column must stay hidden");
    };
    assert_eq!(m.hidden_after(1), vec![2, 3, schema_index]);
    assert_eq!(m.count().hidden, 3);
    assert_consistent(&m);
}

// ============================================================================
// Hide / unhide addressing
// ============================================================================

#[test]
fn test_hide_clamps_count_to_visible() {
    let mut m = manager(5);
    let applied = m
        .hide(HideTarget::Range {
            view_index: 3,
            count: 10,
        })
        .unwrap();
    assert_eq!(
        applied.result,
        Outcome::Hidden {
            schema_indexes: vec![3, 4],
            moved: 2
        }
    );
    assert_eq!(m.count().visible, 3);
}

#[test]
fn test_hide_by_schema_list() {
    let mut m = manager(6);
    m.hide(HideTarget::Schemas(vec![2, 3])).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1, 4, 5]);
    assert!(m.hide(HideTarget::Schemas(vec![2])).is_err());
    assert!(m.hide(HideTarget::Schemas(vec![4, 1])).is_err());
}

#[test]
fn test_adjacent_hides_merge_into_one_run() {
    let mut m = manager(8);
    m.hide(HideTarget::Range {
        view_index: 4,
        count: 1,
    })
    .unwrap();
    m.hide(HideTarget::Range {
        view_index: 2,
        count: 1,
    })
    .unwrap();
    // [0, 1 hide[2], 3 hide[4], 5, 6, 7]
    m.hide(HideTarget::Range {
        view_index: 2,
        count: 1,
    })
    .unwrap();
    assert_eq!(m.details().len(), 1);
    assert_eq!(m.hidden_after(1), vec![2, 3, 4]);
    assert_eq!(m.hidden_before(2), 3);
    assert_consistent(&m);
}

#[test]
fn test_hide_wide_range_in_one_action() {
    let columns = 50_000;
    let mut m = manager(columns);
    let applied = m
        .hide(HideTarget::Range {
            view_index: 0,
            count: columns,
        })
        .unwrap();
    assert!(matches!(applied.result, Outcome::Hidden { moved, .. } if moved == columns));
    assert_eq!(m.count().visible, 0);
    assert_eq!(m.details()[0].count, columns);
    assert_consistent(&m);

    m.unhide(UnhideTarget::After {
        after_view_index: -1,
        count: columns,
    })
    .unwrap();
    assert_eq!(m.count().hidden, 0);
    assert_eq!(m.schema_index_at(columns - 1), Some(columns - 1));
}

#[test]
fn test_partial_unhide_leaves_rest_hidden() {
    let mut m = manager(10);
    m.hide(HideTarget::Range {
        view_index: 1,
        count: 6,
    })
    .unwrap();
    m.unhide(UnhideTarget::After {
        after_view_index: 0,
        count: 2,
    })
    .unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1, 2, 7, 8, 9]);
    assert_eq!(m.hidden_after(2), vec![3, 4, 5, 6]);
    assert_eq!(m.count().hidden, 4);
    assert_consistent(&m);
}

#[test]
fn test_unhide_middle_of_run_by_schema() {
    let mut m = manager(10);
    m.hide(HideTarget::Range {
        view_index: 1,
        count: 6,
    })
    .unwrap();
    m.unhide(UnhideTarget::Schema {
        schema_index: 4,
        count: 1,
    })
    .unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 4, 7, 8, 9]);
    assert_eq!(m.hidden_after(0), vec![1, 2, 3]);
    assert_eq!(m.hidden_after(1), vec![5, 6]);
    assert_consistent(&m);
}

#[test_case(UnhideTarget::After { after_view_index: 3, count: 1 } ; "no run at anchor")]
#[test_case(UnhideTarget::After { after_view_index: 0, count: 0 } ; "zero count")]
#[test_case(UnhideTarget::Schema { schema_index: 0, count: 1 } ; "visible schema")]
#[test_case(UnhideTarget::Schemas(vec![]) ; "empty list")]
#[test_case(UnhideTarget::Schemas(vec![2, 1]) ; "out of order")]
fn test_unhide_rejects(target: UnhideTarget) {
    let mut m = manager(5);
    m.hide(HideTarget::Range {
        view_index: 1,
        count: 2,
    })
    .unwrap();
    let before = m.describe();
    assert!(m.unhide(target).is_err());
    assert_eq!(m.describe(), before);
    assert_eq!(m.count().hidden, 2);
}

// ============================================================================
// Reorder
// ============================================================================

#[test]
fn test_reorder_backward() {
    let mut m = manager(6);
    let applied = m.reorder(4, 2, 0, 0).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 4, 5, 1, 2, 3]);
    assert_eq!(
        applied.result,
        Outcome::Reordered {
            new_view_index: 1,
            grown: 0,
            discarded: vec![]
        }
    );
    assert_eq!(
        applied.undo,
        Action::Reorder {
            view_index: 1,
            count: 2,
            after_view_index: 5,
            shrink: 0
        }
    );
}

#[test]
fn test_reorder_carries_hidden_runs() {
    let mut m = manager(8);
    m.hide(HideTarget::Range {
        view_index: 3,
        count: 1,
    })
    .unwrap();
    // [0, 1, 2 hide[3], 4, 5, 6, 7]
    m.reorder(2, 1, 4, 0).unwrap();
    assert_eq!(visible_schemas(&m), vec![0, 1, 4, 5, 2, 6, 7]);
    assert_eq!(m.hidden_after(4), vec![3]);
    assert_consistent(&m);
}

#[test]
fn test_reorder_lands_after_target_run() {
    let mut m = manager(8);
    m.hide(HideTarget::Range {
        view_index: 5,
        count: 1,
    })
    .unwrap();
    // [0, 1, 2, 3, 4 hide[5], 6, 7]
    m.reorder(0, 1, 4, 0).unwrap();
    assert_eq!(visible_schemas(&m), vec![1, 2, 3, 4, 0, 6, 7]);
    assert_eq!(m.hidden_after(3), vec![5]);
    assert!(m.hidden_after(4).is_empty());
    assert_consistent(&m);
}

#[test]
fn test_reorder_inside_open_tail() {
    let mut m = manager(0);
    let applied = m.reorder(10, 1, 12, 0).unwrap();
    assert_eq!(m.count().visible, 13);
    assert_eq!(m.schema_index_at(12), Some(10));
    assert_eq!(m.schema_index_at(10), Some(11));
    m.apply(applied.undo).unwrap();
    assert_eq!(m.count().visible, 0);
    assert_eq!(m.describe(), "[-1, 0+]");
}

#[test]
fn test_reorder_with_shrink_drops_tail_columns() {
    let mut m = manager(5);
    let applied = m.reorder(0, 1, 2, 2).unwrap();
    assert_eq!(visible_schemas(&m), vec![1, 2, 0]);
    assert!(matches!(applied.result, Outcome::Reordered { new_view_index: 2, .. }));
}

// ============================================================================
// Schema records
// ============================================================================

#[test]
fn test_update_schema_null_deletes_field() {
    let mut m = manager(2);
    let payload = SchemaRecord::from_iter([("id".to_string(), serde_json::Value::Null)]);
    let applied = m.update_schema(&payload, 0, false).unwrap();
    assert!(m.get_schemas(0, 1).unwrap()[0].fields.is_empty());
    m.apply(applied.undo).unwrap();
    assert_eq!(m.get_schemas(0, 1).unwrap()[0].fields["id"], json!("c0"));
}

#[test]
fn test_reuse_disabled_by_config() {
    let config = ColumnConfig::from_json(r#"{"reuseRemovedIndexes": false}"#).unwrap();
    let mut m = manager_with(config);
    m.touch(3).unwrap();
    m.remove(1, false).unwrap();
    let applied = m.insert(-1, None).unwrap();
    assert!(matches!(
        applied.result,
        Outcome::Inserted {
            schema_index: 4,
            ..
        }
    ));
    assert!(m.removed().contains(&1));
}

#[test]
fn test_untouch_then_touch_reveals_same_columns() {
    let mut m = manager(6);
    m.reorder(0, 1, 2, 0).unwrap();
    m.untouch(4).unwrap();
    assert_eq!(visible_schemas(&m), vec![1, 2]);
    m.touch(5).unwrap();
    assert_eq!(visible_schemas(&m), vec![1, 2, 0, 3, 4, 5]);
    assert_consistent(&m);
}
