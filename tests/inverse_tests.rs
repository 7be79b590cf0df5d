//! Every action followed by its undo must leave nothing observable behind.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

mod common;

use common::{assert_consistent, manager, observe};
use serde_json::json;
use test_case::test_case;
use xlcols::{Action, ColumnManager, HideTarget, SchemaRecord, UnhideTarget};

/// Ten visible columns with two hidden runs: `[0 hide[1, 2], 3, 4, 5 hide[6], 7, 8, 9]`
/// seen as views `0, 3, 4, 5, 7, 8, 9`.
fn layered() -> ColumnManager {
    let mut m = manager(10);
    m.hide(HideTarget::Range {
        view_index: 6,
        count: 1,
    })
    .unwrap();
    m.hide(HideTarget::Range {
        view_index: 1,
        count: 2,
    })
    .unwrap();
    let mut payload = SchemaRecord::new();
    payload.insert("width".into(), json!(120));
    m.update_schema(&payload, 4, true).unwrap();
    assert_consistent(&m);
    m
}

fn assert_round_trip(m: &mut ColumnManager, action: Action) {
    let before = observe(m);
    let applied = m
        .apply(action.clone())
        .unwrap_or_else(|e| panic!("{action:?} failed: {e}"));
    assert_consistent(m);
    m.apply(applied.undo.clone())
        .unwrap_or_else(|e| panic!("undo {:?} of {action:?} failed: {e}", applied.undo));
    assert_consistent(m);
    assert_eq!(observe(m), before, "{action:?} then {:?}", applied.undo);
}

#[test_case(HideTarget::Range { view_index: 0, count: 1 } ; "owner of a run")]
#[test_case(HideTarget::Range { view_index: 1, count: 3 } ; "span carrying a run")]
#[test_case(HideTarget::Range { view_index: -5, count: 2 } ; "negative start")]
#[test_case(HideTarget::Range { view_index: 5, count: 40 } ; "clamped to the end")]
#[test_case(HideTarget::Schemas(vec![4, 5]) ; "listed")]
fn test_hide_undo(target: HideTarget) {
    let mut m = layered();
    assert_round_trip(&mut m, Action::Hide(target));
}

#[test_case(UnhideTarget::After { after_view_index: 0, count: 1 } ; "front of a run")]
#[test_case(UnhideTarget::After { after_view_index: 0, count: 9 } ; "whole run")]
#[test_case(UnhideTarget::After { after_view_index: 3, count: 1 } ; "single column run")]
#[test_case(UnhideTarget::Schema { schema_index: 2, count: 1 } ; "back of a run")]
#[test_case(UnhideTarget::Schemas(vec![1, 2]) ; "listed")]
fn test_unhide_undo(target: UnhideTarget) {
    let mut m = layered();
    assert_round_trip(&mut m, Action::Unhide(target));
}

#[test]
fn test_unhide_listed_with_gap_undo() {
    let mut m = manager(8);
    m.hide(HideTarget::Range {
        view_index: 1,
        count: 5,
    })
    .unwrap();
    assert_round_trip(&mut m, Action::Unhide(UnhideTarget::Schemas(vec![1, 3, 5])));
}

#[test_case(0, 1, 6 ; "forward over a run")]
#[test_case(4, 2, -1 ; "backward to the front")]
#[test_case(1, 3, 5 ; "span with runs inside")]
#[test_case(5, 1, 2 ; "run owner backward")]
#[test_case(2, 1, 12 ; "past the visible count")]
#[test_case(15, 2, 3 ; "from the open tail")]
fn test_reorder_undo(view_index: i64, count: i64, after_view_index: i64) {
    let mut m = layered();
    assert_round_trip(
        &mut m,
        Action::Reorder {
            view_index,
            count,
            after_view_index,
            shrink: 0,
        },
    );
}

#[test_case(0, false ; "run owner")]
#[test_case(1, false ; "right after a hidden run")]
#[test_case(4, true ; "updated column")]
#[test_case(2, true ; "back of a hidden run")]
#[test_case(6, true ; "single hidden column")]
#[test_case(6, false ; "last visible")]
fn test_remove_undo(index: i64, is_schema_index: bool) {
    let mut m = layered();
    assert_round_trip(
        &mut m,
        Action::Remove {
            index,
            is_schema_index,
        },
    );
}

#[test_case(-1 ; "front")]
#[test_case(0 ; "after a run owner")]
#[test_case(1 ; "inside a run")]
#[test_case(9 ; "after last visible")]
fn test_insert_undo(after_schema_index: i64) {
    let mut m = layered();
    let before = observe(&m);
    let applied = m
        .apply(Action::Insert {
            after_schema_index,
            schema: None,
        })
        .unwrap();
    m.apply(applied.undo).unwrap();
    assert_consistent(&m);
    assert_eq!(observe(&m), before);
}

#[test]
fn test_touch_undo() {
    let mut m = layered();
    assert_round_trip(&mut m, Action::Touch { view_index: 30 });
}

#[test]
fn test_update_schema_undo() {
    let mut m = layered();
    let mut payload = SchemaRecord::new();
    payload.insert("width".into(), json!(null));
    payload.insert("title".into(), json!("Total"));
    assert_round_trip(
        &mut m,
        Action::UpdateSchema {
            payload,
            index: 4,
            is_schema_index: true,
        },
    );
}

#[test]
fn test_undo_chain_unwinds_in_reverse() {
    let mut m = layered();
    let start = observe(&m);
    let actions = vec![
        Action::Hide(HideTarget::Range {
            view_index: 2,
            count: 2,
        }),
        Action::Reorder {
            view_index: 0,
            count: 2,
            after_view_index: 3,
            shrink: 0,
        },
        Action::Remove {
            index: 1,
            is_schema_index: false,
        },
        // [7, 0 hide[1, 2], 3 hide[4, 5, 6], 9]
        Action::Unhide(UnhideTarget::After {
            after_view_index: 1,
            count: 1,
        }),
        Action::Insert {
            after_schema_index: 3,
            schema: None,
        },
    ];
    let mut undos = Vec::new();
    for action in actions {
        let applied = m.apply(action).unwrap();
        assert_consistent(&m);
        undos.push(applied.undo);
    }
    while let Some(undo) = undos.pop() {
        m.apply(undo).unwrap();
        assert_consistent(&m);
    }
    assert_eq!(observe(&m), start);
}
