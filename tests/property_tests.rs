//! Randomized action sequences.
//!
//! Every step checks the ledger against the list, that a rejected action
//! changes nothing, that undo restores the observable state, and that
//! snapshots restore to the same answers. Sequences are seeded, so a
//! failure names the seed and step that reproduce it.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

mod common;

use common::{assert_consistent, id_schema, manager, manager_with, observe};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use xlcols::{
    Action, ColumnConfig, ColumnManager, HideTarget, Outcome, SchemaRecord, Snapshot, UnhideTarget,
};

const SEEDS: u64 = 80;
const STEPS: usize = 80;

/// Visible schema indexes and every hidden run as `(after, chain)`.
fn layout(m: &ColumnManager) -> (Vec<i64>, Vec<(i64, Vec<i64>)>) {
    let visible = m
        .get_schemas(0, m.count().visible)
        .unwrap()
        .into_iter()
        .map(|c| c.schema_index)
        .collect();
    let runs = m
        .details()
        .iter()
        .map(|r| (r.after, m.hidden_after(r.after)))
        .collect();
    (visible, runs)
}

fn random_anchor(rng: &mut StdRng, m: &ColumnManager) -> i64 {
    let (visible, runs) = layout(m);
    match rng.gen_range(0..3) {
        0 if !visible.is_empty() => visible[rng.gen_range(0..visible.len())],
        1 if !runs.is_empty() => {
            let chain = &runs[rng.gen_range(0..runs.len())].1;
            chain[rng.gen_range(0..chain.len())]
        }
        _ => -1,
    }
}

fn random_hide(rng: &mut StdRng, m: &ColumnManager) -> HideTarget {
    let visible = m.count().visible;
    if visible == 0 || rng.gen_bool(0.6) {
        return HideTarget::Range {
            view_index: rng.gen_range(-1..=visible),
            count: rng.gen_range(1..4),
        };
    }
    let start = rng.gen_range(0..visible);
    let len = rng.gen_range(1..=3).min(visible - start);
    HideTarget::Schemas(
        m.get_schemas(start, len)
            .unwrap()
            .into_iter()
            .map(|c| c.schema_index)
            .collect(),
    )
}

fn random_unhide(rng: &mut StdRng, m: &ColumnManager) -> UnhideTarget {
    let (_, runs) = layout(m);
    if runs.is_empty() {
        return UnhideTarget::After {
            after_view_index: rng.gen_range(-1..3),
            count: 1,
        };
    }
    let (after, chain) = &runs[rng.gen_range(0..runs.len())];
    let len = chain.len() as i64;
    match rng.gen_range(0..3) {
        0 => UnhideTarget::After {
            after_view_index: *after,
            count: rng.gen_range(1..=len + 1),
        },
        1 => UnhideTarget::Schema {
            schema_index: chain[rng.gen_range(0..chain.len())],
            count: rng.gen_range(1..=len),
        },
        _ => {
            let start = rng.gen_range(0..chain.len());
            let picked: Vec<i64> = chain[start..]
                .iter()
                .enumerate()
                .filter(|(i, _)| *i == 0 || rng.gen_bool(0.5))
                .map(|(_, &s)| s)
                .collect();
            UnhideTarget::Schemas(picked)
        }
    }
}

fn random_action(rng: &mut StdRng, m: &ColumnManager) -> Action {
    let visible = m.count().visible;
    match rng.gen_range(0..10) {
        0 => Action::Touch {
            view_index: visible + rng.gen_range(0..4),
        },
        1 => Action::Untouch {
            count: rng.gen_range(1..=visible.clamp(1, 3)),
        },
        2 => Action::Insert {
            after_schema_index: random_anchor(rng, m),
            schema: None,
        },
        3 => {
            if rng.gen_bool(0.5) {
                Action::Remove {
                    index: rng.gen_range(0..=visible),
                    is_schema_index: false,
                }
            } else {
                Action::Remove {
                    index: random_anchor(rng, m),
                    is_schema_index: true,
                }
            }
        }
        4 | 5 => Action::Hide(random_hide(rng, m)),
        6 | 7 => Action::Unhide(random_unhide(rng, m)),
        8 => Action::Reorder {
            view_index: rng.gen_range(0..visible + 2),
            count: rng.gen_range(1..4),
            after_view_index: rng.gen_range(-1..visible + 3),
            shrink: 0,
        },
        _ => {
            let mut payload = SchemaRecord::new();
            if rng.gen_bool(0.3) {
                payload.insert("id".into(), json!(null));
            } else {
                payload.insert("width".into(), json!(rng.gen_range(20_i64..200)));
            }
            Action::UpdateSchema {
                payload,
                index: rng.gen_range(0..=visible),
                is_schema_index: false,
            }
        }
    }
}

/// Resolution answers that must agree with each other.
fn assert_lookups_agree(m: &ColumnManager) {
    let count = m.count();
    let schemas = m.get_schemas(0, count.visible).unwrap();
    let mut last = 0;
    let mut hidden = m.hidden_after(-1).len() as i64;
    for column in &schemas {
        let view = column.view_index;
        assert_eq!(m.schema_index_at(view), Some(column.schema_index));
        assert_eq!(m.view_index_of(column.schema_index), Some(view));
        let before = m.hidden_before(view);
        assert!(before >= last, "hidden_before went down at view {view}");
        assert_eq!(before, hidden, "hidden_before({view})");
        last = before;
        hidden += m.hidden_after(view).len() as i64;
    }
    assert_eq!(hidden, count.hidden);
    assert_eq!(m.schema_index_at(count.visible), None);
}

/// Configurations cycled by seed: reserved indexes and abandoned removed
/// indexes change allocation, compaction and restore.
fn config_for(seed: u64) -> ColumnConfig {
    match seed % 4 {
        0 => ColumnConfig::default(),
        1 => ColumnConfig {
            reserved_indexes: 3,
            ..ColumnConfig::default()
        },
        2 => ColumnConfig {
            reuse_removed_indexes: false,
            ..ColumnConfig::default()
        },
        _ => ColumnConfig {
            reuse_removed_indexes: false,
            reserved_indexes: 2,
        },
    }
}

fn run_sequence(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = config_for(seed);
    let mut m = manager_with(config.clone());
    let initial = rng.gen_range(0..12);
    if initial > 0 {
        m.touch(initial - 1).unwrap();
    }

    for step in 0..STEPS {
        let action = random_action(&mut rng, &m);
        let before = observe(&m);
        let applied = match m.apply(action.clone()) {
            Ok(applied) => applied,
            Err(_) => {
                assert_eq!(
                    observe(&m),
                    before,
                    "seed {seed} step {step}: rejected {action:?} changed state"
                );
                continue;
            }
        };
        assert_consistent(&m);
        assert_lookups_agree(&m);

        let lossy = matches!(&applied.result, Outcome::Untouched { discarded, .. } if !discarded.is_empty());
        if !lossy {
            m.apply(applied.undo.clone()).unwrap_or_else(|e| {
                panic!("seed {seed} step {step}: undo of {action:?} failed: {e}")
            });
            assert_eq!(
                observe(&m),
                before,
                "seed {seed} step {step}: {action:?} undone by {:?}",
                applied.undo
            );
            m.apply(action.clone()).unwrap_or_else(|e| {
                panic!("seed {seed} step {step}: redo of {action:?} failed: {e}")
            });
            assert_consistent(&m);
        }

        if step % 10 == 9 {
            let json = m.snapshot_json().unwrap();
            let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
            let restored =
                ColumnManager::from_snapshot(id_schema, config.clone(), &snapshot)
                    .unwrap_or_else(|e| panic!("seed {seed} step {step}: {e}"));
            assert_eq!(observe(&restored), observe(&m), "seed {seed} step {step}");
            assert_eq!(restored.snapshot(), m.snapshot(), "seed {seed} step {step}");
        }
    }
}

#[test]
fn fuzz_random_sequences_stay_consistent() {
    for seed in 0..SEEDS {
        run_sequence(seed);
    }
}

#[test]
fn fuzz_hide_everything_then_unhide_everything() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let columns = rng.gen_range(1..60);
        let mut m = manager(columns);
        while m.count().visible > 1 {
            let visible = m.count().visible;
            let start = rng.gen_range(0..visible);
            let count = rng.gen_range(1..=(visible - start).min(5));
            m.hide(HideTarget::Range {
                view_index: start,
                count,
            })
            .unwrap();
            assert_consistent(&m);
        }
        while let Some(run) = m.details().first().copied() {
            m.unhide(UnhideTarget::After {
                after_view_index: run.after,
                count: rng.gen_range(1..=run.count),
            })
            .unwrap();
            assert_consistent(&m);
        }
        assert_eq!(m.count().visible, columns);
        assert_eq!(layout(&m).0, (0..columns).collect::<Vec<_>>());
    }
}
