//! Common test utilities and assertion helpers.
//!
//! Builds managers with a recognizable default schema getter and dumps
//! their state in forms that are easy to compare.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::sync::Once;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use xlcols::ledger::HiddenRange;
use xlcols::{ColumnConfig, ColumnCount, ColumnManager, SchemaRecord};

static LOGGING: Once = Once::new();

/// Install a test-friendly subscriber once. Reads `XLCOLS_LOG`, quiet by
/// default.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_env("XLCOLS_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Default record: `{"id": "c<schema>"}`.
pub fn id_schema(schema: i64, _view: i64) -> SchemaRecord {
    let mut record = SchemaRecord::new();
    record.insert("id".into(), json!(format!("c{schema}")));
    record
}

pub fn manager_with(config: ColumnConfig) -> ColumnManager {
    init_logging();
    ColumnManager::new(id_schema, config)
}

/// Manager with `visible` untouched visible columns.
pub fn manager(visible: i64) -> ColumnManager {
    let mut m = manager_with(ColumnConfig::default());
    if visible > 0 {
        m.touch(visible - 1).expect("touch");
    }
    m
}

/// Schema indexes of every visible column, in view order.
pub fn visible_schemas(m: &ColumnManager) -> Vec<i64> {
    m.get_schemas(0, m.count().visible)
        .expect("get_schemas")
        .into_iter()
        .map(|c| c.schema_index)
        .collect()
}

/// Everything a reader can observe, for before/after comparisons.
#[derive(Debug, PartialEq)]
pub struct Observed {
    pub count: ColumnCount,
    pub details: Vec<HiddenRange>,
    pub schemas: Vec<serde_json::Value>,
    pub hidden: Vec<(i64, Vec<i64>)>,
}

pub fn observe(m: &ColumnManager) -> Observed {
    let count = m.count();
    let schemas = m
        .get_schemas(0, count.visible)
        .expect("get_schemas")
        .into_iter()
        .map(|c| serde_json::to_value(c).expect("serialize"))
        .collect();
    let hidden = m
        .details()
        .iter()
        .map(|r| (r.after, m.hidden_after(r.after)))
        .collect();
    Observed {
        count,
        details: m.details().to_vec(),
        schemas,
        hidden,
    }
}

pub fn assert_consistent(m: &ColumnManager) {
    if let Err(e) = m.verify() {
        panic!("{e}\n{}", m.describe());
    }
    let count = m.count();
    assert_eq!(count.all, count.visible + count.hidden);
    let sum: i64 = m.details().iter().map(|r| r.count).sum();
    assert_eq!(sum, count.hidden);
}
