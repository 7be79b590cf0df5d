//! Snapshot and restore.
//!
//! A snapshot carries the ledger, the flattened ordering list, stored
//! records and the removed/reserved index state. Restoring rebuilds each
//! part, then checks them against each other before handing the manager
//! out.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ColumnManager;
use crate::allocator::{IndexAllocator, ReservedRange};
use crate::config::ColumnConfig;
use crate::error::{ColumnError, Result};
use crate::ledger::{HiddenLedger, LedgerSnapshot};
use crate::list::{ListToken, OrderingList};
use crate::resolver::Resolver;
use crate::schema::{SchemaRecord, SchemaSlot, SchemaStore};

/// Serializable manager state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ledger: LedgerSnapshot,
    pub list: Vec<ListToken>,
    #[serde(default)]
    pub records: BTreeMap<i64, SchemaSlot>,
    #[serde(default)]
    pub removed: BTreeSet<i64>,
    #[serde(default)]
    pub reserved: ReservedRange,
}

impl ColumnManager {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ledger: self.ledger.snapshot(),
            list: self.list.to_tokens(),
            records: self.records.slots().clone(),
            removed: self.allocator.removed().clone(),
            reserved: self.allocator.reserved(),
        }
    }

    /// Rebuild a manager from a snapshot. The configured reserved range is
    /// ignored; the snapshot carries its own.
    ///
    /// # Errors
    /// `Snapshot` when any part is malformed or the parts disagree.
    pub fn from_snapshot(
        default_schema: impl Fn(i64, i64) -> SchemaRecord + 'static,
        config: ColumnConfig,
        snapshot: &Snapshot,
    ) -> Result<Self> {
        let ledger = HiddenLedger::from_snapshot(&snapshot.ledger)
            .ok_or_else(|| ColumnError::Snapshot("malformed hidden ranges".into()))?;
        let list = OrderingList::from_tokens(&snapshot.list)
            .ok_or_else(|| ColumnError::Snapshot("malformed ordering list".into()))?;
        let manager = Self {
            list,
            ledger,
            resolver: Resolver::new(),
            records: SchemaStore::from_slots(snapshot.records.clone()),
            allocator: IndexAllocator::with_state(
                config.reuse_removed_indexes,
                snapshot.removed.clone(),
                snapshot.reserved,
            ),
            config,
            default_schema: Box::new(default_schema),
        };
        manager
            .verify()
            .map_err(|e| ColumnError::Snapshot(e.to_string()))?;
        tracing::debug!(
            columns = manager.ledger.all(),
            materialized = manager.list.materialized(),
            "restored snapshot"
        );
        Ok(manager)
    }

    /// Snapshot as a JSON string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
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
    use crate::manager::HideTarget;
    use serde_json::json;

    fn blank(_: i64, _: i64) -> SchemaRecord {
        SchemaRecord::new()
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut m = ColumnManager::new(blank, ColumnConfig::default());
        m.touch(3).unwrap();
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 1,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&m.snapshot_json().unwrap()).unwrap();
        assert_eq!(
            value["list"],
            json!([-1, {"head": true}, 0, {"hide": [1]}, 2, {"rest": true}])
        );
        assert_eq!(value["ledger"]["ranges"], json!([{"after": 0, "count": 1}]));
        assert_eq!(value["ledger"]["visible"], json!(3));
    }

    #[test]
    fn test_restore_rejects_disagreeing_parts() {
        let mut m = ColumnManager::new(blank, ColumnConfig::default());
        m.touch(3).unwrap();
        m.hide(HideTarget::Range {
            view_index: 1,
            count: 1,
        })
        .unwrap();
        let mut snap = m.snapshot();
        // the ledger claims the run sits after view 1
        snap.ledger.ranges[0].after = 1;
        let err = ColumnManager::from_snapshot(blank, ColumnConfig::default(), &snap).unwrap_err();
        assert!(matches!(err, ColumnError::Snapshot(_)));

        let mut snap = m.snapshot();
        snap.removed.insert(0);
        assert!(ColumnManager::from_snapshot(blank, ColumnConfig::default(), &snap).is_err());
    }

    #[test]
    fn test_restore_answers_like_the_original() {
        let mut m = ColumnManager::new(blank, ColumnConfig::default());
        m.touch(7).unwrap();
        m.hide(HideTarget::Range {
            view_index: 2,
            count: 3,
        })
        .unwrap();
        m.remove(0, false).unwrap();
        let restored = ColumnManager::from_snapshot(blank, ColumnConfig::default(), &m.snapshot()).unwrap();
        assert_eq!(restored.describe(), m.describe());
        assert_eq!(restored.count(), m.count());
        assert_eq!(restored.removed(), m.removed());
        assert_eq!(restored.get_schemas(0, 10).unwrap(), m.get_schemas(0, 10).unwrap());
    }
}
