//! Per-column schema records.
//!
//! Records are opaque JSON objects keyed by schema index. A column with no
//! stored record takes whatever the default getter produces for it; a
//! tombstone is a column that exists but carries an empty record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-owned fields of one column.
pub type SchemaRecord = serde_json::Map<String, Value>;

/// Produces the record of a column nobody has written to yet, from its
/// schema index and view index. A hidden column gets the view it would
/// take if its whole run were shown again.
pub type DefaultSchemaGetter = Box<dyn Fn(i64, i64) -> SchemaRecord>;

/// Stored state of one schema index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaSlot {
    /// Nothing stored; the default getter decides.
    #[default]
    Absent,
    /// Present but empty.
    Tombstone,
    Record(SchemaRecord),
}

impl SchemaSlot {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Sparse record storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaStore {
    slots: BTreeMap<i64, SchemaSlot>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: BTreeMap<i64, SchemaSlot>) -> Self {
        let slots = slots
            .into_iter()
            .filter(|(_, slot)| !slot.is_absent())
            .collect();
        Self { slots }
    }

    pub fn slots(&self) -> &BTreeMap<i64, SchemaSlot> {
        &self.slots
    }

    pub fn get(&self, schema: i64) -> Option<&SchemaSlot> {
        self.slots.get(&schema)
    }

    /// Store a slot; storing `Absent` clears the entry.
    pub fn put(&mut self, schema: i64, slot: SchemaSlot) {
        if slot.is_absent() {
            self.slots.remove(&schema);
        } else {
            self.slots.insert(schema, slot);
        }
    }

    /// Clear an entry and hand back what it held.
    pub fn take(&mut self, schema: i64) -> SchemaSlot {
        self.slots.remove(&schema).unwrap_or_default()
    }

    /// Fields of a column as seen by readers.
    pub fn resolve(&self, schema: i64, view: i64, getter: &DefaultSchemaGetter) -> SchemaRecord {
        match self.slots.get(&schema) {
            Some(SchemaSlot::Record(record)) => record.clone(),
            Some(SchemaSlot::Tombstone) => SchemaRecord::new(),
            Some(SchemaSlot::Absent) | None => getter(schema, view),
        }
    }

    /// Merge `payload` into the record of `schema`, materializing it from
    /// the getter first. `null` values delete the field. Returns the prior
    /// value of every touched field, `null` where the field was missing.
    pub fn merge(
        &mut self,
        schema: i64,
        view: i64,
        payload: &SchemaRecord,
        getter: &DefaultSchemaGetter,
    ) -> SchemaRecord {
        let mut record = match self.take(schema) {
            SchemaSlot::Record(record) => record,
            SchemaSlot::Tombstone => SchemaRecord::new(),
            SchemaSlot::Absent => getter(schema, view),
        };
        let mut prior = SchemaRecord::new();
        for (key, value) in payload {
            let old = if value.is_null() {
                record.remove(key)
            } else {
                record.insert(key.clone(), value.clone())
            };
            prior.insert(key.clone(), old.unwrap_or(Value::Null));
        }
        self.slots.insert(schema, SchemaSlot::Record(record));
        prior
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

    fn getter() -> DefaultSchemaGetter {
        Box::new(|schema, view| {
            let mut record = SchemaRecord::new();
            record.insert("id".into(), json!(format!("c{schema}")));
            record.insert("view".into(), json!(view));
            record
        })
    }

    fn record(value: Value) -> SchemaRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_absent_uses_getter_and_tombstone_is_empty() {
        let mut store = SchemaStore::new();
        let get = getter();
        assert_eq!(store.resolve(4, 2, &get)["id"], json!("c4"));
        store.put(4, SchemaSlot::Tombstone);
        assert!(store.resolve(4, 2, &get).is_empty());
        store.put(4, SchemaSlot::Absent);
        assert!(store.get(4).is_none());
    }

    #[test]
    fn test_merge_materializes_and_reports_prior() {
        let mut store = SchemaStore::new();
        let get = getter();
        let prior = store.merge(1, 0, &record(json!({"title": "A", "view": null})), &get);
        assert_eq!(prior, record(json!({"title": null, "view": 0})));
        assert_eq!(
            store.get(1),
            Some(&SchemaSlot::Record(record(json!({"id": "c1", "title": "A"}))))
        );

        // applying the prior values restores the fields
        store.merge(1, 0, &prior, &get);
        assert_eq!(
            store.get(1),
            Some(&SchemaSlot::Record(record(json!({"id": "c1", "view": 0}))))
        );
    }

    #[test]
    fn test_slot_serde_shape() {
        let slots = vec![
            SchemaSlot::Absent,
            SchemaSlot::Tombstone,
            SchemaSlot::Record(record(json!({"id": 1}))),
        ];
        let value = serde_json::to_value(&slots).unwrap();
        assert_eq!(value, json!(["absent", "tombstone", {"record": {"id": 1}}]));
        let back: Vec<SchemaSlot> = serde_json::from_value(value).unwrap();
        assert_eq!(back, slots);
    }
}
