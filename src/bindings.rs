//! JavaScript surface.
//!
//! Actions and outcomes cross the boundary as plain objects in the same
//! `{type, args}` shape the Rust side serializes. Snapshots travel as JSON
//! strings because their record map is keyed by integers.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::ColumnConfig;
use crate::error::ColumnError;
use crate::manager::{Action, ColumnManager, Snapshot};
use crate::schema::SchemaRecord;

/// Wrap a JS `(schemaIndex, viewIndex) => object` function. Anything that
/// is not an object becomes an empty record.
fn js_getter(getter: js_sys::Function) -> impl Fn(i64, i64) -> SchemaRecord + 'static {
    move |schema, view| {
        #[allow(clippy::cast_precision_loss)]
        let (schema, view) = (JsValue::from_f64(schema as f64), JsValue::from_f64(view as f64));
        getter
            .call2(&JsValue::NULL, &schema, &view)
            .ok()
            .and_then(|value| serde_wasm_bindgen::from_value(value).ok())
            .unwrap_or_default()
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

fn js_error(e: ColumnError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn config_from(config: JsValue) -> Result<ColumnConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(ColumnConfig::default());
    }
    Ok(serde_wasm_bindgen::from_value(config)?)
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(n: i64) -> f64 {
    n as f64
}

/// Column manager handle for JavaScript.
#[wasm_bindgen]
pub struct XlColumns {
    manager: ColumnManager,
}

#[wasm_bindgen]
impl XlColumns {
    /// Create an empty manager.
    ///
    /// # Errors
    /// Returns an error if `config` is not a valid configuration object.
    #[wasm_bindgen(constructor)]
    pub fn new(default_schema: js_sys::Function, config: JsValue) -> Result<XlColumns, JsValue> {
        console_error_panic_hook::set_once();
        let config = config_from(config)?;
        Ok(Self {
            manager: ColumnManager::new(js_getter(default_schema), config),
        })
    }

    /// Restore a manager from `snapshotJson()` output.
    ///
    /// # Errors
    /// Returns an error if the snapshot is malformed or inconsistent.
    #[wasm_bindgen(js_name = "fromSnapshot")]
    pub fn from_snapshot(
        default_schema: js_sys::Function,
        config: JsValue,
        snapshot: &str,
    ) -> Result<XlColumns, JsValue> {
        console_error_panic_hook::set_once();
        let config = config_from(config)?;
        let snapshot: Snapshot = serde_json::from_str(snapshot)
            .map_err(|e| JsValue::from_str(&format!("Snapshot parse error: {e}")))?;
        Ok(Self {
            manager: ColumnManager::from_snapshot(js_getter(default_schema), config, &snapshot)
                .map_err(js_error)?,
        })
    }

    /// Apply one `{type, args}` action; returns `{result, undo}`.
    ///
    /// # Errors
    /// Returns an error if the action is malformed or does not apply.
    #[wasm_bindgen]
    pub fn apply(&mut self, action: JsValue) -> Result<JsValue, JsValue> {
        let action: Action = serde_wasm_bindgen::from_value(action)?;
        let applied = self.manager.apply(action).map_err(js_error)?;
        to_js(&applied)
    }

    /// # Errors
    /// Returns an error if serialization fails.
    #[wasm_bindgen]
    pub fn count(&self) -> Result<JsValue, JsValue> {
        to_js(&self.manager.count())
    }

    /// # Errors
    /// Returns an error if serialization fails.
    #[wasm_bindgen]
    pub fn details(&self) -> Result<JsValue, JsValue> {
        to_js(&self.manager.details())
    }

    /// # Errors
    /// Returns an error for a negative range.
    #[wasm_bindgen(js_name = "getSchemas")]
    pub fn get_schemas(&self, begin: i32, count: i32) -> Result<JsValue, JsValue> {
        let schemas = self
            .manager
            .get_schemas(i64::from(begin), i64::from(count))
            .map_err(js_error)?;
        to_js(&schemas)
    }

    #[wasm_bindgen(js_name = "hiddenBefore")]
    pub fn hidden_before(&self, view_index: i32) -> f64 {
        to_f64(self.manager.hidden_before(i64::from(view_index)))
    }

    #[wasm_bindgen(js_name = "schemaIndexAt")]
    pub fn schema_index_at(&self, view_index: i32) -> Option<f64> {
        self.manager
            .schema_index_at(i64::from(view_index))
            .map(to_f64)
    }

    #[wasm_bindgen(js_name = "viewIndexOf")]
    pub fn view_index_of(&self, schema_index: i32) -> Option<f64> {
        self.manager
            .view_index_of(i64::from(schema_index))
            .map(to_f64)
    }

    /// # Errors
    /// Returns an error unless the manager has no columns yet.
    #[wasm_bindgen(js_name = "reserveIndexes")]
    pub fn reserve_indexes(&mut self, count: i32) -> Result<JsValue, JsValue> {
        let range = self.manager.reserve_indexes(i64::from(count)).map_err(js_error)?;
        to_js(&range)
    }

    /// # Errors
    /// Returns an error if serialization fails.
    #[wasm_bindgen(js_name = "snapshotJson")]
    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        self.manager.snapshot_json().map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn describe(&self) -> String {
        self.manager.describe()
    }
}
