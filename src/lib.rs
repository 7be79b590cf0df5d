//! xlcols - column ordering and visibility engine for spreadsheet grids
//!
//! Tracks which schema slot sits at which visible position across an
//! unbounded number of columns, without materializing them:
//! - Compressed ordering list with an open tail for untouched columns
//! - Run-length ledger of hidden columns
//! - Cached view index to schema index resolution
//! - Reversible insert/remove/hide/unhide/reorder actions with undo
//!   descriptors
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { XlColumns } from 'xlcols';
//! await init();
//! const cols = new XlColumns((schemaIndex, viewIndex) => ({ id: `c${schemaIndex}` }));
//! const { undo } = cols.apply({ type: 'hide', args: { view_index: 0, count: 2 } });
//! cols.apply(undo);
//! ```

pub mod allocator;
pub mod bindings;
pub mod config;
pub mod error;
pub mod ledger;
pub mod list;
pub mod manager;
pub mod replay;
pub mod resolver;
pub mod schema;

use wasm_bindgen::prelude::*;

pub use bindings::XlColumns;
pub use config::ColumnConfig;
pub use error::{ColumnError, Result};
pub use manager::{
    Action, Applied, ColumnCount, ColumnManager, ColumnSchema, HideTarget, Outcome, Snapshot,
    UnhideTarget,
};
pub use schema::{SchemaRecord, SchemaSlot};

/// Get the library version
#[must_use]
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
