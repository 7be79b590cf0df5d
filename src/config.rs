//! Manager configuration.
//!
//! Deserializes from a (possibly partial) JSON object; missing keys take
//! their defaults.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnConfig {
    /// Hand removed schema indexes to later inserts. When off, removed
    /// indexes are abandoned.
    pub reuse_removed_indexes: bool,
    /// Size of the `[0, n)` schema-index range set aside before any
    /// column exists.
    pub reserved_indexes: i64,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            reuse_removed_indexes: true,
            reserved_indexes: 0,
        }
    }
}

impl ColumnConfig {
    /// Parse a JSON configuration object.
    ///
    /// # Errors
    /// Returns an error if the text is not valid JSON for this shape.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
