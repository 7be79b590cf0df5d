//! Structured error types for xlcols.
//!
//! Every elementary action either succeeds with an undo descriptor or fails
//! with one of these values. A failed action leaves the manager untouched.

/// All errors that can occur while mutating or restoring column state.
#[derive(Debug, thiserror::Error)]
pub enum ColumnError {
    /// Negative counts, empty ranges, a reorder target inside its own span.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The index resolves to nothing (removed, hidden where a visible
    /// column is required, or out of range).
    #[error("Column not found: {0}")]
    NotFound(String),

    /// List, ledger and index sets disagree with each other.
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    /// A snapshot that does not describe a consistent state.
    #[error("Snapshot rejected: {0}")]
    Snapshot(String),

    /// JSON decoding error (CLI input, configuration, bindings).
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ColumnError>;

impl ColumnError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<ColumnError> for wasm_bindgen::JsValue {
    fn from(e: ColumnError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
