//! Error types for collaborator backends.

use thiserror::Error;

/// Result type for collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by change-log, watermark-store, or view backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The change log could not be queried.
    #[error("change log query failed: {0}")]
    LogQuery(String),

    /// The change log could not delete entries.
    #[error("change log deletion failed: {0}")]
    LogDeletion(String),

    /// The watermark store could not be read or written.
    #[error("watermark store failed for key {key}: {message}")]
    Watermark {
        /// Store key that was being accessed.
        key: String,
        /// Backend error message.
        message: String,
    },

    /// A change could not be applied to a target view.
    #[error("failed to apply change to view {view}: {message}")]
    ViewApply {
        /// Target view name.
        view: String,
        /// Backend error message.
        message: String,
    },
}

impl StoreError {
    /// Creates a watermark-store error.
    pub fn watermark(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Watermark {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a view-apply error.
    pub fn view_apply(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ViewApply {
            view: view.into(),
            message: message.into(),
        }
    }
}
