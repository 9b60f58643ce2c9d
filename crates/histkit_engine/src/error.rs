//! Error types for the sync engine.

use histkit_core::StoreError;
use thiserror::Error;
use tracing::Level;

/// Result type for engine operations.
pub type KitResult<T> = Result<T, KitError>;

/// Errors that can occur during a processing cycle.
///
/// Every variant is safe to retry on the next signal: a failed cycle
/// never advances the watermark, so the same batch is re-fetched.
#[derive(Error, Debug)]
pub enum KitError {
    /// The change log query failed. The cycle aborted before any
    /// mutation.
    #[error("fetch failed: {0}")]
    Fetch(#[source] StoreError),

    /// A merge hook failed. The cycle aborted before the default merge
    /// and before the watermark advance; hooks must tolerate replay.
    #[error("merge hook failed: {0}")]
    MergeHook(String),

    /// The default merge could not apply a change to a target view.
    #[error("default merge failed: {0}")]
    Merge(#[source] StoreError),

    /// Log deletion failed. Does not affect fetch/merge/watermark
    /// correctness; retried on the next eligible cycle.
    #[error("retention failed: {0}")]
    Retention(#[source] StoreError),

    /// A collaborator failed outside a more specific phase (watermark
    /// store reads/writes).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl KitError {
    /// Creates a merge-hook error. Intended for merge hook callbacks
    /// that need to abort the cycle.
    pub fn merge_hook(message: impl Into<String>) -> Self {
        Self::MergeHook(message.into())
    }

    /// The severity this error should be logged at.
    ///
    /// Retention failures are warnings (correctness is unaffected and
    /// cleanup is retried); everything else is an error.
    pub fn severity(&self) -> Level {
        match self {
            KitError::Retention(_) => Level::WARN,
            _ => Level::ERROR,
        }
    }
}
