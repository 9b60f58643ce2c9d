//! View-applier interface and in-memory reference implementation.

use crate::error::StoreResult;
use crate::types::Change;
use parking_lot::RwLock;

/// Applies a fetched change to one local data view.
///
/// Used by the kit's default merge step only; merge hooks may bypass it
/// entirely. Implementations are expected to be idempotent: re-applying
/// an already-applied change is a no-op or safely overwrites, since a
/// retried cycle re-delivers the same transactions.
pub trait ViewApplier: Send + Sync {
    /// Applies `change` to the view named `view`.
    fn apply(&self, change: &Change, view: &str) -> StoreResult<()>;
}

/// A change as applied to a named view, recorded by [`MemoryViewApplier`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    /// Target view name.
    pub view: String,
    /// The applied change.
    pub change: Change,
}

/// An in-memory applier that records every applied change.
///
/// Useful for tests and for embedders that want to observe the default
/// merge step before wiring a real view backend.
#[derive(Debug, Default)]
pub struct MemoryViewApplier {
    applied: RwLock<Vec<AppliedChange>>,
}

impl MemoryViewApplier {
    /// Creates a new applier with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every applied change in application order.
    pub fn applied(&self) -> Vec<AppliedChange> {
        self.applied.read().clone()
    }

    /// Returns the number of applied changes.
    pub fn applied_count(&self) -> usize {
        self.applied.read().len()
    }
}

impl ViewApplier for MemoryViewApplier {
    fn apply(&self, change: &Change, view: &str) -> StoreResult<()> {
        self.applied.write().push(AppliedChange {
            view: view.to_string(),
            change: change.clone(),
        });
        Ok(())
    }
}
