//! Ordered, short-circuiting pipeline of merge hooks.

use crate::error::KitResult;
use crate::observers::HookId;
use histkit_core::Transaction;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// What a merge hook tells the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Proceed to the next hook (or the default merge).
    Continue,
    /// Skip the remaining hooks and the default merge.
    Finish,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineRun {
    /// Every hook ran and returned `Continue` (or the pipeline was
    /// empty); the default merge should execute.
    Completed,
    /// A hook returned `Finish`; the default merge is skipped.
    ShortCircuited,
}

/// The whole cycle's batch, handed to each merge hook.
///
/// Exposing the full batch (rather than one change at a time) enables
/// cross-cutting logic such as validation, deduplication, or conflict
/// resolution over everything the cycle fetched.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    /// Every transaction fetched this cycle, in fetch order.
    pub transactions: &'a [Transaction],
    /// Names of the target views the default merge would apply to.
    pub views: &'a [String],
}

/// Fallible merge hook callback.
pub type MergeCallback = Arc<dyn Fn(&MergeInput<'_>) -> KitResult<PipelineOutcome> + Send + Sync>;

struct MergeHook {
    id: HookId,
    callback: MergeCallback,
}

/// Ordered, mutable list of merge hooks executed serially with
/// short-circuit semantics.
///
/// Hooks run strictly in list order; each one finishes before the next
/// starts. A hook that returns [`PipelineOutcome::Finish`] skips the
/// rest of the pipeline and the default merge. A hook error aborts the
/// cycle before the default merge and before any watermark advance.
#[derive(Default)]
pub struct MergeHookPipeline {
    hooks: RwLock<Vec<MergeHook>>,
}

impl MergeHookPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a merge hook to the end of the pipeline.
    pub fn register<F>(&self, callback: F) -> HookId
    where
        F: Fn(&MergeInput<'_>) -> KitResult<PipelineOutcome> + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(callback))
    }

    /// Inserts a merge hook immediately ahead of `before`.
    ///
    /// If `before` does not name a currently registered hook, the new
    /// hook is appended instead; anchoring to an unknown id is never an
    /// error.
    pub fn register_before<F>(&self, before: HookId, callback: F) -> HookId
    where
        F: Fn(&MergeInput<'_>) -> KitResult<PipelineOutcome> + Send + Sync + 'static,
    {
        self.insert(Some(before), Arc::new(callback))
    }

    fn insert(&self, before: Option<HookId>, callback: MergeCallback) -> HookId {
        let id = HookId::generate();
        let mut hooks = self.hooks.write();
        let hook = MergeHook { id, callback };

        let position = before
            .and_then(|anchor| hooks.iter().position(|existing| existing.id == anchor))
            .unwrap_or(hooks.len());
        hooks.insert(position, hook);
        id
    }

    /// Removes a merge hook by id. Returns false if the id is unknown.
    pub fn remove(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        match hooks.iter().position(|hook| hook.id == id) {
            Some(index) => {
                hooks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every merge hook.
    pub fn remove_all(&self) {
        self.hooks.write().clear();
    }

    /// Returns the number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Runs the pipeline over the cycle's batch.
    ///
    /// Executes hooks strictly in list order, waiting for each to
    /// return before starting the next. Returns how the run ended; a
    /// hook error propagates and aborts the cycle.
    pub fn run(&self, input: &MergeInput<'_>) -> KitResult<PipelineRun> {
        let hooks: Vec<(HookId, MergeCallback)> = {
            let hooks = self.hooks.read();
            hooks
                .iter()
                .map(|hook| (hook.id, Arc::clone(&hook.callback)))
                .collect()
        };

        for (id, callback) in hooks {
            match callback(input)? {
                PipelineOutcome::Continue => {}
                PipelineOutcome::Finish => {
                    debug!(%id, "merge pipeline short-circuited");
                    return Ok(PipelineRun::ShortCircuited);
                }
            }
        }

        Ok(PipelineRun::Completed)
    }
}
