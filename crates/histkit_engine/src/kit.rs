//! Top-level facade wiring the engine components together.

use crate::config::KitConfig;
use crate::controller::SyncController;
use crate::error::KitResult;
use crate::observers::{HookId, HookRegistry};
use crate::pipeline::{MergeHookPipeline, MergeInput, PipelineOutcome};
use crate::processor::{CycleState, CycleSummary, ProcessorStats, TransactionProcessor};
use crate::retention::ManualRetentionRunner;
use crate::watermark::{WatermarkCoordinator, WatermarkKeys};
use histkit_core::{ChangeLog, ChangeType, HookContext, ViewApplier, WatermarkStore};
use std::sync::Arc;

/// One author's synchronization kit over a shared change log.
///
/// Owns the hook registry, merge pipeline, transaction processor, and
/// sync controller for a single author. Construct one per author;
/// instances for different authors run independently and share only
/// the external log and watermark store.
///
/// # Example
///
/// ```
/// use histkit_core::{Author, MemoryChangeLog, MemoryViewApplier, MemoryWatermarkStore};
/// use histkit_engine::{HistoryKit, KitConfig};
/// use std::sync::Arc;
///
/// let log = Arc::new(MemoryChangeLog::new());
/// let config = KitConfig::new(Author::new("app1"))
///     .with_authors([Author::new("app1"), Author::new("app2")])
///     .with_views(["main".to_string()]);
///
/// let kit = HistoryKit::new(
///     config,
///     log,
///     Arc::new(MemoryWatermarkStore::new()),
///     Arc::new(MemoryViewApplier::new()),
/// );
/// kit.start();
/// // ... log appends now drive processing cycles ...
/// kit.stop();
/// ```
pub struct HistoryKit {
    config: KitConfig,
    log: Arc<dyn ChangeLog>,
    watermarks: Arc<dyn WatermarkStore>,
    observers: Arc<HookRegistry>,
    pipeline: Arc<MergeHookPipeline>,
    processor: Arc<TransactionProcessor>,
    controller: SyncController,
}

impl HistoryKit {
    /// Wires a kit from a configuration and the external collaborators.
    pub fn new(
        config: KitConfig,
        log: Arc<dyn ChangeLog>,
        watermarks: Arc<dyn WatermarkStore>,
        applier: Arc<dyn ViewApplier>,
    ) -> Self {
        let observers = Arc::new(HookRegistry::new());
        let pipeline = Arc::new(MergeHookPipeline::new());

        let processor = Arc::new(TransactionProcessor::new(
            config.clone(),
            Arc::clone(&log),
            Arc::clone(&watermarks),
            applier,
            Arc::clone(&observers),
            Arc::clone(&pipeline),
        ));
        let controller = SyncController::new(Arc::clone(&processor), Arc::clone(&log));

        Self {
            config,
            log,
            watermarks,
            observers,
            pipeline,
            processor,
            controller,
        }
    }

    /// Registers a read-only observer for (entity, change type).
    pub fn register_observer<F>(
        &self,
        entity: impl Into<String>,
        change_type: ChangeType,
        callback: F,
    ) -> HookId
    where
        F: Fn(&[HookContext]) + Send + Sync + 'static,
    {
        self.observers.register(entity, change_type, callback)
    }

    /// Removes one observer by id. Returns false if the id is unknown.
    pub fn remove_observer(&self, id: HookId) -> bool {
        self.observers.remove(id)
    }

    /// Removes every observer for (entity, change type).
    pub fn remove_observers_for(&self, entity: &str, change_type: ChangeType) {
        self.observers.remove_key(entity, change_type);
    }

    /// Removes every observer.
    pub fn remove_all_observers(&self) {
        self.observers.remove_all();
    }

    /// Appends a merge hook to the pipeline.
    pub fn register_merge_hook<F>(&self, callback: F) -> HookId
    where
        F: Fn(&MergeInput<'_>) -> KitResult<PipelineOutcome> + Send + Sync + 'static,
    {
        self.pipeline.register(callback)
    }

    /// Inserts a merge hook ahead of `before` (appends if unknown).
    pub fn register_merge_hook_before<F>(&self, before: HookId, callback: F) -> HookId
    where
        F: Fn(&MergeInput<'_>) -> KitResult<PipelineOutcome> + Send + Sync + 'static,
    {
        self.pipeline.register_before(before, callback)
    }

    /// Removes one merge hook by id. Returns false if the id is
    /// unknown.
    pub fn remove_merge_hook(&self, id: HookId) -> bool {
        self.pipeline.remove(id)
    }

    /// Removes every merge hook.
    pub fn remove_all_merge_hooks(&self) {
        self.pipeline.remove_all();
    }

    /// Starts signal-driven processing.
    pub fn start(&self) {
        self.controller.start();
    }

    /// Stops signal-driven processing; an in-flight cycle finishes.
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Returns true if the controller is running.
    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Runs one processing cycle immediately, outside the signal flow.
    pub fn process_now(&self) -> KitResult<CycleSummary> {
        self.processor.process()
    }

    /// The processor's current step.
    pub fn state(&self) -> CycleState {
        self.processor.state()
    }

    /// Lifetime processing counters.
    pub fn stats(&self) -> ProcessorStats {
        self.processor.stats()
    }

    /// Builds a standalone retention runner over this kit's author set
    /// and watermark namespace, for retention decoupled from the
    /// processing cadence.
    pub fn retention_runner(&self) -> ManualRetentionRunner {
        ManualRetentionRunner::new(
            Arc::clone(&self.log),
            WatermarkCoordinator::new(
                Arc::clone(&self.watermarks),
                WatermarkKeys::new(self.config.namespace_prefix.clone()),
            ),
            self.config.all_authors(),
            self.config.batch_authors.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::RetentionOutcome;
    use histkit_core::{Author, Change, MemoryChangeLog, MemoryViewApplier, MemoryWatermarkStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn kit_for(current: &str) -> (HistoryKit, Arc<MemoryChangeLog>, Arc<MemoryViewApplier>) {
        let log = Arc::new(MemoryChangeLog::new());
        let applier = Arc::new(MemoryViewApplier::new());
        let config = KitConfig::new(Author::new(current))
            .with_authors([Author::new("app1"), Author::new("app2")])
            .with_views(["main".to_string()]);
        let kit = HistoryKit::new(
            config,
            Arc::clone(&log) as Arc<dyn ChangeLog>,
            Arc::new(MemoryWatermarkStore::new()),
            Arc::clone(&applier) as Arc<dyn ViewApplier>,
        );
        (kit, log, applier)
    }

    #[test]
    fn hook_registration_round_trip() {
        let (kit, _log, _applier) = kit_for("app2");

        let observer = kit.register_observer("Person", ChangeType::Insert, |_| {});
        assert!(kit.remove_observer(observer));
        assert!(!kit.remove_observer(observer));

        let hook = kit.register_merge_hook(|_| Ok(PipelineOutcome::Continue));
        assert!(kit.remove_merge_hook(hook));
        assert!(!kit.remove_merge_hook(hook));
    }

    #[test]
    fn process_now_runs_a_cycle() {
        let (kit, log, applier) = kit_for("app2");
        let seen = Arc::new(AtomicUsize::new(0));

        let seen2 = Arc::clone(&seen);
        kit.register_observer("Person", ChangeType::Insert, move |contexts| {
            seen2.fetch_add(contexts.len(), Ordering::SeqCst);
        });

        log.append(Author::new("app1"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        let summary = kit.process_now().unwrap();
        assert_eq!(summary.fetched, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(applier.applied_count(), 1);
        assert_eq!(kit.stats().cycles_completed, 1);
    }

    #[test]
    fn retention_runner_uses_kit_namespace() {
        let (kit, log, _applier) = kit_for("app2");

        log.append(Author::new("app1"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        // app1 has no watermark, so the runner reports not ready.
        let runner = kit.retention_runner();
        assert_eq!(runner.clean().unwrap(), RetentionOutcome::NotReady);
    }
}
