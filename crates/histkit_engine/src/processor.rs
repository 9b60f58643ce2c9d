//! Per-author transaction processing cycle.

use crate::config::KitConfig;
use crate::error::{KitError, KitResult};
use crate::fetch::Fetcher;
use crate::group::{group_transaction, ChangeGroup};
use crate::observers::HookRegistry;
use crate::pipeline::{MergeHookPipeline, MergeInput, PipelineRun};
use crate::retention::{clean_once, RetentionGate, RetentionOutcome};
use crate::watermark::{WatermarkCoordinator, WatermarkKeys};
use histkit_core::{ChangeLog, LogTimestamp, Transaction, ViewApplier, WatermarkStore};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

/// The step a processor is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// No cycle in flight.
    Idle,
    /// Querying the change log.
    Fetching,
    /// Grouping fetched changes.
    Grouping,
    /// Dispatching observer hooks.
    FanningOut,
    /// Running the merge pipeline and default merge.
    Merging,
    /// Persisting this author's watermark.
    AdvancingWatermark,
    /// Deciding on and possibly performing retention.
    MaybeRetaining,
}

impl CycleState {
    /// Returns true if a cycle is in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self, CycleState::Idle)
    }
}

/// Counters accumulated across a processor's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ProcessorStats {
    /// Cycles that ran to completion.
    pub cycles_completed: u64,
    /// Cycles that found no work.
    pub empty_cycles: u64,
    /// Transactions fetched and processed.
    pub transactions_processed: u64,
    /// Changes applied by the default merge.
    pub changes_applied: u64,
    /// Cycles whose default merge was short-circuited by a merge hook.
    pub merges_short_circuited: u64,
    /// Transactions deleted by retention.
    pub transactions_deleted: u64,
    /// Signals coalesced into an already-queued cycle.
    pub signals_coalesced: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
}

/// How the merge step of a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDisposition {
    /// Nothing was fetched, so nothing ran.
    NoWork,
    /// The default merge applied the batch to every target view.
    Applied,
    /// A merge hook finished the batch; the default merge was skipped.
    ShortCircuited,
}

/// Result of one processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Number of transactions fetched.
    pub fetched: usize,
    /// How the merge step ended.
    pub merge: MergeDisposition,
    /// The watermark after this cycle, if it advanced.
    pub watermark: Option<LogTimestamp>,
    /// Outcome of the retention step.
    pub retention: RetentionOutcome,
    /// True if this call found a cycle in flight and only queued
    /// another one.
    pub coalesced: bool,
}

impl CycleSummary {
    fn no_work() -> Self {
        Self {
            fetched: 0,
            merge: MergeDisposition::NoWork,
            watermark: None,
            retention: RetentionOutcome::Skipped,
            coalesced: false,
        }
    }

    fn queued() -> Self {
        Self {
            coalesced: true,
            ..Self::no_work()
        }
    }
}

/// Orchestrates one author's fetch → fan-out → merge → watermark →
/// retention cycle.
///
/// The processor is a serialized state machine: at most one cycle is in
/// flight at a time. A call to [`process`](Self::process) that finds a
/// cycle already running sets a pending flag and returns; the lock
/// holder drains queued wake-ups before returning, so concurrent
/// wake-ups coalesce instead of overlapping and none is lost. Multiple
/// processors for different authors run fully independently and share
/// only the external log and watermark store.
pub struct TransactionProcessor {
    config: KitConfig,
    fetcher: Fetcher,
    observers: Arc<HookRegistry>,
    pipeline: Arc<MergeHookPipeline>,
    applier: Arc<dyn ViewApplier>,
    log: Arc<dyn ChangeLog>,
    coordinator: WatermarkCoordinator,
    gate: Mutex<RetentionGate>,
    state: RwLock<CycleState>,
    stats: RwLock<ProcessorStats>,
    cycle: Mutex<()>,
    pending: AtomicBool,
}

impl TransactionProcessor {
    /// Creates a processor for the configured author.
    pub fn new(
        config: KitConfig,
        log: Arc<dyn ChangeLog>,
        watermarks: Arc<dyn WatermarkStore>,
        applier: Arc<dyn ViewApplier>,
        observers: Arc<HookRegistry>,
        pipeline: Arc<MergeHookPipeline>,
    ) -> Self {
        let fetcher = Fetcher::new(
            Arc::clone(&log),
            config.all_authors(),
            config.current_author.clone(),
        );
        let coordinator = WatermarkCoordinator::new(
            watermarks,
            WatermarkKeys::new(config.namespace_prefix.clone()),
        );
        let gate = Mutex::new(RetentionGate::new(config.retention));

        Self {
            fetcher,
            coordinator,
            gate,
            config,
            observers,
            pipeline,
            applier,
            log,
            state: RwLock::new(CycleState::Idle),
            stats: RwLock::new(ProcessorStats::default()),
            cycle: Mutex::new(()),
            pending: AtomicBool::new(false),
        }
    }

    /// The step currently executing.
    pub fn state(&self) -> CycleState {
        *self.state.read()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> ProcessorStats {
        self.stats.read().clone()
    }

    /// Runs processing cycles until no queued wake-up remains.
    ///
    /// If a cycle is already in flight, queues a pending cycle and
    /// returns immediately with `coalesced = true`; the in-flight call
    /// runs it before returning. Errors leave the watermark untouched;
    /// the next signal retries the same batch.
    pub fn process(&self) -> KitResult<CycleSummary> {
        let Some(guard) = self.cycle.try_lock() else {
            self.pending.store(true, Ordering::SeqCst);
            self.stats.write().signals_coalesced += 1;
            debug!(author = %self.config.current_author, "cycle in flight, wake-up coalesced");
            return Ok(CycleSummary::queued());
        };

        let mut outcome = {
            let _guard = guard;
            let mut outcome = self.run_cycle();
            while self.pending.swap(false, Ordering::SeqCst) {
                outcome = self.run_cycle();
            }
            outcome
        };

        // A wake-up can land between the last pending check and the
        // unlock above. Whoever holds the lock next drains it; if the
        // lock is still free, that has to be this call.
        while self.pending.load(Ordering::SeqCst) {
            let Some(_guard) = self.cycle.try_lock() else {
                break;
            };
            if !self.pending.swap(false, Ordering::SeqCst) {
                break;
            }
            outcome = self.run_cycle();
        }
        outcome
    }

    fn run_cycle(&self) -> KitResult<CycleSummary> {
        let result = self.run_cycle_steps();
        *self.state.write() = CycleState::Idle;

        if let Err(err) = &result {
            self.stats.write().last_error = Some(err.to_string());
            self.log_failure(err, "processing cycle failed");
        }
        result
    }

    /// Logs a cycle failure at the error's own severity.
    fn log_failure(&self, err: &KitError, message: &'static str) {
        let author = &self.config.current_author;
        match err.severity() {
            Level::WARN => warn!(%author, %err, "{message}"),
            _ => error!(%author, %err, "{message}"),
        }
    }

    fn run_cycle_steps(&self) -> KitResult<CycleSummary> {
        let author = &self.config.current_author;

        self.set_state(CycleState::Fetching);
        let since = self.coordinator.watermark(author)?;
        let transactions = self.fetcher.fetch_since(since)?;

        let Some(last_timestamp) = transactions.last().map(|txn| txn.timestamp) else {
            debug!(%author, "no unseen transactions");
            self.stats.write().empty_cycles += 1;
            return Ok(CycleSummary::no_work());
        };
        debug!(%author, fetched = transactions.len(), "fetched unseen transactions");

        self.set_state(CycleState::Grouping);
        let grouped: Vec<Vec<ChangeGroup>> =
            transactions.iter().map(group_transaction).collect();

        self.set_state(CycleState::FanningOut);
        for groups in &grouped {
            for group in groups {
                self.observers.fan_out(group);
            }
        }

        self.set_state(CycleState::Merging);
        let merge = self.merge(&transactions)?;

        self.set_state(CycleState::AdvancingWatermark);
        self.coordinator.advance(author, last_timestamp)?;

        self.set_state(CycleState::MaybeRetaining);
        let retention = self.maybe_retain();

        let applied = match merge {
            MergeDisposition::Applied => {
                let changes: usize = transactions.iter().map(|txn| txn.changes.len()).sum();
                (changes * self.config.views.len()) as u64
            }
            _ => 0,
        };
        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.transactions_processed += transactions.len() as u64;
            stats.changes_applied += applied;
            if merge == MergeDisposition::ShortCircuited {
                stats.merges_short_circuited += 1;
            }
            if let RetentionOutcome::Deleted(count) = retention {
                stats.transactions_deleted += count as u64;
            }
            stats.last_error = None;
        }
        info!(
            %author,
            fetched = transactions.len(),
            watermark = %last_timestamp,
            "processing cycle completed"
        );

        Ok(CycleSummary {
            fetched: transactions.len(),
            merge,
            watermark: Some(last_timestamp),
            retention,
            coalesced: false,
        })
    }

    /// Runs the merge pipeline once for the whole batch; if no hook
    /// finished it, applies every change to every target view in fetch
    /// order.
    fn merge(&self, transactions: &[Transaction]) -> KitResult<MergeDisposition> {
        let input = MergeInput {
            transactions,
            views: &self.config.views,
        };

        if self.pipeline.run(&input)? == PipelineRun::ShortCircuited {
            return Ok(MergeDisposition::ShortCircuited);
        }

        for transaction in transactions {
            for change in &transaction.changes {
                for view in &self.config.views {
                    self.applier
                        .apply(change, view)
                        .map_err(KitError::Merge)?;
                }
            }
        }
        Ok(MergeDisposition::Applied)
    }

    /// Consults the retention gate and, if allowed, attempts cleanup.
    ///
    /// Retention failures never fail the cycle; they are logged and
    /// retried on the next eligible cycle.
    fn maybe_retain(&self) -> RetentionOutcome {
        if !self.gate.lock().allowed_to_clean() {
            return RetentionOutcome::Skipped;
        }

        match clean_once(
            &self.log,
            &self.coordinator,
            &self.config.all_authors(),
            &self.config.batch_authors,
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.log_failure(&err, "retention attempt failed");
                self.stats.write().last_error = Some(err.to_string());
                RetentionOutcome::Failed
            }
        }
    }

    fn set_state(&self, state: CycleState) {
        *self.state.write() = state;
    }
}
