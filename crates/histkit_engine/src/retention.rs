//! Retention policies and log truncation.

use crate::error::{KitError, KitResult};
use crate::watermark::WatermarkCoordinator;
use histkit_core::{Author, ChangeLog};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// When automatic retention may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Never during processing cycles; retention happens only through
    /// the [`ManualRetentionRunner`].
    None,
    /// At most once per interval.
    ByDuration(Duration),
    /// Every nth cycle (n clamped to at least 1).
    ByCount(u32),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::None
    }
}

/// Stateful throttle deciding whether a cycle may perform retention.
///
/// Called once per processing cycle. State is in-memory only and resets
/// on restart; that is acceptable because the gate throttles frequency,
/// not correctness.
#[derive(Debug)]
pub struct RetentionGate {
    policy: RetentionPolicy,
    last_allowed: Option<Instant>,
    calls: u32,
}

impl RetentionGate {
    /// Creates a gate for the given policy.
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            last_allowed: None,
            calls: 0,
        }
    }

    /// Returns true if this cycle may attempt retention.
    pub fn allowed_to_clean(&mut self) -> bool {
        match self.policy {
            RetentionPolicy::None => false,
            RetentionPolicy::ByDuration(interval) => {
                let now = Instant::now();
                let due = self
                    .last_allowed
                    .is_none_or(|last| now.duration_since(last) >= interval);
                if due {
                    self.last_allowed = Some(now);
                }
                due
            }
            RetentionPolicy::ByCount(n) => {
                let n = n.max(1);
                self.calls += 1;
                if self.calls >= n {
                    self.calls = 0;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Outcome of one retention attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionOutcome {
    /// The policy did not allow retention this cycle.
    Skipped,
    /// Some required author has no recorded watermark yet (or the
    /// required set was empty); nothing was deleted.
    NotReady,
    /// Transactions before the minimum watermark were deleted.
    Deleted(usize),
    /// Deletion failed; it will be retried on the next eligible cycle.
    Failed,
}

/// Computes the minimum ready watermark and truncates the log below it.
///
/// Shared by the processor's retention step and the manual runner.
pub(crate) fn clean_once(
    log: &Arc<dyn ChangeLog>,
    coordinator: &WatermarkCoordinator,
    authors: &[Author],
    batch_authors: &[Author],
) -> KitResult<RetentionOutcome> {
    let Some(minimum) = coordinator.minimum_ready(authors, batch_authors)? else {
        debug!("retention not ready, skipping deletion");
        return Ok(RetentionOutcome::NotReady);
    };

    // Batch authors' transactions are deleted too; they are only exempt
    // from the readiness requirement.
    let deleted = log
        .delete_before(minimum, authors)
        .map_err(KitError::Retention)?;
    info!(%minimum, deleted, "retention truncated change log");
    Ok(RetentionOutcome::Deleted(deleted))
}

/// On-demand retention for callers who disable automatic retention.
///
/// Independent of the retention policy and the sync controller: the
/// same watermark arithmetic, invoked directly (for example when the
/// app moves to the background).
pub struct ManualRetentionRunner {
    log: Arc<dyn ChangeLog>,
    coordinator: WatermarkCoordinator,
    authors: Vec<Author>,
    batch_authors: Vec<Author>,
}

impl ManualRetentionRunner {
    /// Creates a runner over the given log and coordinator.
    pub fn new(
        log: Arc<dyn ChangeLog>,
        coordinator: WatermarkCoordinator,
        authors: Vec<Author>,
        batch_authors: Vec<Author>,
    ) -> Self {
        Self {
            log,
            coordinator,
            authors,
            batch_authors,
        }
    }

    /// Performs one retention pass.
    ///
    /// Returns [`RetentionOutcome::NotReady`] if some required author
    /// has not recorded a watermark yet.
    pub fn clean(&self) -> KitResult<RetentionOutcome> {
        clean_once(&self.log, &self.coordinator, &self.authors, &self.batch_authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::WatermarkKeys;
    use histkit_core::{Change, MemoryChangeLog, MemoryWatermarkStore, WatermarkStore};
    use uuid::Uuid;

    #[test]
    fn policy_none_never_allows() {
        let mut gate = RetentionGate::new(RetentionPolicy::None);
        for _ in 0..5 {
            assert!(!gate.allowed_to_clean());
        }
    }

    #[test]
    fn policy_by_duration_allows_first_then_rate_limits() {
        let mut gate = RetentionGate::new(RetentionPolicy::ByDuration(Duration::from_secs(3600)));
        assert!(gate.allowed_to_clean());
        assert!(!gate.allowed_to_clean());
        assert!(!gate.allowed_to_clean());
    }

    #[test]
    fn policy_by_duration_zero_interval_always_allows() {
        let mut gate = RetentionGate::new(RetentionPolicy::ByDuration(Duration::ZERO));
        assert!(gate.allowed_to_clean());
        assert!(gate.allowed_to_clean());
    }

    #[test]
    fn policy_by_count_three() {
        let mut gate = RetentionGate::new(RetentionPolicy::ByCount(3));
        assert!(!gate.allowed_to_clean()); // call 1
        assert!(!gate.allowed_to_clean()); // call 2
        assert!(gate.allowed_to_clean()); // call 3
        assert!(!gate.allowed_to_clean()); // call 4 (counter reset)
        assert!(!gate.allowed_to_clean()); // call 5
        assert!(gate.allowed_to_clean()); // call 6
    }

    #[test]
    fn policy_by_count_clamps_to_one() {
        let mut gate = RetentionGate::new(RetentionPolicy::ByCount(0));
        assert!(gate.allowed_to_clean());
        assert!(gate.allowed_to_clean());

        let mut every = RetentionGate::new(RetentionPolicy::ByCount(1));
        assert!(every.allowed_to_clean());
        assert!(every.allowed_to_clean());
    }

    fn runner(
        log: &Arc<MemoryChangeLog>,
        store: &Arc<MemoryWatermarkStore>,
        authors: Vec<Author>,
        batch: Vec<Author>,
    ) -> ManualRetentionRunner {
        ManualRetentionRunner::new(
            Arc::clone(log) as Arc<dyn ChangeLog>,
            WatermarkCoordinator::new(
                Arc::clone(store) as Arc<dyn WatermarkStore>,
                WatermarkKeys::new("test."),
            ),
            authors,
            batch,
        )
    }

    #[test]
    fn manual_clean_not_ready_without_watermarks() {
        let log = Arc::new(MemoryChangeLog::new());
        let store = Arc::new(MemoryWatermarkStore::new());
        log.append(Author::new("A"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        let runner = runner(&log, &store, vec![Author::new("A"), Author::new("B")], vec![]);
        assert_eq!(runner.clean().unwrap(), RetentionOutcome::NotReady);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn manual_clean_deletes_below_minimum() {
        let log = Arc::new(MemoryChangeLog::new());
        let store = Arc::new(MemoryWatermarkStore::new());

        let t1 = log.append(Author::new("A"), vec![Change::insert(Uuid::new_v4(), "Person")]);
        let t2 = log.append(Author::new("B"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        store.set("test.A", t2).unwrap();
        store.set("test.B", t1).unwrap();

        let runner = runner(&log, &store, vec![Author::new("A"), Author::new("B")], vec![]);
        // Minimum is t1; only entries strictly before t1 are deleted.
        assert_eq!(runner.clean().unwrap(), RetentionOutcome::Deleted(0));

        store.set("test.B", t2).unwrap();
        assert_eq!(runner.clean().unwrap(), RetentionOutcome::Deleted(1));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn manual_clean_deletes_batch_author_entries() {
        let log = Arc::new(MemoryChangeLog::new());
        let store = Arc::new(MemoryWatermarkStore::new());

        log.append(Author::new("Batch"), vec![Change::insert(Uuid::new_v4(), "Person")]);
        let t2 = log.append(Author::new("A"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        store.set("test.A", t2).unwrap();

        let runner = runner(
            &log,
            &store,
            vec![Author::new("A"), Author::new("Batch")],
            vec![Author::new("Batch")],
        );

        // Batch has no watermark yet retention is ready, and its entry
        // below the minimum is deleted.
        assert_eq!(runner.clean().unwrap(), RetentionOutcome::Deleted(1));
        assert_eq!(log.len(), 1);
    }
}
