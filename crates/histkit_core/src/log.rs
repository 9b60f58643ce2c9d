//! Change-log interface and in-memory reference implementation.

use crate::error::StoreResult;
use crate::types::{Author, Change, LogTimestamp, Transaction};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// The shared append-only change log, queryable by author and position.
///
/// The durable log (indexing, on-disk format, query execution) is an
/// external collaborator; this trait is the slice of it the kit needs.
/// Implementations must be safe for concurrent access from multiple
/// authors.
pub trait ChangeLog: Send + Sync {
    /// Fetches transactions written by any of `authors` after `after`.
    ///
    /// `after = None` means the beginning of the log. Results are
    /// ordered by timestamp ascending. Transactions with empty change
    /// lists are returned, not dropped; an empty result means "no work"
    /// and is not an error.
    fn fetch(
        &self,
        after: Option<LogTimestamp>,
        authors: &[Author],
    ) -> StoreResult<Vec<Transaction>>;

    /// Deletes transactions written by any of `authors` strictly before
    /// `before`. Returns the number of deleted transactions.
    fn delete_before(&self, before: LogTimestamp, authors: &[Author]) -> StoreResult<usize>;

    /// Subscribes to the log's change signal.
    ///
    /// Each append produces one payloadless wake-up on every active
    /// subscriber. Receivers should be polled from a dedicated thread.
    fn subscribe(&self) -> Receiver<()>;
}

/// An in-memory change log for tests and embedders without a durable
/// backend yet.
///
/// Appends assign the next monotonic timestamp, store the transaction,
/// and notify every subscriber. Disconnected subscribers are pruned on
/// the next notification.
pub struct MemoryChangeLog {
    entries: RwLock<Vec<Transaction>>,
    subscribers: RwLock<Vec<Sender<()>>>,
    next_timestamp: RwLock<LogTimestamp>,
}

impl MemoryChangeLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
            next_timestamp: RwLock::new(LogTimestamp::new(1)),
        }
    }

    /// Appends a transaction for `author` and returns its timestamp.
    pub fn append(&self, author: Author, changes: Vec<Change>) -> LogTimestamp {
        let timestamp = {
            let mut next = self.next_timestamp.write();
            let assigned = *next;
            *next = next.next();
            assigned
        };

        self.entries
            .write()
            .push(Transaction::new(author, timestamp, changes));
        self.notify();
        timestamp
    }

    /// Returns the number of stored transactions.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the log holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn notify(&self) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(()).is_ok());
    }
}

impl Default for MemoryChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeLog for MemoryChangeLog {
    fn fetch(
        &self,
        after: Option<LogTimestamp>,
        authors: &[Author],
    ) -> StoreResult<Vec<Transaction>> {
        let entries = self.entries.read();
        let mut matched: Vec<Transaction> = entries
            .iter()
            .filter(|txn| authors.contains(&txn.author))
            .filter(|txn| after.is_none_or(|floor| txn.timestamp > floor))
            .cloned()
            .collect();
        matched.sort_by_key(|txn| txn.timestamp);
        Ok(matched)
    }

    fn delete_before(&self, before: LogTimestamp, authors: &[Author]) -> StoreResult<usize> {
        let mut entries = self.entries.write();
        let before_len = entries.len();
        entries.retain(|txn| txn.timestamp >= before || !authors.contains(&txn.author));
        Ok(before_len - entries.len())
    }

    fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn person_insert() -> Change {
        Change::insert(Uuid::new_v4(), "Person")
    }

    #[test]
    fn append_assigns_monotonic_timestamps() {
        let log = MemoryChangeLog::new();

        let t1 = log.append(Author::new("app1"), vec![person_insert()]);
        let t2 = log.append(Author::new("app1"), vec![person_insert()]);
        assert!(t2 > t1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn fetch_filters_by_author_and_position() {
        let log = MemoryChangeLog::new();
        let t1 = log.append(Author::new("app1"), vec![person_insert()]);
        log.append(Author::new("app2"), vec![person_insert()]);
        log.append(Author::new("app1"), vec![person_insert()]);

        let all_app1 = log.fetch(None, &[Author::new("app1")]).unwrap();
        assert_eq!(all_app1.len(), 2);

        let after_t1 = log.fetch(Some(t1), &[Author::new("app1")]).unwrap();
        assert_eq!(after_t1.len(), 1);

        let nobody = log.fetch(None, &[]).unwrap();
        assert!(nobody.is_empty());
    }

    #[test]
    fn fetch_keeps_empty_transactions() {
        let log = MemoryChangeLog::new();
        log.append(Author::new("app1"), vec![]);

        let fetched = log.fetch(None, &[Author::new("app1")]).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].changes.is_empty());
    }

    #[test]
    fn delete_before_is_bounded_and_author_scoped() {
        let log = MemoryChangeLog::new();
        log.append(Author::new("app1"), vec![person_insert()]);
        log.append(Author::new("app2"), vec![person_insert()]);
        let t3 = log.append(Author::new("app1"), vec![person_insert()]);

        let deleted = log.delete_before(t3, &[Author::new("app1")]).unwrap();
        assert_eq!(deleted, 1);

        // app2's entry and app1's entry at t3 survive.
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn subscribers_receive_one_signal_per_append() {
        let log = MemoryChangeLog::new();
        let rx = log.subscribe();

        log.append(Author::new("app1"), vec![person_insert()]);
        log.append(Author::new("app1"), vec![person_insert()]);

        rx.recv_timeout(Duration::from_millis(100)).unwrap();
        rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnected_subscribers_are_pruned() {
        let log = MemoryChangeLog::new();
        let rx = log.subscribe();
        drop(rx);

        // Next append notices the dead receiver and drops the sender.
        log.append(Author::new("app1"), vec![person_insert()]);
        assert_eq!(log.subscribers.read().len(), 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fetch_is_ascending_and_author_scoped(
                writers in proptest::collection::vec(0u8..3, 1..40),
                cursor in proptest::option::of(0u64..50),
            ) {
                let log = MemoryChangeLog::new();
                for writer in &writers {
                    log.append(Author::new(format!("app{writer}")), vec![]);
                }

                let after = cursor.map(LogTimestamp::new);
                let fetched = log
                    .fetch(after, &[Author::new("app0"), Author::new("app1")])
                    .unwrap();

                for txn in &fetched {
                    prop_assert_ne!(txn.author.as_str(), "app2");
                    if let Some(floor) = after {
                        prop_assert!(txn.timestamp > floor);
                    }
                }
                for pair in fetched.windows(2) {
                    prop_assert!(pair[0].timestamp < pair[1].timestamp);
                }
            }
        }
    }
}
