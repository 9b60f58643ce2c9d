//! Fetching unseen transactions from the change log.

use crate::error::{KitError, KitResult};
use histkit_core::{Author, ChangeLog, LogTimestamp, Transaction};
use std::sync::Arc;

/// Queries the change log for transactions this author has not seen.
///
/// The excluded author (normally the caller's own) is subtracted from
/// the author set before the query, so self-writes are never
/// reprocessed.
pub struct Fetcher {
    log: Arc<dyn ChangeLog>,
    authors: Vec<Author>,
    exclude: Author,
}

impl Fetcher {
    /// Creates a fetcher over `log` for `authors`, excluding `exclude`.
    pub fn new(log: Arc<dyn ChangeLog>, authors: Vec<Author>, exclude: Author) -> Self {
        Self {
            log,
            authors,
            exclude,
        }
    }

    /// Fetches transactions after `since` in timestamp order.
    ///
    /// `since = None` fetches from the beginning of the log. An empty
    /// result means "no work", not an error; transactions with empty
    /// change lists are passed through.
    pub fn fetch_since(&self, since: Option<LogTimestamp>) -> KitResult<Vec<Transaction>> {
        let included: Vec<Author> = self
            .authors
            .iter()
            .filter(|author| **author != self.exclude)
            .cloned()
            .collect();

        self.log.fetch(since, &included).map_err(KitError::Fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histkit_core::{Change, MemoryChangeLog};
    use uuid::Uuid;

    fn fetcher_for(log: &Arc<MemoryChangeLog>, exclude: &str) -> Fetcher {
        Fetcher::new(
            Arc::clone(log) as Arc<dyn ChangeLog>,
            vec![Author::new("app1"), Author::new("app2")],
            Author::new(exclude),
        )
    }

    #[test]
    fn excluded_author_is_never_returned() {
        let log = Arc::new(MemoryChangeLog::new());
        log.append(Author::new("app1"), vec![Change::insert(Uuid::new_v4(), "Person")]);
        log.append(Author::new("app2"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        let fetched = fetcher_for(&log, "app2").fetch_since(None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched.iter().all(|txn| txn.author != Author::new("app2")));
    }

    #[test]
    fn since_floor_is_exclusive() {
        let log = Arc::new(MemoryChangeLog::new());
        let t1 = log.append(Author::new("app1"), vec![Change::insert(Uuid::new_v4(), "Person")]);
        log.append(Author::new("app1"), vec![Change::insert(Uuid::new_v4(), "Person")]);

        let fetcher = fetcher_for(&log, "app2");
        assert_eq!(fetcher.fetch_since(None).unwrap().len(), 2);
        assert_eq!(fetcher.fetch_since(Some(t1)).unwrap().len(), 1);
    }

    #[test]
    fn empty_result_is_no_work() {
        let log = Arc::new(MemoryChangeLog::new());
        let fetched = fetcher_for(&log, "app2").fetch_since(None).unwrap();
        assert!(fetched.is_empty());
    }
}
