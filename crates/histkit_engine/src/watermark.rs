//! Per-author watermark keys and cross-author watermark arithmetic.

use crate::error::KitResult;
use histkit_core::{Author, LogTimestamp, StoreResult, WatermarkStore};
use std::sync::Arc;
use tracing::debug;

/// Builds watermark-store keys from a namespace prefix and an author.
///
/// Independent kit instances sharing one watermark store stay disjoint
/// by using different prefixes.
#[derive(Debug, Clone)]
pub struct WatermarkKeys {
    prefix: String,
}

impl WatermarkKeys {
    /// Creates a key namespace with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the store key for an author's watermark.
    pub fn key_for(&self, author: &Author) -> String {
        format!("{}{}", self.prefix, author)
    }
}

/// Reads and advances per-author watermarks and computes the minimum
/// across a required author set.
pub struct WatermarkCoordinator {
    store: Arc<dyn WatermarkStore>,
    keys: WatermarkKeys,
}

impl WatermarkCoordinator {
    /// Creates a coordinator over `store`, namespaced by `keys`.
    pub fn new(store: Arc<dyn WatermarkStore>, keys: WatermarkKeys) -> Self {
        Self { store, keys }
    }

    /// Returns the stored watermark for `author`, if any.
    pub fn watermark(&self, author: &Author) -> StoreResult<Option<LogTimestamp>> {
        self.store.get(&self.keys.key_for(author))
    }

    /// Advances `author`'s watermark to `timestamp`.
    ///
    /// Watermarks are monotonically non-decreasing: a timestamp behind
    /// the stored one is ignored.
    pub fn advance(&self, author: &Author, timestamp: LogTimestamp) -> StoreResult<()> {
        let key = self.keys.key_for(author);
        if let Some(existing) = self.store.get(&key)? {
            if existing >= timestamp {
                debug!(%author, %existing, %timestamp, "watermark already ahead, not advancing");
                return Ok(());
            }
        }
        self.store.set(&key, timestamp)
    }

    /// Computes the minimum watermark across `authors` minus
    /// `batch_authors`.
    ///
    /// Returns `None` ("not ready") if the required set is empty or if
    /// any required author has no recorded watermark: retention must
    /// never run ahead of an author that has not yet proven it has seen
    /// the data. Batch authors are exempt from the readiness
    /// requirement.
    pub fn minimum_ready(
        &self,
        authors: &[Author],
        batch_authors: &[Author],
    ) -> KitResult<Option<LogTimestamp>> {
        let required: Vec<&Author> = authors
            .iter()
            .filter(|author| !batch_authors.contains(author))
            .collect();

        if required.is_empty() {
            return Ok(None);
        }

        let mut minimum: Option<LogTimestamp> = None;
        for author in required {
            match self.watermark(author)? {
                None => {
                    debug!(%author, "no watermark recorded, retention not ready");
                    return Ok(None);
                }
                Some(ts) => {
                    minimum = Some(minimum.map_or(ts, |current| current.min(ts)));
                }
            }
        }

        Ok(minimum)
    }
}
