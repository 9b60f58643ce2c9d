//! Watermark-store interface and in-memory reference implementation.

use crate::error::StoreResult;
use crate::types::LogTimestamp;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Durable key → timestamp map shared by every author.
///
/// One key per author (callers namespace keys with a prefix so that
/// independent kit instances sharing one store stay disjoint). Reads
/// and writes must be atomic per key; the backing store (file, shared
/// database row, registry) is the implementer's choice.
pub trait WatermarkStore: Send + Sync {
    /// Returns the stored watermark for `key`, if any.
    fn get(&self, key: &str) -> StoreResult<Option<LogTimestamp>>;

    /// Stores the watermark for `key`.
    fn set(&self, key: &str, timestamp: LogTimestamp) -> StoreResult<()>;
}

/// An in-memory watermark store for tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    entries: RwLock<HashMap<String, LogTimestamp>>,
}

impl MemoryWatermarkStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self, key: &str) -> StoreResult<Option<LogTimestamp>> {
        Ok(self.entries.read().get(key).copied())
    }

    fn set(&self, key: &str, timestamp: LogTimestamp) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), timestamp);
        Ok(())
    }
}
