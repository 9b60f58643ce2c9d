//! Core type definitions for histkit.

use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Position of an entry in the shared change log.
///
/// Timestamps are assigned by the log and are monotonically increasing
/// per log. They are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogTimestamp(pub u64);

impl LogTimestamp {
    /// Creates a new log timestamp.
    #[must_use]
    pub const fn new(ts: u64) -> Self {
        Self(ts)
    }

    /// Returns the raw timestamp value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next timestamp.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LogTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

/// A logical writer/reader identity sharing one change log.
///
/// Typically one process or app instance. Authors identify who wrote a
/// transaction and key the per-author watermarks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Author(String);

impl Author {
    /// Creates a new author identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the author name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Author {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Type of change recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// A record was inserted.
    Insert,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
}

/// A single recorded mutation of one record.
///
/// Changes are produced by the external log and are read-only to this
/// kit. `preserved_attributes` is populated only for deletes, and only
/// for attributes the store was configured to preserve; values are
/// pre-converted to string form by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Stable identifier of the affected record.
    pub record_id: Uuid,
    /// Entity (record type) name.
    pub entity: String,
    /// Type of change.
    pub change_type: ChangeType,
    /// Attribute snapshot captured at delete time, if any.
    pub preserved_attributes: Option<BTreeMap<String, String>>,
}

impl Change {
    /// Creates an insert change.
    pub fn insert(record_id: Uuid, entity: impl Into<String>) -> Self {
        Self {
            record_id,
            entity: entity.into(),
            change_type: ChangeType::Insert,
            preserved_attributes: None,
        }
    }

    /// Creates an update change.
    pub fn update(record_id: Uuid, entity: impl Into<String>) -> Self {
        Self {
            record_id,
            entity: entity.into(),
            change_type: ChangeType::Update,
            preserved_attributes: None,
        }
    }

    /// Creates a delete change with no preserved attributes.
    pub fn delete(record_id: Uuid, entity: impl Into<String>) -> Self {
        Self {
            record_id,
            entity: entity.into(),
            change_type: ChangeType::Delete,
            preserved_attributes: None,
        }
    }

    /// Creates a delete change carrying a tombstone attribute snapshot.
    pub fn delete_with_attributes(
        record_id: Uuid,
        entity: impl Into<String>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            record_id,
            entity: entity.into(),
            change_type: ChangeType::Delete,
            preserved_attributes: Some(attributes),
        }
    }

    /// Looks up a preserved attribute value by name.
    ///
    /// Absence means the store did not preserve that attribute.
    pub fn preserved_attribute(&self, name: &str) -> Option<&str> {
        self.preserved_attributes
            .as_ref()
            .and_then(|attrs| attrs.get(name))
            .map(String::as_str)
    }
}

/// One committed entry in the shared change log.
///
/// Transactions are immutable once fetched. Within a fetch they are
/// ordered by timestamp ascending; changes keep the order in which the
/// author recorded them.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Author that wrote this transaction.
    pub author: Author,
    /// Position in the log, monotonic per log.
    pub timestamp: LogTimestamp,
    /// Changes in recorded order.
    pub changes: Vec<Change>,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn new(author: Author, timestamp: LogTimestamp, changes: Vec<Change>) -> Self {
        Self {
            author,
            timestamp,
            changes,
        }
    }
}

/// A per-change context handed to observer hooks.
///
/// Augments a `Change` with the owning transaction's author and
/// timestamp. Immutable and safe to pass across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    /// Author of the owning transaction.
    pub author: Author,
    /// Timestamp of the owning transaction.
    pub timestamp: LogTimestamp,
    /// The change itself.
    pub change: Change,
}

impl HookContext {
    /// Creates a context for one change of a transaction.
    pub fn new(transaction: &Transaction, change: &Change) -> Self {
        Self {
            author: transaction.author.clone(),
            timestamp: transaction.timestamp,
            change: change.clone(),
        }
    }
}
