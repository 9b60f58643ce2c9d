//! Multicast registry of read-only observer hooks.

use crate::group::ChangeGroup;
use histkit_core::{ChangeType, HookContext};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque handle for a registered hook.
///
/// Assigned at registration time and never reused within a process
/// lifetime; the only handle for later removal or relative insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(Uuid);

impl HookId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook:{}", self.0)
    }
}

/// Read-only observer callback, invoked once per change group.
pub type ObserverCallback = Arc<dyn Fn(&[HookContext]) + Send + Sync>;

struct RegisteredObserver {
    id: HookId,
    callback: ObserverCallback,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct HookKey {
    entity: String,
    change_type: ChangeType,
}

/// Multicast registry of observer hooks keyed by (entity, change type).
///
/// Multiple callbacks per key are allowed and run in registration
/// order. Observers are read-only by contract: the registry passes them
/// immutable contexts and their signature cannot fail the cycle.
/// Registration and removal are safe to call concurrently with an
/// in-flight fan-out; the fan-out sees the registration list as of the
/// moment it started.
#[derive(Default)]
pub struct HookRegistry {
    observers: RwLock<HashMap<HookKey, Vec<RegisteredObserver>>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for (entity, change type).
    ///
    /// Keys are created lazily; registering for an entity the log never
    /// mentions is not an error.
    pub fn register<F>(
        &self,
        entity: impl Into<String>,
        change_type: ChangeType,
        callback: F,
    ) -> HookId
    where
        F: Fn(&[HookContext]) + Send + Sync + 'static,
    {
        let id = HookId::generate();
        let key = HookKey {
            entity: entity.into(),
            change_type,
        };
        self.observers
            .write()
            .entry(key)
            .or_default()
            .push(RegisteredObserver {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Removes exactly one observer by id. Returns false if the id is
    /// unknown. A key whose last observer is removed is dropped from
    /// the map.
    pub fn remove(&self, id: HookId) -> bool {
        let mut observers = self.observers.write();
        let mut found = false;
        let mut emptied_key = None;
        for (key, list) in observers.iter_mut() {
            if let Some(index) = list.iter().position(|observer| observer.id == id) {
                list.remove(index);
                found = true;
                if list.is_empty() {
                    emptied_key = Some(key.clone());
                }
                break;
            }
        }
        if let Some(key) = emptied_key {
            observers.remove(&key);
        }
        found
    }

    /// Removes every observer registered for (entity, change type).
    pub fn remove_key(&self, entity: &str, change_type: ChangeType) {
        self.observers.write().remove(&HookKey {
            entity: entity.to_string(),
            change_type,
        });
    }

    /// Removes every observer.
    pub fn remove_all(&self) {
        self.observers.write().clear();
    }

    /// Returns the number of observers registered for a key.
    pub fn count_for(&self, entity: &str, change_type: ChangeType) -> usize {
        self.observers
            .read()
            .get(&HookKey {
                entity: entity.to_string(),
                change_type,
            })
            .map_or(0, Vec::len)
    }

    /// Invokes every observer for the group's key, in registration
    /// order, passing the entire group as one call.
    ///
    /// A key with no registered observers is a silent no-op. The
    /// registration list is snapshotted before invocation, so callbacks
    /// run without holding the registry lock.
    pub fn fan_out(&self, group: &ChangeGroup) {
        let callbacks: Vec<ObserverCallback> = {
            let observers = self.observers.read();
            let key = HookKey {
                entity: group.entity.clone(),
                change_type: group.change_type,
            };
            observers
                .get(&key)
                .map(|list| list.iter().map(|o| Arc::clone(&o.callback)).collect())
                .unwrap_or_default()
        };

        for callback in callbacks {
            callback(&group.contexts);
        }
    }
}
