//! # histkit engine
//!
//! Synchronization and retention engine for histkit.
//!
//! Several independent authors share one append-only change log. Each
//! author runs its own processor that fetches entries it has not yet
//! seen, fans them out to observer hooks, merges them into its local
//! views, advances its watermark, and, once every required author has
//! advanced past a point, truncates the shared log.
//!
//! This crate provides:
//! - Per-author transaction processor (serialized cycle state machine)
//! - Observer hook registry and merge hook pipeline
//! - Watermark coordination across authors
//! - Retention policies and a manual retention runner
//! - Signal-driven sync controller
//!
//! ## Key Invariants
//!
//! - At most one cycle is in flight per processor; extra signals are
//!   coalesced into at most one queued cycle
//! - A watermark is advanced only after the cycle's merge succeeded,
//!   and always to the last fetched transaction's own timestamp
//! - Retention never deletes entries some required author has not yet
//!   consumed
//! - Merge hooks run strictly in order and may short-circuit the
//!   default merge; observer hooks are read-only and cannot fail a
//!   cycle

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod controller;
mod error;
mod fetch;
mod group;
mod kit;
mod observers;
mod pipeline;
mod processor;
mod retention;
mod watermark;

pub use config::{KitConfig, DEFAULT_NAMESPACE_PREFIX};
pub use controller::SyncController;
pub use error::{KitError, KitResult};
pub use fetch::Fetcher;
pub use group::{group_transaction, ChangeGroup};
pub use kit::HistoryKit;
pub use observers::{HookId, HookRegistry, ObserverCallback};
pub use pipeline::{MergeCallback, MergeHookPipeline, MergeInput, PipelineOutcome, PipelineRun};
pub use processor::{
    CycleState, CycleSummary, MergeDisposition, ProcessorStats, TransactionProcessor,
};
pub use retention::{ManualRetentionRunner, RetentionGate, RetentionOutcome, RetentionPolicy};
pub use watermark::{WatermarkCoordinator, WatermarkKeys};
