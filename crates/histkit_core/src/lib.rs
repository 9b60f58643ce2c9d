//! # histkit core
//!
//! Data model and collaborator interfaces for histkit.
//!
//! This crate provides:
//! - `Transaction` / `Change` value types shared with the change log
//! - `ChangeLog`, `WatermarkStore`, `ViewApplier` collaborator traits
//! - In-memory reference implementations for tests and embedders
//!
//! This is a pure interface crate with no I/O of its own: the durable
//! change log and watermark store live behind the traits defined here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod error;
mod log;
mod types;
mod watermark;

pub use applier::{AppliedChange, MemoryViewApplier, ViewApplier};
pub use error::{StoreError, StoreResult};
pub use log::{ChangeLog, MemoryChangeLog};
pub use types::{Author, Change, ChangeType, HookContext, LogTimestamp, Transaction};
pub use watermark::{MemoryWatermarkStore, WatermarkStore};
