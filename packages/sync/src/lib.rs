//! # Scenelink Sync
//!
//! Two-way synchronization between local entities and a remote viewer.
//!
//! ## Flow
//!
//! ```text
//! local edit ──► push_record ──► txn: read → apply → write → commit
//!                    │
//!                    └── locked? skip (bulk scope flushes later)
//!
//! read ──► pull_record ──► txn: read → locate record by name
//! ```
//!
//! Entities hold a [`RemoteLink`] (weak viewer handle + reentrant lock).
//! The viewer itself is injected by the caller through the [`Viewer`]
//! trait; [`MemoryViewer`] is the in-process implementation.

mod errors;
mod link;
mod records;
mod viewer;

pub use errors::SyncError;
pub use link::{LinkState, RemoteLink};
pub use records::{
    apply_push, count_records, drop_record, find_record, link_record, pull_record, push_record,
    read_record, PushMode, PushOutcome, RecordTarget, SyncBatch, LAYERS_KEY,
};
pub use viewer::{MemoryViewer, Transaction, Viewer};
