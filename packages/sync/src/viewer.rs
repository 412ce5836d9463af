//! # Viewer Contract
//!
//! The remote viewer holds one shared JSON document: scene-level keys
//! plus a `layers` array of records, each with a `name`. It is reached
//! only through transactions:
//!
//! ```text
//! begin_transaction() → read() → write(state) → commit()
//! ```
//!
//! A transaction that is dropped without `commit` leaves the document
//! untouched. Every `begin_transaction` observes the latest committed
//! document, so a push always sees the previous push from this process.

use crate::errors::SyncError;
use serde_json::{json, Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;

/// Handle to a remote viewer
pub trait Viewer {
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>, SyncError>;
}

/// Atomic read-modify-write access to the viewer document
pub trait Transaction {
    /// Current document as seen by this transaction
    fn read(&self) -> Value;

    /// Stage a full replacement of the document
    fn write(&mut self, state: Value);

    fn commit(self: Box<Self>) -> Result<(), SyncError>;
}

/// In-process viewer backed by a plain JSON document.
///
/// Counts transactions and commits so callers can check how many round
/// trips an operation cost.
pub struct MemoryViewer {
    document: RefCell<Value>,
    transactions: Cell<usize>,
    commits: Cell<usize>,
    reject_commits: Cell<bool>,
}

impl MemoryViewer {
    /// Viewer holding an empty scene
    pub fn new() -> Self {
        Self::with_document(json!({ "layers": [] }))
    }

    pub fn with_document(document: Value) -> Self {
        Self {
            document: RefCell::new(document),
            transactions: Cell::new(0),
            commits: Cell::new(0),
            reject_commits: Cell::new(false),
        }
    }

    /// Last committed document
    pub fn document(&self) -> Value {
        self.document.borrow().clone()
    }

    /// Overwrite the document outside any transaction, as another
    /// client of the viewer would
    pub fn set_document(&self, document: Value) {
        *self.document.borrow_mut() = document;
    }

    /// Committed record named `name`, if exactly one exists
    pub fn record(&self, name: &str) -> Option<Map<String, Value>> {
        let document = self.document.borrow();
        let mut matches = document
            .get("layers")?
            .as_array()?
            .iter()
            .filter(|record| record.get("name").and_then(Value::as_str) == Some(name));

        let record = matches.next()?.as_object()?.clone();
        matches.next().is_none().then_some(record)
    }

    /// Names of the committed layer records, in order
    pub fn record_names(&self) -> Vec<String> {
        self.document
            .borrow()
            .get("layers")
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|record| record.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.get()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.get()
    }

    /// Make every subsequent commit fail until switched off again
    pub fn reject_commits(&self, reject: bool) {
        self.reject_commits.set(reject);
    }
}

impl Default for MemoryViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryViewer")
            .field("document", &self.document.borrow())
            .field("transactions", &self.transactions.get())
            .field("commits", &self.commits.get())
            .finish()
    }
}

impl Viewer for MemoryViewer {
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>, SyncError> {
        self.transactions.set(self.transactions.get() + 1);
        Ok(Box::new(MemoryTransaction {
            state: self.document(),
            viewer: self,
        }))
    }
}

struct MemoryTransaction<'a> {
    viewer: &'a MemoryViewer,
    state: Value,
}

impl Transaction for MemoryTransaction<'_> {
    fn read(&self) -> Value {
        self.state.clone()
    }

    fn write(&mut self, state: Value) {
        self.state = state;
    }

    fn commit(self: Box<Self>) -> Result<(), SyncError> {
        let MemoryTransaction { viewer, state } = *self;
        if viewer.reject_commits.get() {
            return Err(SyncError::Transaction("commit rejected by viewer".to_string()));
        }
        viewer.set_document(state);
        viewer.commits.set(viewer.commits.get() + 1);
        Ok(())
    }
}
