//! Error types for remote synchronization

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("No remote record named \"{0}\"")]
    NotFound(String),

    #[error("Remote record name \"{name}\" is not unique ({count} found)")]
    Conflict { name: String, count: usize },

    #[error("Entity is not linked to a viewer")]
    Detached,

    #[error("Entity is already linked to a viewer")]
    AlreadyLinked,

    #[error("Linked viewer no longer exists")]
    ViewerDropped,

    #[error("Invalid viewer document: {0}")]
    InvalidDocument(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}
