//! Errors surfaced by the storage collaborator

use thiserror::Error;

/// A document could not be read from the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying record could not be read (deleted mid-read, closed collection, ...).
    #[error("document {id} is unreadable: {reason}")]
    Unreadable { id: String, reason: String },

    /// A JSON payload was expected to be an object.
    #[error("document body must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}
