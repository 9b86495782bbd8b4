//! Shared types and utilities for Sluice
//!
//! This crate contains the document model handed to replication filters, the
//! replication event flags, and the accessor trait through which filters read
//! documents from the storage layer.

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::StorageError;
pub use types::{document::*, flags::*, record::*};
