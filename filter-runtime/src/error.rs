//! Fault taxonomy for filter evaluation
//!
//! Every failure inside the runtime is one of these. Callers at the outer
//! boundary only ever see `false`; tests and metrics look at the fault first.

use std::time::Duration;
use thiserror::Error;

/// Coarse fault classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Compilation,
    Runtime,
    Marshal,
    Execution,
    Infrastructure,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Compilation => "compilation",
            FaultKind::Runtime => "runtime",
            FaultKind::Marshal => "marshal",
            FaultKind::Execution => "execution",
            FaultKind::Infrastructure => "infrastructure",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum FilterFault {
    /// The filter source did not compile; the cache holds a constant-false entry.
    #[error("filter failed to compile: {message}")]
    Compilation { message: String },

    /// The engine instance was disposed or is otherwise unusable.
    #[error("script runtime unavailable: {0}")]
    Runtime(String),

    /// A document or flag set could not be converted into script values.
    #[error("document {id} could not be marshalled: {message}")]
    Marshal { id: String, message: String },

    /// The filter raised past the wrapper shim (uncatchable engine errors).
    #[error("filter raised: {message}")]
    Execution {
        message: String,
        stack: Option<String>,
    },

    /// The filter ran past its execution budget and was interrupted.
    #[error("filter exceeded its {limit:?} execution budget")]
    TimedOut { limit: Duration },

    /// The engine itself failed (allocation, host binding, ...).
    #[error("script engine failure: {0}")]
    Infrastructure(String),
}

impl FilterFault {
    pub fn kind(&self) -> FaultKind {
        match self {
            FilterFault::Compilation { .. } => FaultKind::Compilation,
            FilterFault::Runtime(_) => FaultKind::Runtime,
            FilterFault::Marshal { .. } => FaultKind::Marshal,
            FilterFault::Execution { .. } | FilterFault::TimedOut { .. } => FaultKind::Execution,
            FilterFault::Infrastructure(_) => FaultKind::Infrastructure,
        }
    }
}

/// A tracked handle could not be released.
#[derive(Debug, Clone, Error)]
#[error("failed to release {handle}: {reason}")]
pub struct ReleaseError {
    pub handle: String,
    pub reason: String,
}
