//! Script filter runtime for Sluice
//!
//! Evaluates user-supplied JavaScript replication filters against documents.
//! Each worker thread owns one QuickJS runtime (see [`pool`]); compiled
//! filters are cached per runtime (see [`cache`]); documents are marshalled
//! into script values whose handles are released after every call (see
//! [`marshal`] and [`resources`]). Evaluation never fails outward: any fault
//! means "do not replicate".

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod marshal;
pub mod metrics;
pub mod pool;
pub mod resources;
pub mod runtime;

pub use config::EngineConfig;
pub use error::{FaultKind, FilterFault};
pub use evaluator::{evaluate, evaluate_on, try_evaluate};
pub use filter::{FilterSet, FilterSettings, ReplicationFilter};
pub use pool::{release_thread_runtime, with_thread_pool, RuntimePool};
pub use runtime::FilterRuntime;
