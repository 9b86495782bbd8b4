//! Thread-affine runtime pool
//!
//! A [`RuntimePool`] owns at most one [`FilterRuntime`] and is meant to be
//! owned by exactly one worker thread. It creates the runtime lazily, hands
//! out the existing one while it is healthy, and rebuilds it (with an empty
//! function cache) once it reports itself disposed.
//!
//! Callers that cannot thread a pool through their call stack use
//! [`with_thread_pool`], which keeps one pool per OS thread and engine
//! configuration.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::FilterFault;
use crate::metrics;
use crate::runtime::FilterRuntime;

pub struct RuntimePool {
    config: EngineConfig,
    slot: Option<FilterRuntime>,
    generation: u64,
}

impl RuntimePool {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            slot: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of runtimes this pool has created so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_runtime(&self) -> bool {
        self.slot.is_some()
    }

    /// Return the live runtime, creating or recreating it as needed.
    pub fn acquire(&mut self) -> Result<&mut FilterRuntime, FilterFault> {
        if self.slot.as_ref().is_some_and(FilterRuntime::is_disposed) {
            info!(
                "Script runtime (generation {}) is disposed, recreating",
                self.generation
            );
            self.release();
        }

        let runtime = match self.slot.take() {
            Some(runtime) => runtime,
            None => {
                let runtime = FilterRuntime::new(&self.config)?;
                self.generation += 1;
                metrics::RUNTIMES_CREATED.inc();
                debug!("Created script runtime (generation {})", self.generation);
                runtime
            }
        };
        Ok(self.slot.insert(runtime))
    }

    /// Dispose the runtime, if any. Failures are logged and swallowed.
    pub fn release(&mut self) {
        let Some(mut runtime) = self.slot.take() else {
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
            runtime.dispose();
            drop(runtime);
        }));
        match outcome {
            Ok(()) => debug!("Released script runtime (generation {})", self.generation),
            Err(panic) => error!(
                "Script runtime disposal failed: {}",
                panic_message(panic.as_ref())
            ),
        }
    }
}

impl Drop for RuntimePool {
    fn drop(&mut self) {
        self.release();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

thread_local! {
    static THREAD_POOLS: RefCell<HashMap<EngineConfig, RuntimePool>> =
        RefCell::new(HashMap::new());
}

/// Run `f` with the calling thread's pool for `config`, creating it on first use.
///
/// Filters with different limits get separate runtimes on the same thread, so
/// alternating between them keeps both function caches warm.
pub fn with_thread_pool<R>(config: &EngineConfig, f: impl FnOnce(&mut RuntimePool) -> R) -> R {
    THREAD_POOLS.with(|cell| {
        let mut pools = cell.borrow_mut();
        let pool = pools
            .entry(config.clone())
            .or_insert_with(|| RuntimePool::new(config.clone()));
        f(pool)
    })
}

/// Dispose every runtime of the calling thread. Safe to call when none was created.
pub fn release_thread_runtime() {
    let _ = THREAD_POOLS.try_with(|cell| {
        if let Ok(mut pools) = cell.try_borrow_mut() {
            for (_, mut pool) in pools.drain() {
                pool.release();
            }
        }
    });
}
