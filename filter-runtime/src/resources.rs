//! Resource tracking for script-side handles
//!
//! Every object or array allocated while marshalling a document is tracked in
//! a [`ResourceSet`]. The set releases all of its handles when the evaluation
//! that owns it ends, on every exit path, because release runs on `Drop`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::error::ReleaseError;

/// A reference into the script engine that must be released exactly once.
pub trait Handle {
    /// Short description for diagnostics
    fn describe(&self) -> String;

    /// Give the reference back to the engine.
    fn release(self) -> Result<(), ReleaseError>;
}

impl<'js> Handle for rquickjs::Value<'js> {
    fn describe(&self) -> String {
        format!("{:?}", self.type_of())
    }

    fn release(self) -> Result<(), ReleaseError> {
        // Dropping the value decrements the engine-side reference count.
        drop(self);
        Ok(())
    }
}

/// Count of tracked handles not yet released, shared by every scope of one runtime.
#[derive(Debug, Clone, Default)]
pub struct LiveHandles(Arc<AtomicUsize>);

impl LiveHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new tracking scope counted against this runtime.
    pub fn scope<H: Handle>(&self) -> ResourceSet<H> {
        ResourceSet {
            handles: Vec::new(),
            live: self.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handles allocated during one evaluation
pub struct ResourceSet<H: Handle> {
    handles: Vec<H>,
    live: LiveHandles,
}

impl<H: Handle> ResourceSet<H> {
    /// Take ownership of `handle` until the scope is released.
    pub fn track(&mut self, handle: H) {
        self.live.0.fetch_add(1, Ordering::Relaxed);
        self.handles.push(handle);
    }

    /// Empty scope counted against the same runtime, for work that may be
    /// abandoned before the evaluation ends.
    pub fn child(&self) -> ResourceSet<H> {
        self.live.scope()
    }

    /// Move every handle of `child` into this scope.
    pub fn absorb(&mut self, mut child: ResourceSet<H>) {
        self.handles.append(&mut child.handles);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every tracked handle. A failure on one handle does not stop
    /// the others; returns the number of failures.
    pub fn release_all(&mut self) -> usize {
        let mut failures = 0;
        for handle in self.handles.drain(..) {
            let what = handle.describe();
            self.live.0.fetch_sub(1, Ordering::Relaxed);
            if let Err(e) = handle.release() {
                failures += 1;
                warn!("Handle release failed ({}): {}", what, e);
            }
        }
        failures
    }
}

impl<H: Handle> Drop for ResourceSet<H> {
    fn drop(&mut self) {
        self.release_all();
    }
}
