//! A single QuickJS engine instance owned by one thread.
//!
//! The runtime carries the compiled-filter cache, the host logging bridge
//! exposed to scripts as `console`, and an interrupt-driven execution budget.

use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Function, Object, Runtime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::cache::FunctionCache;
use crate::config::EngineConfig;
use crate::error::FilterFault;
use crate::resources::LiveHandles;

/// Global bound to the debug-level logging bridge
pub const LOG_BRIDGE: &str = "__sluice_log";

/// Global bound to the bridge the wrapper shim reports exceptions through
pub const REPORT_BRIDGE: &str = "__sluice_report";

const SCRIPT_LOG_TARGET: &str = "sluice::script";

/// An exception (or engine error) pulled out of a context
#[derive(Debug, Clone)]
pub(crate) struct ScriptError {
    pub message: String,
    pub stack: Option<String>,
    /// Raised by script code, as opposed to a host-side engine error
    pub thrown: bool,
}

/// Convert an engine error into a [`ScriptError`], clearing any pending exception.
pub(crate) fn take_exception(ctx: &Ctx<'_>, err: rquickjs::Error) -> ScriptError {
    if !err.is_exception() {
        return ScriptError {
            message: err.to_string(),
            stack: None,
            thrown: false,
        };
    }

    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        return ScriptError {
            message: exception
                .message()
                .unwrap_or_else(|| "uncaught exception".to_string()),
            stack: exception.stack().filter(|s| !s.is_empty()),
            thrown: true,
        };
    }

    // QuickJS throws a bare null when it cannot allocate the error object.
    let message = if caught.is_null() {
        "out of memory".to_string()
    } else {
        caught
            .as_string()
            .and_then(|s| s.to_string().ok())
            .unwrap_or_else(|| format!("uncaught {:?}", caught.type_of()))
    };
    ScriptError {
        message,
        stack: None,
        thrown: true,
    }
}

fn join_args(args: Rest<Coerced<String>>) -> String {
    args.0
        .into_iter()
        .map(|arg| arg.0)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Install `__sluice_log`, `__sluice_report` and `console` into the globals.
fn install_bridge(ctx: &Ctx<'_>, script_errors: Arc<AtomicU64>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let log = Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        debug!(target: SCRIPT_LOG_TARGET, "{}", join_args(args));
    })?;
    let report = Function::new(ctx.clone(), move |args: Rest<Coerced<String>>| {
        script_errors.fetch_add(1, Ordering::Relaxed);
        warn!(target: SCRIPT_LOG_TARGET, "{}", join_args(args));
    })?;
    let console_warn = Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
        warn!(target: SCRIPT_LOG_TARGET, "{}", join_args(args));
    })?;

    globals.set(LOG_BRIDGE, log.clone())?;
    globals.set(REPORT_BRIDGE, report)?;

    let console = Object::new(ctx.clone())?;
    console.set("log", log)?;
    console.set("warn", console_warn.clone())?;
    console.set("error", console_warn)?;
    globals.set("console", console)?;
    Ok(())
}

/// Wall-clock deadline checked by the engine's interrupt handler.
#[derive(Debug, Clone)]
pub(crate) struct Deadline {
    epoch: Instant,
    /// Nanoseconds after `epoch`; 0 when disarmed
    at_nanos: Arc<AtomicU64>,
}

impl Deadline {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            at_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn arm(&self, budget: Duration) -> DeadlineGuard<'_> {
        let at = (self.epoch.elapsed() + budget).as_nanos() as u64;
        self.at_nanos.store(at.max(1), Ordering::Relaxed);
        DeadlineGuard(self)
    }

    pub fn expired(&self) -> bool {
        let at = self.at_nanos.load(Ordering::Relaxed);
        at != 0 && self.epoch.elapsed().as_nanos() as u64 >= at
    }
}

/// Disarms the deadline when dropped.
pub(crate) struct DeadlineGuard<'a>(&'a Deadline);

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        self.0.at_nanos.store(0, Ordering::Relaxed);
    }
}

/// One script engine plus everything cached against it.
///
/// Field order matters: the cache holds persistent function handles and
/// must be dropped before the context and runtime that own them.
pub struct FilterRuntime {
    pub(crate) cache: FunctionCache,
    pub(crate) context: Context,
    runtime: Runtime,
    pub(crate) live: LiveHandles,
    pub(crate) deadline: Deadline,
    pub(crate) budget: Option<Duration>,
    script_errors: Arc<AtomicU64>,
    disposed: bool,
}

impl FilterRuntime {
    /// Create an engine with the configured limits and the logging bridge installed.
    pub fn new(config: &EngineConfig) -> Result<Self, FilterFault> {
        let infra = |e: rquickjs::Error| FilterFault::Infrastructure(e.to_string());

        let runtime = Runtime::new().map_err(infra)?;
        runtime.set_memory_limit(config.memory_limit_bytes());
        runtime.set_max_stack_size(config.max_stack_size_bytes());

        let deadline = Deadline::new();
        let interrupt = deadline.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || interrupt.expired())));

        let context = Context::full(&runtime).map_err(infra)?;
        let script_errors = Arc::new(AtomicU64::new(0));
        context
            .with(|ctx| {
                install_bridge(&ctx, script_errors.clone())
                    .map_err(|e| take_exception(&ctx, e).message)
            })
            .map_err(FilterFault::Infrastructure)?;

        Ok(Self {
            cache: FunctionCache::new(),
            context,
            runtime,
            live: LiveHandles::new(),
            deadline,
            budget: config.execution_budget(),
            script_errors,
            disposed: false,
        })
    }

    /// Health check: a disposed runtime must not be used again.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Drop every cached function, collect garbage and mark the runtime unusable.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cache.clear();
        self.runtime.run_gc();
        self.disposed = true;
    }

    /// Mark the runtime unusable after an engine-level failure.
    pub(crate) fn mark_corrupted(&mut self, reason: &str) {
        warn!("Script runtime marked for recreation: {}", reason);
        self.disposed = true;
    }

    /// Tracked handles not yet released; zero between evaluations.
    pub fn live_handles(&self) -> usize {
        self.live.count()
    }

    /// Exceptions caught by the wrapper shim since this runtime was created
    pub fn script_errors(&self) -> u64 {
        self.script_errors.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &FunctionCache {
        &self.cache
    }

    /// Compile `source` into the cache (if needed) and report whether it compiled.
    pub fn check(&mut self, source: &str) -> Result<(), FilterFault> {
        if self.disposed {
            return Err(FilterFault::Runtime("runtime has been disposed".to_string()));
        }
        let cache = &mut self.cache;
        self.context
            .with(|ctx| cache.resolve(&ctx, source).map(|_| ()))
    }

    /// Run a script in this runtime's context and coerce its result to a string.
    /// Used by tests and diagnostics, never by filter evaluation.
    pub fn eval_to_string(&self, script: &str) -> Result<String, FilterFault> {
        self.context.with(|ctx| {
            ctx.eval::<Coerced<String>, _>(script)
                .map(|s| s.0)
                .map_err(|e| {
                    let err = take_exception(&ctx, e);
                    FilterFault::Execution {
                        message: err.message,
                        stack: err.stack,
                    }
                })
        })
    }
}
