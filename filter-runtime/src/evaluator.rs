//! Filter evaluation
//!
//! `try_evaluate` walks runtime → function → values → call and reports the
//! first fault it hits. `evaluate` is the outer boundary: every fault becomes
//! `false` (do not replicate) plus a log line.

use rquickjs::Value;
use sluice_shared::{DocumentSource, FlagSet};
use tracing::{debug, warn};

use crate::error::{FaultKind, FilterFault};
use crate::marshal;
use crate::metrics;
use crate::pool::RuntimePool;
use crate::runtime::{take_exception, FilterRuntime};

/// Evaluate `source` against one document on the pool's runtime.
pub fn try_evaluate(
    pool: &mut RuntimePool,
    source: &str,
    doc: &dyn DocumentSource,
    flags: FlagSet,
) -> Result<bool, FilterFault> {
    let runtime = pool.acquire()?;
    evaluate_on(runtime, source, doc, flags)
}

/// Evaluate and collapse any fault to `false`. Never fails.
pub fn evaluate(
    pool: &mut RuntimePool,
    source: &str,
    doc: &dyn DocumentSource,
    flags: FlagSet,
) -> bool {
    let timer = metrics::EVAL_DURATION.start_timer();
    let result = try_evaluate(pool, source, doc, flags);
    timer.observe_duration();

    metrics::record_outcome(result.as_ref().copied().map_err(FilterFault::kind));
    match result {
        Ok(allowed) => allowed,
        Err(fault) => {
            match fault.kind() {
                // Already logged once when the source was compiled
                FaultKind::Compilation => {
                    debug!("Rejecting {}: filter did not compile", doc.id())
                }
                kind => {
                    metrics::record_fault(kind);
                    warn!("Filter evaluation for {} faulted, rejecting: {}", doc.id(), fault);
                }
            }
            false
        }
    }
}

/// Evaluate on a specific runtime.
pub fn evaluate_on(
    runtime: &mut FilterRuntime,
    source: &str,
    doc: &dyn DocumentSource,
    flags: FlagSet,
) -> Result<bool, FilterFault> {
    if runtime.is_disposed() {
        return Err(FilterFault::Runtime("runtime has been disposed".to_string()));
    }

    let armed = runtime.budget.map(|budget| runtime.deadline.arm(budget));

    let result = runtime.context.with(|ctx| {
        let func = runtime.cache.resolve(&ctx, source)?;

        // Released on every path out of this closure, including `?`.
        let mut resources = runtime.live.scope::<Value>();
        let doc_value = marshal::document_or_stub(&ctx, doc, &mut resources)?;
        let flags_value = marshal::flags_to_script(&ctx, flags, &mut resources)
            .map_err(|e| FilterFault::Infrastructure(take_exception(&ctx, e).message))?;

        let verdict = match func.call::<_, Value>((doc_value, flags_value)) {
            // The shim always returns a boolean; anything else counts as a rejection.
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) => {
                let err = take_exception(&ctx, e);
                if runtime.deadline.expired() {
                    Err(FilterFault::TimedOut {
                        limit: runtime.budget.unwrap_or_default(),
                    })
                } else if err.thrown {
                    Err(FilterFault::Execution {
                        message: err.message,
                        stack: err.stack,
                    })
                } else {
                    Err(FilterFault::Infrastructure(err.message))
                }
            }
        };

        resources.release_all();
        verdict
    });
    drop(armed);

    if let Err(FilterFault::Infrastructure(reason)) = &result {
        runtime.mark_corrupted(reason);
    }
    result
}
