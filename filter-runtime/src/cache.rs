//! Compiled filter cache
//!
//! Maps the verbatim filter source to the wrapped, compiled function. Keys are
//! compared byte-for-byte; no normalization. Entries live as long as the
//! owning runtime and are never evicted.

use rquickjs::{Ctx, Function, Persistent};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{FaultKind, FilterFault};
use crate::metrics;
use crate::runtime::{take_exception, REPORT_BRIDGE};

/// Wrap a user filter expression in the error-containment shim.
///
/// The shim binds the expression once, rejects anything that is not a
/// function, and on every call coerces the result with `!!` and turns a
/// thrown value into a reported `false`. Trailing semicolons are dropped so a
/// statement-style `function (doc) { ... };` still binds as an expression.
pub fn wrap_source(source: &str) -> String {
    let source = source.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!(
        r#"(function () {{
  const report = globalThis.{report};
  const userFilter = (
{source}
  );
  if (typeof userFilter !== "function") {{
    throw new TypeError("filter must evaluate to a function, got " + typeof userFilter);
  }}
  return function (doc, flags) {{
    try {{
      return !!userFilter(doc, flags);
    }} catch (e) {{
      const message = (e !== null && e !== undefined && e.message !== undefined) ? e.message : e;
      const stack = (e !== null && e !== undefined && e.stack) ? "\n" + e.stack : "";
      report("Replication filter threw:", message, stack);
      return false;
    }}
  }};
}})()"#,
        report = REPORT_BRIDGE,
        source = source,
    )
}

enum CachedFilter {
    Compiled(Persistent<Function<'static>>),
    /// Constant-false stand-in for a source that did not compile
    Fallback { message: String },
}

/// Per-runtime cache of compiled filters
#[derive(Default)]
pub struct FunctionCache {
    entries: HashMap<String, CachedFilter>,
    compilations: u64,
}

impl FunctionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cache misses that triggered a compile
    pub fn compilations(&self) -> u64 {
        self.compilations
    }

    /// Whether `source` is cached as the constant-false fallback
    pub fn is_fallback(&self, source: &str) -> bool {
        matches!(self.entries.get(source), Some(CachedFilter::Fallback { .. }))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up (or compile and insert) the function for `source`.
    ///
    /// A source that failed to compile yields `FilterFault::Compilation` on
    /// every call without compiling again.
    pub fn resolve<'js>(
        &mut self,
        ctx: &Ctx<'js>,
        source: &str,
    ) -> Result<Function<'js>, FilterFault> {
        if let Some(entry) = self.entries.get(source) {
            return restore(ctx, entry);
        }

        let entry = self.compile(ctx, source);
        let resolved = restore(ctx, &entry);
        self.entries.insert(source.to_string(), entry);
        resolved
    }

    fn compile(&mut self, ctx: &Ctx<'_>, source: &str) -> CachedFilter {
        self.compilations += 1;
        metrics::COMPILATIONS_TOTAL.inc();

        match ctx.eval::<Function, _>(wrap_source(source)) {
            Ok(func) => {
                debug!("Compiled replication filter ({} bytes)", source.len());
                CachedFilter::Compiled(Persistent::save(ctx, func))
            }
            Err(e) => {
                let err = take_exception(ctx, e);
                warn!(
                    "Replication filter failed to compile, it will reject every document: {}",
                    err.message
                );
                metrics::record_fault(FaultKind::Compilation);
                CachedFilter::Fallback {
                    message: err.message,
                }
            }
        }
    }
}

fn restore<'js>(ctx: &Ctx<'js>, entry: &CachedFilter) -> Result<Function<'js>, FilterFault> {
    match entry {
        CachedFilter::Compiled(func) => func
            .clone()
            .restore(ctx)
            .map_err(|e| FilterFault::Infrastructure(e.to_string())),
        CachedFilter::Fallback { message } => Err(FilterFault::Compilation {
            message: message.clone(),
        }),
    }
}
