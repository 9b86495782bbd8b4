//! Replication filters built from configuration
//!
//! A missing or blank filter source means "no filter installed": the
//! replicator skips evaluation entirely instead of calling the evaluator.

use serde::{Deserialize, Serialize};
use sluice_shared::{DocumentSource, FlagSet, ReplicationDirection};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::evaluator;
use crate::pool;

/// Filter sources as they appear in a replicator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub push_filter: Option<String>,
    pub pull_filter: Option<String>,
}

/// A script filter for one replication direction.
///
/// Cheap to clone and shareable across threads; each thread that calls
/// [`ReplicationFilter::allows`] evaluates on its own runtime.
#[derive(Clone)]
pub struct ReplicationFilter {
    direction: ReplicationDirection,
    source: Arc<str>,
    config: Arc<EngineConfig>,
}

impl fmt::Debug for ReplicationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationFilter")
            .field("direction", &self.direction)
            .field("source_len", &self.source.len())
            .finish()
    }
}

impl ReplicationFilter {
    /// `None` when `source` is missing, empty, or whitespace.
    pub fn from_source(
        direction: ReplicationDirection,
        source: Option<&str>,
        config: Arc<EngineConfig>,
    ) -> Option<Self> {
        let source = source.filter(|s| !s.trim().is_empty())?;
        debug!("Installing {} filter ({} bytes)", direction, source.len());
        Some(Self {
            direction,
            source: Arc::from(source),
            config,
        })
    }

    pub fn direction(&self) -> ReplicationDirection {
        self.direction
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the change to `doc` may replicate. Any fault yields `false`.
    pub fn allows(&self, doc: &dyn DocumentSource, flags: FlagSet) -> bool {
        pool::with_thread_pool(&self.config, |pool| {
            evaluator::evaluate(pool, &self.source, doc, flags)
        })
    }
}

/// Push and pull filters for one replicator
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub push: Option<ReplicationFilter>,
    pub pull: Option<ReplicationFilter>,
}

impl FilterSet {
    pub fn from_settings(settings: &FilterSettings, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        Self {
            push: ReplicationFilter::from_source(
                ReplicationDirection::Push,
                settings.push_filter.as_deref(),
                config.clone(),
            ),
            pull: ReplicationFilter::from_source(
                ReplicationDirection::Pull,
                settings.pull_filter.as_deref(),
                config,
            ),
        }
    }

    pub fn get(&self, direction: ReplicationDirection) -> Option<&ReplicationFilter> {
        match direction {
            ReplicationDirection::Push => self.push.as_ref(),
            ReplicationDirection::Pull => self.pull.as_ref(),
        }
    }

    /// Evaluate the filter for `direction`; with no filter installed every change replicates.
    pub fn allows(
        &self,
        direction: ReplicationDirection,
        doc: &dyn DocumentSource,
        flags: FlagSet,
    ) -> bool {
        match self.get(direction) {
            Some(filter) => filter.allows(doc, flags),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sluice_shared::{Document, ReplicationFlag};

    fn config() -> EngineConfig {
        EngineConfig {
            memory_limit_mb: 16,
            max_stack_size_kb: 256,
            execution_timeout_ms: 100,
        }
    }

    #[test]
    fn test_blank_sources_install_no_filter() {
        let config = Arc::new(config());
        for source in [None, Some(""), Some("   \n")] {
            assert!(
                ReplicationFilter::from_source(ReplicationDirection::Push, source, config.clone())
                    .is_none()
            );
        }
    }

    #[test]
    fn test_source_kept_verbatim() {
        let src = "  function (doc) { return true; }  ";
        let filter =
            ReplicationFilter::from_source(ReplicationDirection::Pull, Some(src), Arc::new(config()))
                .unwrap();
        assert_eq!(filter.source(), src);
        assert_eq!(filter.direction(), ReplicationDirection::Pull);
    }

    #[test]
    fn test_filter_set_from_settings() {
        let settings: FilterSettings = serde_json::from_value(json!({
            "push_filter": "function (doc, flags) { return !flags.deleted; }",
            "pull_filter": ""
        }))
        .unwrap();
        let filters = FilterSet::from_settings(&settings, config());
        assert!(filters.push.is_some());
        assert!(filters.pull.is_none());

        let doc = Document::from_json(json!({"_id": "a"}), "a").unwrap();
        let deleted = FlagSet::empty().with(ReplicationFlag::Deleted);
        assert!(filters.allows(ReplicationDirection::Push, &doc, FlagSet::empty()));
        assert!(!filters.allows(ReplicationDirection::Push, &doc, deleted));
        // No pull filter installed
        assert!(filters.allows(ReplicationDirection::Pull, &doc, deleted));
    }

    #[test]
    fn test_filter_shared_across_threads() {
        let filter = ReplicationFilter::from_source(
            ReplicationDirection::Push,
            Some("function (doc) { return doc.n % 2 === 0; }"),
            Arc::new(config()),
        )
        .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let filter = filter.clone();
                std::thread::spawn(move || {
                    let doc = Document::from_json(json!({"n": n}), "d").unwrap();
                    filter.allows(&doc, FlagSet::empty())
                })
            })
            .collect();
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![true, false, true, false]);
    }

    #[test]
    fn test_filters_with_different_limits_keep_their_caches() {
        let quick = ReplicationFilter::from_source(
            ReplicationDirection::Push,
            Some("function (doc) { return doc.n > 0; }"),
            Arc::new(config()),
        )
        .unwrap();
        let patient = ReplicationFilter::from_source(
            ReplicationDirection::Pull,
            Some("function (doc) { return doc.n < 0; }"),
            Arc::new(EngineConfig {
                execution_timeout_ms: 200,
                ..config()
            }),
        )
        .unwrap();

        std::thread::spawn(move || {
            let doc = Document::from_json(json!({"n": 1}), "d").unwrap();
            for _ in 0..50 {
                assert!(quick.allows(&doc, FlagSet::empty()));
                assert!(!patient.allows(&doc, FlagSet::empty()));
            }
            for filter in [&quick, &patient] {
                pool::with_thread_pool(&filter.config, |pool| {
                    assert_eq!(pool.generation(), 1);
                    let runtime = pool.acquire().unwrap();
                    assert_eq!(runtime.cache().compilations(), 1);
                });
            }
        })
        .join()
        .unwrap();
    }
}
