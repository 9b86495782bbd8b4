//! Script engine configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Limits applied to every script runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Heap limit per runtime, in MiB
    pub memory_limit_mb: usize,

    /// Script stack limit per runtime, in KiB
    pub max_stack_size_kb: usize,

    /// Wall-clock budget per filter call, in milliseconds (0 = unbounded)
    pub execution_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: std::env::var("SLUICE_MEMORY_LIMIT_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(32),
            max_stack_size_kb: std::env::var("SLUICE_MAX_STACK_SIZE_KB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(512),
            execution_timeout_ms: std::env::var("SLUICE_EXECUTION_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional file (TOML, JSON, ...) layered
    /// under `SLUICE_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("memory_limit_mb", defaults.memory_limit_mb as i64)?
            .set_default("max_stack_size_kb", defaults.max_stack_size_kb as i64)?
            .set_default("execution_timeout_ms", defaults.execution_timeout_ms as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder
            .add_source(config::Environment::with_prefix("SLUICE").try_parsing(true));

        let loaded: Self = builder
            .build()
            .context("Failed to read engine configuration")?
            .try_deserialize()
            .context("Invalid engine configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_mb * 1024 * 1024
    }

    pub fn max_stack_size_bytes(&self) -> usize {
        self.max_stack_size_kb * 1024
    }

    /// Per-call budget, `None` when unbounded
    pub fn execution_budget(&self) -> Option<Duration> {
        if self.execution_timeout_ms == 0 {
            return None;
        }
        Some(Duration::from_millis(self.execution_timeout_ms))
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.memory_limit_mb == 0 {
            anyhow::bail!("Memory limit must be greater than 0");
        }

        if self.max_stack_size_kb < 64 {
            anyhow::bail!("Stack size too small (min 64 KiB)");
        }

        if self.execution_timeout_ms > 60_000 {
            anyhow::bail!("Execution timeout too long (max 60000 ms)");
        }

        Ok(())
    }
}
