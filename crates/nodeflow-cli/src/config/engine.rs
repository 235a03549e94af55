//! Engine configuration.

use std::time::Duration;

use anyhow::{Context, Result as AnyhowResult, anyhow};
use clap::Args;
use nodeflow_runtime::engine::EngineConfig;
use nodeflow_runtime::graph::ExecutionMode;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Engine configuration.
///
/// # Environment Variables
///
/// - `NODEFLOW_MODE` - Scheduling mode, `sequential` or `parallel` (default: sequential)
/// - `NODEFLOW_MAX_RETRIES` - Retries after a node's first failure (default: 3, max: 100)
/// - `NODEFLOW_RETRY_DELAY_MS` - Base backoff in milliseconds (default: 1000)
/// - `NODEFLOW_NODE_TIMEOUT_SECS` - Per-attempt deadline in seconds (default: 300)
/// - `NODEFLOW_MAX_CONCURRENT_RUNS` - Concurrent run limit (default: 10)
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct EngineArgs {
    /// Scheduling mode.
    #[arg(long, env = "NODEFLOW_MODE", default_value = "sequential")]
    pub mode: ExecutionMode,

    /// Maximum number of retries after a node's first failed attempt.
    #[arg(long, env = "NODEFLOW_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Base retry delay in milliseconds, multiplied by the attempt number.
    #[arg(long, env = "NODEFLOW_RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Deadline for a single handler attempt, in seconds.
    #[arg(long, env = "NODEFLOW_NODE_TIMEOUT_SECS", default_value_t = 300)]
    pub node_timeout_secs: u64,

    /// Maximum number of concurrent workflow runs.
    #[arg(long, env = "NODEFLOW_MAX_CONCURRENT_RUNS", default_value_t = 10)]
    pub max_concurrent_runs: usize,
}

impl EngineArgs {
    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is outside its valid range:
    /// - Max retries must be at most 100
    /// - Retry delay must be at most one hour
    /// - Node timeout must be 1-86400 seconds
    /// - Max concurrent runs must be at least 1
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.max_retries > 100 {
            return Err(anyhow!(
                "Max retries {} is invalid. Must be between 0 and 100.",
                self.max_retries
            ));
        }

        if self.retry_delay_ms > 3_600_000 {
            return Err(anyhow!(
                "Retry delay {}ms is invalid. Must be at most 3600000ms.",
                self.retry_delay_ms
            ));
        }

        if self.node_timeout_secs == 0 || self.node_timeout_secs > 86_400 {
            return Err(anyhow!(
                "Node timeout {} seconds is invalid. Must be between 1 and 86400 seconds.",
                self.node_timeout_secs
            ));
        }

        if self.max_concurrent_runs == 0 {
            return Err(anyhow!("Max concurrent runs must be at least 1."));
        }

        Ok(())
    }

    /// Builds the runtime engine configuration.
    pub fn to_engine_config(&self) -> AnyhowResult<EngineConfig> {
        EngineConfig::builder()
            .mode(self.mode)
            .max_retries(self.max_retries)
            .retry_delay(Duration::from_millis(self.retry_delay_ms))
            .node_timeout(Duration::from_secs(self.node_timeout_secs))
            .max_concurrent_runs(self.max_concurrent_runs)
            .build()
            .context("failed to build engine configuration")
    }

    /// Logs the engine configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            mode = %self.mode,
            max_retries = self.max_retries,
            retry_delay_ms = self.retry_delay_ms,
            node_timeout_secs = self.node_timeout_secs,
            max_concurrent_runs = self.max_concurrent_runs,
            "engine configuration"
        );
    }
}

impl Default for EngineArgs {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_retries: 3,
            retry_delay_ms: 1000,
            node_timeout_secs: 300,
            max_concurrent_runs: 10,
        }
    }
}
