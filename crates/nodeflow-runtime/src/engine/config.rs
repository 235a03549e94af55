//! Engine configuration.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::RetryPolicy;
use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::ExecutionMode;

/// Configuration for the workflow execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Maximum number of retries after a node's first failed attempt.
    #[builder(default = "3")]
    pub max_retries: u32,

    /// Base retry delay; the wait before retry `n` is `retry_delay * n`.
    #[builder(default = "Duration::from_secs(1)")]
    pub retry_delay: Duration,

    /// Deadline for a single handler attempt.
    #[builder(default = "Duration::from_secs(300)")]
    pub node_timeout: Duration,

    /// Default scheduling mode for runs that do not pick one.
    #[builder(default)]
    pub mode: ExecutionMode,

    /// Maximum number of concurrent workflow executions.
    #[builder(default = "10")]
    pub max_concurrent_runs: usize,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_runs == Some(0) {
            return Err("max_concurrent_runs must be at least 1".into());
        }
        if self.node_timeout == Some(Duration::ZERO) {
            return Err("node_timeout must be greater than zero".into());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Returns a builder for the engine configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Checks a configuration assembled without the builder.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.max_concurrent_runs == 0 {
            return Err(WorkflowError::InvalidConfig(
                "max_concurrent_runs must be at least 1".into(),
            ));
        }
        if self.node_timeout.is_zero() {
            return Err(WorkflowError::InvalidConfig(
                "node_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Returns the engine-wide retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            timeout: self.node_timeout,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            node_timeout: Duration::from_secs(300),
            mode: ExecutionMode::Sequential,
            max_concurrent_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        let built = EngineConfig::builder().build().unwrap();
        assert_eq!(built, EngineConfig::default());
        assert_eq!(built.node_timeout, Duration::from_secs(5 * 60));
    }

    #[test]
    fn test_builder_rejects_zero_runs() {
        let result = EngineConfig::builder().max_concurrent_runs(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = EngineConfig::builder().node_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_struct_literal() {
        let config = EngineConfig {
            max_concurrent_runs: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorkflowError::InvalidConfig(_))
        ));
    }
}
