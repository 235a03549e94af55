//! Retry and timeout supervision for a single node.

use std::future::Future;
use std::time::Duration;

use crate::definition::{NodeId, NodePolicy};
use crate::error::{NodeError, NodeResult};

/// Tracing target for retry supervision.
const TRACING_TARGET: &str = "nodeflow_runtime::retry";

/// Retry budget, linear backoff and per-attempt deadline for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// Base backoff delay.
    pub retry_delay: Duration,
    /// Deadline for each attempt.
    pub timeout: Duration,
}

/// Result of a supervised invocation.
#[derive(Debug)]
pub struct SupervisedOutcome<T> {
    /// Output of the last attempt.
    pub result: NodeResult<T>,
    /// Number of retries actually consumed.
    pub retries: u32,
}

impl RetryPolicy {
    /// Returns the backoff before retry number `attempt` (starting at 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    /// Applies a per-node override on top of this policy.
    pub fn with_override(self, policy: Option<&NodePolicy>) -> Self {
        let Some(policy) = policy else {
            return self;
        };

        Self {
            max_retries: policy.max_retries.unwrap_or(self.max_retries),
            retry_delay: policy
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.retry_delay),
            timeout: policy
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.timeout),
        }
    }

    /// Runs `attempt` until it succeeds or the retry budget is exhausted.
    ///
    /// Each attempt races against [`RetryPolicy::timeout`]; the first to settle
    /// wins. `attempt` receives the attempt number, starting at 1. At most
    /// `max_retries + 1` attempts are made.
    pub async fn supervise<F, Fut, T>(&self, node_id: &NodeId, mut attempt: F) -> SupervisedOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = NodeResult<T>>,
    {
        let mut retries = 0;
        loop {
            let number = retries + 1;
            let result = match tokio::time::timeout(self.timeout, attempt(number)).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout(self.timeout)),
            };

            let error = match result {
                Ok(output) => {
                    return SupervisedOutcome {
                        result: Ok(output),
                        retries,
                    };
                }
                Err(error) => error,
            };

            if retries >= self.max_retries {
                tracing::debug!(
                    target: TRACING_TARGET,
                    node_id = %node_id,
                    retries,
                    error = %error,
                    "retry budget exhausted"
                );
                return SupervisedOutcome {
                    result: Err(error),
                    retries,
                };
            }

            retries += 1;
            let delay = self.delay_for(retries);
            tracing::debug!(
                target: TRACING_TARGET,
                node_id = %node_id,
                attempt = number,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
