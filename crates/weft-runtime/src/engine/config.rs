//! Engine configuration.

use std::time::Duration;

use derive_builder::Builder;

use crate::retry::RetryPolicy;

/// Configuration for the graph execution engine.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Maximum number of concurrent graph executions.
    #[builder(default = "10")]
    pub max_concurrent_runs: usize,

    /// Timeout applied to each outbound tool or LLM call.
    #[builder(default = "Duration::from_secs(30)")]
    pub call_timeout: Duration,

    /// Retry policy wrapped around tool and LLM invocations.
    #[builder(default)]
    pub retry: RetryPolicy,

    /// Maximum checkpoints retained per execution; oldest are evicted.
    #[builder(default = "100")]
    pub checkpoint_capacity: usize,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_concurrent_runs {
            if max == 0 {
                return Err("max_concurrent_runs must be at least 1".into());
            }
        }
        if let Some(capacity) = self.checkpoint_capacity {
            if capacity == 0 {
                return Err("checkpoint_capacity must be at least 1".into());
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 10,
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            checkpoint_capacity: 100,
        }
    }
}

impl EngineConfig {
    /// Returns a builder for creating a configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_runs, 10);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.checkpoint_capacity, 100);
    }

    #[test]
    fn test_builder_rejects_zero_runs() {
        assert!(EngineConfig::builder().max_concurrent_runs(0usize).build().is_err());
    }
}
