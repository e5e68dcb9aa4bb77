use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for retry logic applied to poll fetches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Minimum delay between retry attempts (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum delay between retry attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum number of attempts (1 means no retries, just one attempt)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to randomize delays between attempts
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 1,
            jitter: false,
        }
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!(
                "min_delay_ms cannot be greater than max_delay_ms"
            ));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }

        if self.max_delay_ms > 60_000 {
            return Err(anyhow::anyhow!("max_delay_ms should not exceed 60 seconds"));
        }

        Ok(())
    }

    /// Get the minimum delay as Duration
    pub fn min_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.min_delay_ms)
    }

    /// Get the maximum delay as Duration
    pub fn max_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_delay_ms)
    }

    /// Check if retries are enabled (more than 1 attempt)
    pub fn retries_enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

/// Main layer configuration
#[derive(Default, Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option))]
pub struct LayerConfig {
    /// Display name used in logs
    pub name: String,
    /// Cadence of the periodic poll fetch
    #[builder(default = "default_poll_interval_ms()")]
    pub poll_interval_ms: u64,
    /// Buffer capacity for the push channel receiver
    #[builder(default = "default_push_buffer()")]
    pub push_buffer: usize,
    #[builder(default)]
    pub retry_config: RetryConfig,
}

impl LayerConfig {
    pub fn builder() -> LayerConfigBuilder {
        LayerConfigBuilder::default()
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("poll_interval_ms must be non-zero"));
        }

        if self.push_buffer == 0 {
            return Err(anyhow::anyhow!("push_buffer must be non-zero"));
        }

        self.retry_config.validate()
    }
}

// Default value functions for serde and the builder
fn default_min_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_jitter() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_push_buffer() -> usize {
    16
}
