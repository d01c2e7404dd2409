use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Retry policy for establishing store connections
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts (0 means unlimited)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single attempt timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("connect_retry.timeout_ms must be greater than 0".into()));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "connect_retry.base_delay_ms ({}) cannot exceed max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

fn default_max_retries() -> usize {
    3
}
fn default_op_timeout_ms() -> u64 {
    10_000
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    5_000
}
