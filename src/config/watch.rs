use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Watchers per level, comma separated, e.g. `"1,5,n"` (`n` = every prefix)
    #[serde(default)]
    pub counts_per_level: Option<String>,

    /// Watch the whole subtree instead of the exact key
    #[serde(default)]
    pub with_prefix: bool,

    /// Pick watched keys in order (wrapping) instead of at random
    #[serde(default)]
    pub sequential_keys: bool,

    /// Period of prefix reads replayed on every watched key; 0 disables replay
    #[serde(default)]
    pub prefix_get_interval_ms: u64,

    /// Reject count lists whose length differs from the pattern depth
    #[serde(default = "default_strict_levels")]
    pub strict_levels: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            counts_per_level: None,
            with_prefix: false,
            sequential_keys: false,
            prefix_get_interval_ms: 0,
            strict_levels: default_strict_levels(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(counts) = &self.counts_per_level {
            if counts.trim().is_empty() {
                return Err(Error::InvalidConfig("watch.counts_per_level cannot be empty".into()));
            }
        }
        if self.prefix_get_interval_ms > 0 && self.prefix_get_interval_ms < 1000 {
            return Err(Error::InvalidConfig(format!(
                "watch.prefix_get_interval_ms {} must be at least one second",
                self.prefix_get_interval_ms
            )));
        }
        Ok(())
    }
}

fn default_strict_levels() -> bool {
    true
}
