use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Periodic reads of random prefixes at one level
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GetConfig {
    /// Requests per hour; absent disables reads, 0 means unlimited
    #[serde(default)]
    pub rate: Option<u64>,

    #[serde(default)]
    pub level: usize,

    /// Allow reads to be served by any member without a quorum round trip
    #[serde(default)]
    pub serializable: bool,

    #[serde(default)]
    pub keys_only: bool,

    /// Read every returned key and value so byte volume is accounted
    #[serde(default = "default_full_read")]
    pub full_read: bool,
}

impl Default for GetConfig {
    fn default() -> Self {
        Self {
            rate: None,
            level: 0,
            serializable: false,
            keys_only: false,
            full_read: default_full_read(),
        }
    }
}

impl GetConfig {
    /// Level bounds depend on the compiled pattern and are checked when the
    /// activity starts.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn default_full_read() -> bool {
    true
}
