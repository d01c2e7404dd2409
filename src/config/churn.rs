use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Steady state mutation of an existing key space.
///
/// Rates are requests per hour. An absent rate disables the activity and
/// `0` runs it without any pacing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChurnConfig {
    /// Rate of value rewrites on random leaf keys
    #[serde(default)]
    pub value_rate: Option<u64>,

    /// Rate of level churn steps (one prefix delete or one subtree rebuild)
    #[serde(default)]
    pub level_rate: Option<u64>,

    /// Level whose prefixes are deleted and recreated
    #[serde(default)]
    pub level: usize,

    /// Percentage of the level's prefixes churned per cycle
    #[serde(default = "default_level_pct")]
    pub level_pct: u32,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            value_rate: None,
            level_rate: None,
            level: 0,
            level_pct: default_level_pct(),
        }
    }
}

impl ChurnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.level_rate.is_some() && (self.level_pct == 0 || self.level_pct > 100) {
            return Err(Error::InvalidConfig(format!(
                "churn.level_pct must be within 1..=100, got {}",
                self.level_pct
            )));
        }
        Ok(())
    }
}

fn default_level_pct() -> u32 {
    10
}
