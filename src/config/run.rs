use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_DO_NOT_EXIT_KEY;
use crate::constants::DEFAULT_TEST_END_KEY;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunConfig {
    /// Sentinel key; writing `true` to it ends the run
    #[serde(default = "default_test_end_key")]
    pub test_end_key: String,

    /// Keep the process alive after the final report until `do_not_exit_key` is set
    #[serde(default)]
    pub do_not_exit: bool,

    #[serde(default = "default_do_not_exit_key")]
    pub do_not_exit_key: String,

    /// Interval report period (unit: seconds, 0 = no interval reports)
    #[serde(default)]
    pub stats_interval_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_end_key: default_test_end_key(),
            do_not_exit: false,
            do_not_exit_key: default_do_not_exit_key(),
            stats_interval_secs: 0,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.test_end_key.is_empty() {
            return Err(Error::InvalidConfig("run.test_end_key cannot be empty".into()));
        }
        if self.do_not_exit && self.do_not_exit_key.is_empty() {
            return Err(Error::InvalidConfig("run.do_not_exit_key cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_test_end_key() -> String {
    DEFAULT_TEST_END_KEY.to_string()
}
fn default_do_not_exit_key() -> String {
    DEFAULT_DO_NOT_EXIT_KEY.to_string()
}
