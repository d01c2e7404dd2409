//! Configuration management for the workload engine.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod churn;
mod client;
mod get;
mod monitoring;
mod retry;
mod run;
mod watch;
mod workload;
pub use churn::*;
pub use client::*;
pub use get::*;
pub use monitoring::*;
pub use retry::*;
pub use run::*;
pub use watch::*;
pub use workload::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_PREFIX;
use crate::Result;

/// Main configuration container for the workload engine
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct WorkloadConfig {
    /// Key patterns, builder rules and the initial key load
    #[serde(default)]
    pub workload: WorkloadSection,
    /// Value and level churn
    #[serde(default)]
    pub churn: ChurnConfig,
    /// Periodic level reads
    #[serde(default)]
    pub get: GetConfig,
    /// Watchers per level and watched prefix replay
    #[serde(default)]
    pub watch: WatchConfig,
    /// Store endpoints and client pool
    #[serde(default)]
    pub client: ClientConfig,
    /// Run lifecycle: sentinel keys and reporting
    #[serde(default)]
    pub run: RunConfig,
    /// Metrics and monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}
impl Debug for WorkloadConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WorkloadConfig")
            .field("patterns", &self.workload.patterns)
            .field("endpoints", &self.client.endpoints)
            .finish()
    }
}

impl WorkloadConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `WORKLOAD__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied through
    /// [`WorkloadConfig::with_override_config`]. Callers MUST call `validate()`.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/armada.toml");
    /// std::env::set_var("WORKLOAD__CHURN__VALUE_RATE", "3600");
    /// let cfg = WorkloadConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.workload.validate()?;
        self.churn.validate()?;
        self.get.validate()?;
        self.watch.validate()?;
        self.client.validate()?;
        self.run.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }

    /// Whether any long running activity follows the initial load
    pub fn has_steady_state(&self) -> bool {
        self.churn.value_rate.is_some()
            || self.churn.level_rate.is_some()
            || self.get.rate.is_some()
            || self.watch.counts_per_level.is_some()
    }

    /// Number of keys the initial load should emit, 0 meaning one full pass.
    ///
    /// A steady state run always loads the complete key space so that churn
    /// and watches find every prefix populated.
    pub fn initial_total(&self) -> usize {
        if self.has_steady_state() {
            0
        } else {
            self.workload.total
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("client.endpoints")
}
