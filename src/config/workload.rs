use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::pattern::ValueSpec;
use crate::Error;
use crate::Result;

/// Key space definition and the initial key load
///
/// # Example
/// ```toml
/// [workload]
/// patterns = ["/:region/:clusterid/%node-%02d[3];[a-z0-9]{64}"]
///
/// [workload.builder_rules.region]
/// values = ["us-south", "us-east", "eu-frank", "au-south"]
/// count = 4
/// max = 4
///
/// [workload.builder_rules.clusterid]
/// pattern = "[0-9]{2}[a-f0-9]{37}"
/// count = 10
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkloadSection {
    /// Key patterns; most activities require exactly one
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Named segment rules referenced as `:name` or `:name[count]`.
    ///
    /// Names are matched case-insensitively.
    #[serde(default)]
    pub builder_rules: HashMap<String, BuilderRuleConfig>,

    /// Number of keys put during the initial load (0 means the whole key space)
    #[serde(default)]
    pub total: usize,

    /// Initial load put rate in requests per hour (0 means unlimited)
    #[serde(default)]
    pub put_rate: u64,

    /// Skip the initial load and assume the key space already exists
    #[serde(default)]
    pub skip_init: bool,

    /// Overrides leaf values with digit strings: `"n"` or `"min,max"` characters
    #[serde(default)]
    pub value_spec: Option<String>,

    /// Seed for the engine random source; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for WorkloadSection {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            builder_rules: HashMap::new(),
            total: 0,
            put_rate: 0,
            skip_init: false,
            value_spec: None,
            seed: None,
        }
    }
}

impl WorkloadSection {
    pub fn validate(&self) -> Result<()> {
        if self.patterns.is_empty() {
            return Err(Error::InvalidConfig("workload.patterns must contain at least one pattern".into()));
        }

        if let Some(p) = self.patterns.iter().find(|p| p.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!("workload.patterns contains an empty pattern '{p}'")));
        }

        for (name, rule) in &self.builder_rules {
            rule.validate(name)?;
        }

        if let Some(spec) = &self.value_spec {
            ValueSpec::parse(spec).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        }

        Ok(())
    }
}

/// A reusable segment rule
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BuilderRuleConfig {
    /// Explicit instances, used in declaration order
    #[serde(default)]
    pub values: Vec<String>,

    /// Regex used to pre-generate `count` instances when `values` is empty
    #[serde(default)]
    pub pattern: Option<String>,

    /// Instances used per parent key
    #[serde(default = "default_rule_count")]
    pub count: usize,

    /// Upper bound for `count`; 0 means unbounded
    #[serde(default)]
    pub max: usize,
}

impl BuilderRuleConfig {
    fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.values.is_empty() && self.pattern.is_none() {
            return Err(Error::InvalidConfig(format!(
                "builder rule '{name}' needs either values or a pattern"
            )));
        }
        if self.pattern.is_none() && self.values.len() < self.count {
            return Err(Error::InvalidConfig(format!(
                "builder rule '{name}' has {} values but count {}",
                self.values.len(),
                self.count
            )));
        }
        Ok(())
    }
}

fn default_rule_count() -> usize {
    1
}
