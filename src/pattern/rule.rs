use std::sync::Arc;

use parking_lot::Mutex;
use rand::RngCore;

use super::PrintfFormat;
use super::RegexGenerator;
use super::StringGenerator;
use super::ValueGenerator;
use crate::config::BuilderRuleConfig;
use crate::errors::DefinitionError;

/// How one level of the key tree produces its instance names
#[derive(Debug, Clone)]
pub enum Segment {
    /// Fixed instances, enumerated in order
    Values(Arc<[String]>),
    /// `format % i` for `i` in `0..count`
    Format(PrintfFormat),
    /// A fresh random instance for every emitted key
    Random(Arc<dyn StringGenerator>),
}

/// One level of a compiled pattern
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Segment text as written, without its value specification
    pub source: String,
    pub segment: Segment,
    /// Instances per parent key
    pub count: usize,
    /// Upper bound declared for `count`, 0 when unbounded
    pub max: usize,
    /// Present only on the leaf rule
    pub value: Option<ValueGenerator>,
}

impl PatternRule {
    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }

    /// Name of the `index`-th instance at this level
    pub fn instance(
        &self,
        index: usize,
        rng: &mut dyn RngCore,
    ) -> String {
        match &self.segment {
            Segment::Values(values) => values[index].clone(),
            Segment::Format(format) => format.render(index),
            Segment::Random(gen) => gen.generate(rng),
        }
    }

    pub fn generate_value(
        &self,
        rng: &mut dyn RngCore,
    ) -> String {
        self.value.as_ref().map(|v| v.generate(rng)).unwrap_or_default()
    }
}

/// A named reusable segment rule.
///
/// Regex backed rules are expanded into concrete instances once; later
/// requests for more instances extend the same list so every compile of a
/// pattern sees identical names.
#[derive(Debug)]
pub struct BuilderRule {
    name: String,
    count: usize,
    max: usize,
    generator: Option<RegexGenerator>,
    instances: Mutex<Vec<String>>,
}

impl BuilderRule {
    pub fn from_config(
        name: &str,
        config: &BuilderRuleConfig,
        rng: &mut dyn RngCore,
    ) -> Result<Self, DefinitionError> {
        if config.max > 0 && config.count > config.max {
            return Err(DefinitionError::CountExceedsMax {
                name: name.to_string(),
                count: config.count,
                max: config.max,
            });
        }

        let rule = if !config.values.is_empty() {
            Self {
                name: name.to_string(),
                count: config.count,
                max: config.max,
                generator: None,
                instances: Mutex::new(config.values.clone()),
            }
        } else if let Some(pattern) = &config.pattern {
            let generator = RegexGenerator::compile(pattern)?;
            let instances = (0..config.count).map(|_| generator.generate(rng)).collect();
            Self {
                name: name.to_string(),
                count: config.count,
                max: config.max,
                generator: Some(generator),
                instances: Mutex::new(instances),
            }
        } else {
            return Err(DefinitionError::EmptyBuilderRule(name.to_string()));
        };

        // Fixed lists bound the count as well
        rule.check_count(rule.count)?;
        Ok(rule)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Builds the rule for a pattern segment, honouring a `[count]` override
    pub(crate) fn to_rule(
        &self,
        source: &str,
        count: Option<usize>,
        rng: &mut dyn RngCore,
    ) -> Result<PatternRule, DefinitionError> {
        let count = count.unwrap_or(self.count);
        self.check_count(count)?;

        let mut instances = self.instances.lock();
        if let Some(generator) = &self.generator {
            while instances.len() < count {
                instances.push(generator.generate(rng));
            }
        }
        let values: Arc<[String]> = instances[..count].iter().cloned().collect();

        Ok(PatternRule {
            source: source.to_string(),
            segment: Segment::Values(values),
            count,
            max: self.max,
            value: None,
        })
    }

    fn check_count(
        &self,
        count: usize,
    ) -> Result<(), DefinitionError> {
        if self.max > 0 && count > self.max {
            return Err(DefinitionError::CountExceedsMax {
                name: self.name.clone(),
                count,
                max: self.max,
            });
        }
        if self.generator.is_none() {
            let available = self.instances.lock().len();
            if count > available {
                return Err(DefinitionError::CountExceedsMax {
                    name: self.name.clone(),
                    count,
                    max: available,
                });
            }
        }
        Ok(())
    }
}
