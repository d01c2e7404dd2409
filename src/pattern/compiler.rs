use std::collections::HashMap;
use std::sync::Arc;

use rand::RngCore;
use tracing::debug;

use super::BuilderRule;
use super::PatternRule;
use super::PrintfFormat;
use super::RegexGenerator;
use super::Segment;
use super::ValueGenerator;
use super::ValueSpec;
use crate::config::BuilderRuleConfig;
use crate::errors::DefinitionError;

/// A pattern compiled into one rule per level; the last rule is the leaf.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    rules: Vec<PatternRule>,
}

impl CompiledPattern {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn rule(
        &self,
        level: usize,
    ) -> Option<&PatternRule> {
        self.rules.get(level)
    }

    /// Number of levels
    pub fn depth(&self) -> usize {
        self.rules.len()
    }

    pub fn leaf(&self) -> &PatternRule {
        // compile() guarantees at least one rule
        &self.rules[self.rules.len() - 1]
    }

    /// Number of distinct leaf keys, the product of every level's count
    pub fn key_space(&self) -> usize {
        self.rules.iter().fold(1usize, |acc, r| acc.saturating_mul(r.count))
    }
}

/// Compiles pattern strings against a set of builder rules.
///
/// # Grammar
/// Segments are separated by `/`; empty segments are ignored.
/// - `text`: a literal segment
/// - `:name` / `:name[N]`: builder rule `name`, optionally with `N` instances
/// - `!regex`: a random instance per emitted key
/// - `%fmt` / `%fmt[N]`: printf rendered for `0..N` (default 1)
/// - a trailing `;regex` marks the leaf and describes its values
///
/// # Example
/// ```ignore
/// let compiler = PatternCompiler::new(&rules, &mut rng)?;
/// let pattern = compiler.compile("/:region/%node-%02d[3];[a-z]{16}", &mut rng)?;
/// assert_eq!(pattern.depth(), 2);
/// ```
#[derive(Debug)]
pub struct PatternCompiler {
    builder_rules: HashMap<String, BuilderRule>,
    value_spec: Option<ValueSpec>,
}

impl PatternCompiler {
    pub fn new(
        configs: &HashMap<String, BuilderRuleConfig>,
        rng: &mut dyn RngCore,
    ) -> Result<Self, DefinitionError> {
        let mut builder_rules = HashMap::with_capacity(configs.len());
        for (name, config) in configs {
            let name = name.to_lowercase();
            let rule = BuilderRule::from_config(&name, config, rng)?;
            builder_rules.insert(name, rule);
        }
        Ok(Self {
            builder_rules,
            value_spec: None,
        })
    }

    /// Replaces every leaf value generator with digit strings of the given length
    pub fn with_value_spec(
        mut self,
        value_spec: Option<ValueSpec>,
    ) -> Self {
        self.value_spec = value_spec;
        self
    }

    pub fn builder_rule(
        &self,
        name: &str,
    ) -> Option<&BuilderRule> {
        self.builder_rules.get(&name.to_lowercase())
    }

    pub fn compile(
        &self,
        pattern: &str,
        rng: &mut dyn RngCore,
    ) -> Result<CompiledPattern, DefinitionError> {
        let mut rules: Vec<PatternRule> = Vec::new();

        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            if rules.last().is_some_and(|r| r.is_leaf()) {
                return Err(DefinitionError::LeafNotLast {
                    pattern: pattern.to_string(),
                });
            }

            let (path, value) = match segment.split_once(';') {
                Some((path, regex)) => (path, Some(self.value_generator(regex)?)),
                None => (segment, None),
            };

            let mut rule = self.compile_segment(pattern, path, rng)?;
            rule.value = value;
            debug!(pattern, level = rules.len(), rule = ?rule.source, count = rule.count, "Level pattern rule");
            rules.push(rule);
        }

        match rules.last() {
            None => Err(DefinitionError::EmptyPattern(pattern.to_string())),
            Some(last) if !last.is_leaf() => Err(DefinitionError::MissingValueSpec(pattern.to_string())),
            Some(_) => Ok(CompiledPattern {
                source: pattern.to_string(),
                rules,
            }),
        }
    }

    fn value_generator(
        &self,
        regex: &str,
    ) -> Result<ValueGenerator, DefinitionError> {
        // The leaf regex is still validated when the value spec overrides it
        let generator = RegexGenerator::compile(regex)?;
        Ok(match self.value_spec {
            Some(spec) => ValueGenerator::Digits(spec),
            None => ValueGenerator::Pattern(Arc::new(generator)),
        })
    }

    fn compile_segment(
        &self,
        pattern: &str,
        path: &str,
        rng: &mut dyn RngCore,
    ) -> Result<PatternRule, DefinitionError> {
        if let Some(rest) = path.strip_prefix(':') {
            let (name, count) = split_count(rest)?;
            let rule = self
                .builder_rule(name)
                .ok_or_else(|| DefinitionError::UnknownBuilderRule {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                })?;
            return rule.to_rule(path, count, rng);
        }

        if let Some(regex) = path.strip_prefix('!') {
            let generator = RegexGenerator::compile(regex)?;
            return Ok(PatternRule {
                source: path.to_string(),
                segment: Segment::Random(Arc::new(generator)),
                count: 1,
                max: 1,
                value: None,
            });
        }

        if let Some(rest) = path.strip_prefix('%') {
            let (format, count) = split_count(rest)?;
            return Ok(PatternRule {
                source: path.to_string(),
                segment: Segment::Format(PrintfFormat::parse(format)?),
                count: count.unwrap_or(1),
                max: 0,
                value: None,
            });
        }

        Ok(PatternRule {
            source: path.to_string(),
            segment: Segment::Values(Arc::from(vec![path.to_string()])),
            count: 1,
            max: 1,
            value: None,
        })
    }
}

/// Splits `name[N]` into `("name", Some(N))`
fn split_count(segment: &str) -> Result<(&str, Option<usize>), DefinitionError> {
    let Some(body) = segment.strip_suffix(']') else {
        return Ok((segment, None));
    };
    let (name, count) = body
        .rsplit_once('[')
        .ok_or_else(|| DefinitionError::InvalidCount(segment.to_string()))?;
    let count = count
        .parse::<usize>()
        .map_err(|_| DefinitionError::InvalidCount(segment.to_string()))?;
    Ok((name, Some(count)))
}
