use std::fmt::Debug;

use rand::Rng;
use rand::RngCore;

use crate::constants::REGEX_MAX_REPEAT;
use crate::errors::DefinitionError;

/// Produces random strings for key segments and values.
///
/// Implementations draw all randomness from the supplied source so that a
/// seeded engine produces reproducible keys.
pub trait StringGenerator: Send + Sync + Debug {
    fn generate(
        &self,
        rng: &mut dyn RngCore,
    ) -> String;

    /// Expression the generator was built from
    fn source(&self) -> &str;
}

/// Generates strings matching a regular expression.
///
/// Unbounded repetitions (`*`, `+`) are capped at [`REGEX_MAX_REPEAT`].
#[derive(Debug, Clone)]
pub struct RegexGenerator {
    source: String,
    regex: rand_regex::Regex,
}

impl RegexGenerator {
    pub fn compile(source: &str) -> Result<Self, DefinitionError> {
        let regex = rand_regex::Regex::compile(source, REGEX_MAX_REPEAT).map_err(|e| DefinitionError::InvalidRegex {
            regex: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

impl StringGenerator for RegexGenerator {
    fn generate(
        &self,
        rng: &mut dyn RngCore,
    ) -> String {
        rng.sample::<String, _>(&self.regex)
    }

    fn source(&self) -> &str {
        &self.source
    }
}
