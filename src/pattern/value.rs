use std::fmt;
use std::sync::Arc;

use rand::Rng;
use rand::RngCore;

use super::StringGenerator;
use crate::constants::DIGITS;
use crate::errors::DefinitionError;

/// Length override for leaf values, parsed from `"n"` or `"min,max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSpec {
    pub min: usize,
    pub max: usize,
}

impl ValueSpec {
    pub fn parse(spec: &str) -> Result<Self, DefinitionError> {
        let invalid = || DefinitionError::InvalidValueSpec(spec.to_string());
        let parse_len = |s: &str| s.trim().parse::<usize>().map_err(|_| invalid());

        let (min, max) = match spec.split_once(',') {
            Some((a, b)) => (parse_len(a)?, parse_len(b)?),
            None => {
                let n = parse_len(spec)?;
                (n, n)
            }
        };
        if min > max {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

/// Produces values for leaf keys
#[derive(Clone)]
pub enum ValueGenerator {
    /// Strings matching the leaf segment's regex
    Pattern(Arc<dyn StringGenerator>),
    /// Digit strings of a length drawn from `[min, max)`, built from runs of
    /// one repeated digit so values stay compressible.
    Digits(ValueSpec),
}

impl ValueGenerator {
    pub fn generate(
        &self,
        rng: &mut dyn RngCore,
    ) -> String {
        match self {
            ValueGenerator::Pattern(gen) => gen.generate(rng),
            ValueGenerator::Digits(spec) => digit_runs(spec, rng),
        }
    }
}

impl fmt::Debug for ValueGenerator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ValueGenerator::Pattern(gen) => write!(f, "Pattern({})", gen.source()),
            ValueGenerator::Digits(spec) => write!(f, "Digits({}..{})", spec.min, spec.max),
        }
    }
}

fn digit_runs(
    spec: &ValueSpec,
    rng: &mut dyn RngCore,
) -> String {
    let len = if spec.max > spec.min {
        spec.min + rng.gen_range(0..spec.max - spec.min)
    } else {
        spec.min
    };

    // The digit changes every len/10 characters, or on every character for
    // short values.
    let run = len / 10;
    let mut digit = DIGITS[rng.gen_range(0..DIGITS.len())];
    let mut out = String::with_capacity(len);
    for i in 0..len {
        if len <= 10 || i % run == 0 {
            digit = DIGITS[rng.gen_range(0..DIGITS.len())];
        }
        out.push(digit as char);
    }
    out
}
